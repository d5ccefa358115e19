//! Application registry built from the compiled manifest catalog.

use platform_host::MimeType;
use serde::{Deserialize, Serialize};

use crate::model::{AppId, OpenWindowRequest, WindowFlags, WindowSize};

include!(concat!(env!("OUT_DIR"), "/app_catalog_generated.rs"));

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDefaults {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Static metadata for one launchable application.
pub struct AppDescriptor {
    /// Stable registry key.
    pub app_id: String,
    pub display_name: String,
    /// Rendering key mapped to an [`AppId`].
    pub component: String,
    pub icon_id: String,
    /// More than one window may be open at once.
    pub multiwindow: bool,
    /// Launching content that is already open focuses the existing window.
    pub reusable: bool,
    pub large_start: bool,
    pub resizable: bool,
    #[serde(default = "default_true")]
    pub maximizable: bool,
    pub show_on_desktop: bool,
    /// Exact mimetypes or `type/*` wildcards this app opens.
    pub handles_mimetypes: Vec<String>,
    pub window_defaults: WindowDefaults,
}

impl AppDescriptor {
    pub fn kind(&self) -> AppId {
        AppId::from_component_key(&self.component)
    }

    /// `Some(true)` for an exact match, `Some(false)` for a wildcard match.
    fn mimetype_match(&self, mimetype: &str) -> Option<bool> {
        self.handles_mimetypes.iter().find_map(|pattern| {
            if pattern == mimetype {
                Some(true)
            } else {
                pattern
                    .strip_suffix("/*")
                    .filter(|family| {
                        mimetype
                            .split_once('/')
                            .is_some_and(|(prefix, _)| prefix == *family)
                    })
                    .map(|_| false)
            }
        })
    }

    pub fn window_flags(&self) -> WindowFlags {
        WindowFlags {
            resizable: self.resizable,
            minimizable: true,
            maximizable: self.maximizable,
            multiwindow: self.multiwindow,
        }
    }

    /// Base window request for this app; callers add launch params and content identity.
    pub fn open_request(&self) -> OpenWindowRequest {
        let mut req = OpenWindowRequest::new(self.kind());
        req.title = Some(self.display_name.clone());
        req.component = Some(self.component.clone());
        req.default_size = Some(WindowSize {
            w: self.window_defaults.width,
            h: self.window_defaults.height,
        });
        req.large_start = self.large_start;
        req.flags = self.window_flags();
        req
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppRegistry {
    apps: Vec<AppDescriptor>,
}

impl AppRegistry {
    pub fn new(apps: Vec<AppDescriptor>) -> Self {
        Self { apps }
    }

    /// Registry of the apps compiled in from `manifests/*.app.toml`.
    ///
    /// # Panics
    ///
    /// Panics if the build-time catalog is malformed, which `build.rs` rules out.
    pub fn builtin() -> Self {
        Self::from_catalog_json(APP_MANIFEST_CATALOG_JSON).expect("valid built-in app catalog")
    }

    /// Parses a JSON catalog in the format generated at build time.
    ///
    /// # Errors
    ///
    /// Returns the decode error text.
    pub fn from_catalog_json(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw)
            .map(Self::new)
            .map_err(|err| err.to_string())
    }

    pub fn apps(&self) -> &[AppDescriptor] {
        &self.apps
    }

    pub fn get(&self, app_id: &str) -> Option<&AppDescriptor> {
        self.apps.iter().find(|app| app.app_id == app_id)
    }

    /// Looks an app up by registry id, then by display name ignoring case.
    pub fn find_by_id_or_name(&self, key: &str) -> Option<&AppDescriptor> {
        let key = key.trim();
        self.get(key).or_else(|| {
            self.apps
                .iter()
                .find(|app| app.display_name.eq_ignore_ascii_case(key))
        })
    }

    /// The app registered for `mimetype`, preferring exact matches over `type/*` wildcards.
    pub fn handler_for(&self, mimetype: &MimeType) -> Option<&AppDescriptor> {
        let raw = mimetype.as_string();
        let mut wildcard = None;
        for app in &self.apps {
            match app.mimetype_match(&raw) {
                Some(true) => return Some(app),
                Some(false) if wildcard.is_none() => wildcard = Some(app),
                _ => {}
            }
        }
        wildcard
    }
}
