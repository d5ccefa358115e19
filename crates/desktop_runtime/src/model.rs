//! Window records, window-manager configuration, and pointer-interaction state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DESKTOP_LAYOUT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Rendering kind of a hosted application, derived from its manifest component key.
pub enum AppId {
    Explorer,
    TextEditor,
    MarkdownViewer,
    ImageViewer,
    PdfViewer,
    Browser,
    Terminal,
    Calculator,
    Settings,
    /// Fallback for component keys this runtime cannot render.
    ComingSoon,
}

impl AppId {
    /// Maps a manifest component key to its kind; unknown keys map to [`AppId::ComingSoon`].
    pub fn from_component_key(key: &str) -> Self {
        match key.trim() {
            "explorer" => Self::Explorer,
            "text-editor" => Self::TextEditor,
            "markdown-viewer" => Self::MarkdownViewer,
            "image-viewer" => Self::ImageViewer,
            "pdf-viewer" => Self::PdfViewer,
            "browser" => Self::Browser,
            "terminal" => Self::Terminal,
            "calculator" => Self::Calculator,
            "settings" => Self::Settings,
            _ => Self::ComingSoon,
        }
    }

    pub fn component_key(self) -> &'static str {
        match self {
            Self::Explorer => "explorer",
            Self::TextEditor => "text-editor",
            Self::MarkdownViewer => "markdown-viewer",
            Self::ImageViewer => "image-viewer",
            Self::PdfViewer => "pdf-viewer",
            Self::Browser => "browser",
            Self::Terminal => "terminal",
            Self::Calculator => "calculator",
            Self::Settings => "settings",
            Self::ComingSoon => "coming-soon",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Explorer => "File Explorer",
            Self::TextEditor => "Notepad",
            Self::MarkdownViewer => "Markdown Viewer",
            Self::ImageViewer => "Photos",
            Self::PdfViewer => "PDF Viewer",
            Self::Browser => "Browser",
            Self::Terminal => "Terminal",
            Self::Calculator => "Calculator",
            Self::Settings => "Settings",
            Self::ComingSoon => "Coming Soon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl WindowRect {
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn clamped_min(self, min_w: i32, min_h: i32) -> Self {
        Self {
            w: self.w.max(min_w),
            h: self.h.max(min_h),
            ..self
        }
    }

    /// A `w`×`h` rect centered inside `self`.
    pub fn centered(self, w: i32, h: i32) -> Self {
        Self {
            x: self.x + (self.w - w) / 2,
            y: self.y + (self.h - h) / 2,
            w,
            h,
        }
    }

    pub fn size(self) -> WindowSize {
        WindowSize {
            w: self.w,
            h: self.h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Browser viewport dimensions supplied by the host.
pub struct ViewportInfo {
    pub width: i32,
    pub height: i32,
}

impl Default for ViewportInfo {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Window-manager tunables. Distances are CSS pixels.
pub struct WindowManagerConfig {
    /// Height of the title-bar strip that starts a drag.
    pub titlebar_hit_height: i32,
    /// Pointer travel that must be exceeded before a drag counts as started.
    pub drag_dead_zone: i32,
    /// Vertical travel that tears a maximized window off.
    pub tear_off_threshold: i32,
    /// Height of the global menu bar; dropping a window above it maximizes.
    pub menu_bar_height: i32,
    pub min_width: i32,
    pub min_height: i32,
    /// Viewports narrower than this use the mobile layout.
    pub mobile_breakpoint: i32,
    pub mobile_top_bar_height: i32,
    /// Fraction of the desktop area used by "large start" windows.
    pub large_start_ratio: f64,
    pub active_z_index: u32,
    pub default_window: WindowSize,
    pub cascade_step: i32,
}

impl Default for WindowManagerConfig {
    fn default() -> Self {
        Self {
            titlebar_hit_height: 50,
            drag_dead_zone: 5,
            tear_off_threshold: 10,
            menu_bar_height: 28,
            min_width: 300,
            min_height: 100,
            mobile_breakpoint: 768,
            mobile_top_bar_height: 44,
            large_start_ratio: 0.85,
            active_z_index: 1000,
            default_window: WindowSize { w: 640, h: 440 },
            cascade_step: 24,
        }
    }
}

impl WindowManagerConfig {
    pub fn is_mobile(&self, viewport: ViewportInfo) -> bool {
        viewport.width < self.mobile_breakpoint
    }

    /// Area below the menu bar that windows maximize into.
    pub fn desktop_rect(&self, viewport: ViewportInfo) -> WindowRect {
        WindowRect {
            x: 0,
            y: self.menu_bar_height,
            w: viewport.width.max(self.min_width),
            h: (viewport.height - self.menu_bar_height).max(self.min_height),
        }
    }

    /// Full-screen area below the mobile top bar.
    pub fn mobile_rect(&self, viewport: ViewportInfo) -> WindowRect {
        WindowRect {
            x: 0,
            y: self.mobile_top_bar_height,
            w: viewport.width.max(0),
            h: (viewport.height - self.mobile_top_bar_height).max(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFlags {
    pub resizable: bool,
    pub minimizable: bool,
    pub maximizable: bool,
    /// Whether the app may have more than one open window.
    pub multiwindow: bool,
}

impl Default for WindowFlags {
    fn default() -> Self {
        Self {
            resizable: true,
            minimizable: true,
            maximizable: true,
            multiwindow: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub id: WindowId,
    pub app_id: AppId,
    pub title: String,
    /// Opaque rendering key, kept verbatim even when `app_id` is the fallback kind.
    pub component: String,
    pub launch_params: Value,
    /// Identity of the opened content, used to dedupe reusable apps.
    #[serde(default)]
    pub content_key: Option<String>,
    pub rect: WindowRect,
    pub restore_rect: Option<WindowRect>,
    /// Set when a maximized window was minimized; un-minimizing re-maximizes it.
    #[serde(default)]
    pub restore_maximized: bool,
    pub z_index: u32,
    pub is_focused: bool,
    pub minimized: bool,
    pub maximized: bool,
    pub flags: WindowFlags,
}

impl WindowRecord {
    /// Geometry to render with; mobile viewports show every window full-screen.
    pub fn display_rect(&self, config: &WindowManagerConfig, viewport: ViewportInfo) -> WindowRect {
        if config.is_mobile(viewport) {
            config.mobile_rect(viewport)
        } else {
            self.rect
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Mobile app-switcher overlay.
pub struct SwitcherState {
    pub open: bool,
    /// Index into the window list of the card currently centered on screen.
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopState {
    pub next_window_id: u64,
    pub windows: Vec<WindowRecord>,
    pub viewport: ViewportInfo,
    pub config: WindowManagerConfig,
    pub switcher: SwitcherState,
}

impl Default for DesktopState {
    fn default() -> Self {
        Self {
            next_window_id: 1,
            windows: Vec::new(),
            viewport: ViewportInfo::default(),
            config: WindowManagerConfig::default(),
            switcher: SwitcherState::default(),
        }
    }
}

impl DesktopState {
    pub fn focused_window_id(&self) -> Option<WindowId> {
        self.windows.iter().find(|w| w.is_focused).map(|w| w.id)
    }

    pub fn window(&self, window_id: WindowId) -> Option<&WindowRecord> {
        self.windows.iter().find(|w| w.id == window_id)
    }

    pub fn is_mobile(&self) -> bool {
        self.config.is_mobile(self.viewport)
    }

    pub fn snapshot(&self) -> DesktopSnapshot {
        DesktopSnapshot {
            schema_version: DESKTOP_LAYOUT_SCHEMA_VERSION,
            windows: self.windows.clone(),
            config: self.config.clone(),
        }
    }

    /// Rebuilds state from a snapshot, keeping the live viewport.
    pub fn from_snapshot(snapshot: DesktopSnapshot, viewport: ViewportInfo) -> Self {
        let mut state = Self {
            windows: snapshot.windows,
            config: snapshot.config,
            viewport,
            ..Self::default()
        };
        state.next_window_id = state
            .windows
            .iter()
            .map(|w| w.id.0)
            .max()
            .unwrap_or(0)
            .saturating_add(1);
        state
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopSnapshot {
    pub schema_version: u32,
    pub windows: Vec<WindowRecord>,
    #[serde(default)]
    pub config: WindowManagerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenWindowRequest {
    pub app_id: AppId,
    /// Explicit id; one is allocated when absent.
    pub window_id: Option<WindowId>,
    pub title: Option<String>,
    pub component: Option<String>,
    pub rect: Option<WindowRect>,
    /// Size used for cascaded placement when `rect` is absent.
    pub default_size: Option<WindowSize>,
    /// Start centered at a large fraction of the desktop area.
    pub large_start: bool,
    pub launch_params: Value,
    pub content_key: Option<String>,
    pub flags: WindowFlags,
}

impl OpenWindowRequest {
    pub fn new(app_id: AppId) -> Self {
        Self {
            app_id,
            window_id: None,
            title: None,
            component: None,
            rect: None,
            default_size: None,
            large_start: false,
            launch_params: Value::Null,
            content_key: None,
            flags: WindowFlags::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Shallow patch applied by `update_window`; `None` fields are left unchanged.
pub struct WindowPatch {
    pub title: Option<String>,
    pub rect: Option<WindowRect>,
    pub launch_params: Option<Value>,
    pub minimized: Option<bool>,
    pub maximized: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Where a pointer-down landed relative to the window frame.
pub struct TitleBarHit {
    /// Pointer y minus the window's top edge.
    pub offset_y: i32,
    /// The pointer is over a button, input or other interactive child.
    pub over_interactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeEdge {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeEdge {
    pub fn moves_left_edge(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    pub fn moves_top_edge(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub window_id: WindowId,
    pub pointer_start: PointerPosition,
    pub rect_start: WindowRect,
    /// Pointer offset from the window's top edge at grab time.
    pub grab_offset_y: i32,
    /// The dead-zone has been exceeded.
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeSession {
    pub window_id: WindowId,
    pub edge: ResizeEdge,
    pub pointer_start: PointerPosition,
    pub rect_start: WindowRect,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InteractionState {
    pub dragging: Option<DragSession>,
    pub resizing: Option<ResizeSession>,
}

impl InteractionState {
    pub fn is_idle(&self) -> bool {
        self.dragging.is_none() && self.resizing.is_none()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unknown_component_keys_fall_back_to_coming_soon() {
        assert_eq!(AppId::from_component_key("calculator"), AppId::Calculator);
        assert_eq!(AppId::from_component_key(" browser "), AppId::Browser);
        assert_eq!(AppId::from_component_key("minesweeper"), AppId::ComingSoon);
        for kind in [AppId::Explorer, AppId::PdfViewer, AppId::Settings] {
            assert_eq!(AppId::from_component_key(kind.component_key()), kind);
        }
    }

    #[test]
    fn mobile_layout_projects_windows_full_screen() {
        let config = WindowManagerConfig::default();
        let phone = ViewportInfo {
            width: 390,
            height: 844,
        };
        let window = WindowRecord {
            id: WindowId(1),
            app_id: AppId::TextEditor,
            title: "notes".to_string(),
            component: "text-editor".to_string(),
            launch_params: Value::Null,
            content_key: None,
            rect: WindowRect {
                x: 10,
                y: 10,
                w: 300,
                h: 200,
            },
            restore_rect: None,
            restore_maximized: false,
            z_index: 1,
            is_focused: false,
            minimized: false,
            maximized: false,
            flags: WindowFlags::default(),
        };

        assert_eq!(
            window.display_rect(&config, phone),
            WindowRect {
                x: 0,
                y: 44,
                w: 390,
                h: 800
            }
        );
        assert_eq!(
            window.display_rect(&config, ViewportInfo::default()),
            window.rect
        );
    }

    #[test]
    fn snapshot_restores_next_window_id_above_existing_ids() {
        let mut state = DesktopState::default();
        state.windows.push(WindowRecord {
            id: WindowId(7),
            app_id: AppId::Terminal,
            title: "Terminal".to_string(),
            component: "terminal".to_string(),
            launch_params: Value::Null,
            content_key: None,
            rect: WindowRect {
                x: 0,
                y: 28,
                w: 640,
                h: 440,
            },
            restore_rect: None,
            restore_maximized: false,
            z_index: 1000,
            is_focused: true,
            minimized: false,
            maximized: false,
            flags: WindowFlags::default(),
        });

        let restored = DesktopState::from_snapshot(state.snapshot(), ViewportInfo::default());
        assert_eq!(restored.next_window_id, 8);
        assert_eq!(restored.windows, state.windows);
    }

    #[test]
    fn config_deserializes_with_missing_fields() {
        let config: WindowManagerConfig =
            serde_json::from_value(serde_json::json!({ "menu_bar_height": 32 }))
                .expect("partial config");
        assert_eq!(config.menu_bar_height, 32);
        assert_eq!(config.titlebar_hit_height, 50);
    }
}
