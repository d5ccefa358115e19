//! Host services consumed by the desktop runtime and browser environment queries.
//!
//! The runtime never reaches for storage or permission UI directly; it goes through the trait
//! objects bundled here so tests and non-browser builds can substitute in-memory adapters.

use std::rc::Rc;

use platform_host::{
    AllowAllPermissionGate, AppStateStore, FixedPrompter, NoopAppStateStore, PermissionGate,
    PermissionPrompter,
};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{closure::Closure, JsCast};

use crate::model::{ViewportInfo, WindowId};

#[derive(Clone)]
/// Host service bundle for desktop runtime side effects.
pub struct DesktopHostContext {
    app_state: Rc<dyn AppStateStore>,
    permission_gate: Rc<dyn PermissionGate>,
    prompter: Rc<dyn PermissionPrompter>,
}

impl Default for DesktopHostContext {
    /// No persistence, every privileged request granted, prompts declined.
    fn default() -> Self {
        Self {
            app_state: Rc::new(NoopAppStateStore),
            permission_gate: Rc::new(AllowAllPermissionGate),
            prompter: Rc::new(FixedPrompter(false)),
        }
    }
}

impl DesktopHostContext {
    pub fn new(
        app_state: Rc<dyn AppStateStore>,
        permission_gate: Rc<dyn PermissionGate>,
        prompter: Rc<dyn PermissionPrompter>,
    ) -> Self {
        Self {
            app_state,
            permission_gate,
            prompter,
        }
    }

    /// Replaces the app-state persistence backend.
    pub fn with_app_state_store(mut self, store: Rc<dyn AppStateStore>) -> Self {
        self.app_state = store;
        self
    }

    /// Replaces the permission gate and prompter.
    pub fn with_permissions(
        mut self,
        gate: Rc<dyn PermissionGate>,
        prompter: Rc<dyn PermissionPrompter>,
    ) -> Self {
        self.permission_gate = gate;
        self.prompter = prompter;
        self
    }

    pub fn app_state_store(&self) -> Rc<dyn AppStateStore> {
        self.app_state.clone()
    }

    pub fn permission_gate(&self) -> Rc<dyn PermissionGate> {
        self.permission_gate.clone()
    }

    pub fn prompter(&self) -> Rc<dyn PermissionPrompter> {
        self.prompter.clone()
    }
}

/// DOM id apps put on their primary text field to receive focus when their window activates.
pub fn window_primary_input_dom_id(window_id: WindowId) -> String {
    format!("window-primary-input-{}", window_id.0)
}

/// Moves keyboard focus into the window's primary input on the next tick, if it rendered one.
pub fn focus_window_input(window_id: WindowId) {
    #[cfg(target_arch = "wasm32")]
    {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };
        let Some(element) = document.get_element_by_id(&window_primary_input_dom_id(window_id))
        else {
            return;
        };
        let Ok(element) = element.dyn_into::<web_sys::HtmlElement>() else {
            return;
        };
        let callback = Closure::once_into_js(move || {
            let _ = element.focus();
        });
        let _ = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 0);
    }
    #[cfg(not(target_arch = "wasm32"))]
    let _ = window_id;
}

/// Current browser viewport; [`ViewportInfo::default`] outside the browser.
pub fn viewport_from_host() -> ViewportInfo {
    #[cfg(target_arch = "wasm32")]
    {
        if let Some(window) = web_sys::window() {
            let fallback = ViewportInfo::default();
            let width = window
                .inner_width()
                .ok()
                .and_then(|value| value.as_f64())
                .map(|value| value as i32)
                .unwrap_or(fallback.width);
            let height = window
                .inner_height()
                .ok()
                .and_then(|value| value.as_f64())
                .map(|value| value as i32)
                .unwrap_or(fallback.height);
            return ViewportInfo {
                width: width.max(1),
                height: height.max(1),
            };
        }
    }

    ViewportInfo::default()
}
