//! Global pointer-listener guards for window drag and resize gestures.
//!
//! A gesture installs window-level listeners when it starts. The guard owns them: releasing it
//! removes the listeners and runs the end-of-gesture callback exactly once, whether the release
//! comes from pointer-up, pointer-cancel, window blur, an explicit call, or the guard being
//! dropped.

use std::{cell::Cell, cell::RefCell, rc::Rc};

#[cfg(target_arch = "wasm32")]
use leptos::{ev, window_event_listener};
use leptos::leptos_dom::helpers::WindowListenerHandle;

use crate::model::PointerPosition;

type ReleaseCallback = Box<dyn FnOnce()>;

struct GuardInner {
    released: Cell<bool>,
    on_release: RefCell<Option<ReleaseCallback>>,
    listeners: RefCell<Vec<WindowListenerHandle>>,
}

impl GuardInner {
    fn release(&self) -> bool {
        if self.released.replace(true) {
            return false;
        }
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in listeners {
            listener.remove();
        }
        let callback = self.on_release.borrow_mut().take();
        if let Some(callback) = callback {
            callback();
        }
        true
    }
}

/// Owner of one gesture's global listeners.
pub struct GestureGuard {
    inner: Rc<GuardInner>,
}

#[derive(Clone)]
/// Cloneable handle that can end the gesture from inside a listener.
pub struct GestureReleaser {
    inner: Rc<GuardInner>,
}

impl GestureReleaser {
    /// Ends the gesture. Returns `false` when it had already ended.
    pub fn release(&self) -> bool {
        self.inner.release()
    }
}

impl GestureGuard {
    /// Creates a guard that runs `on_release` when the gesture ends.
    pub fn new(on_release: impl FnOnce() + 'static) -> Self {
        Self {
            inner: Rc::new(GuardInner {
                released: Cell::new(false),
                on_release: RefCell::new(Some(Box::new(on_release))),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Creates a guard with window-level pointer listeners.
    ///
    /// `on_move` receives every pointer position; pointer-up, pointer-cancel and blur end the
    /// gesture. Outside the browser no listeners are installed and the gesture ends through
    /// [`GestureGuard::release`] or drop.
    pub fn with_pointer_listeners(
        on_move: impl Fn(PointerPosition) + 'static,
        on_release: impl FnOnce() + 'static,
    ) -> Self {
        let guard = Self::new(on_release);
        #[cfg(target_arch = "wasm32")]
        {
            let releaser = guard.releaser();
            let on_up = releaser.clone();
            let on_cancel = releaser.clone();
            let on_blur = releaser;
            let handles = vec![
                window_event_listener(ev::pointermove, move |event| {
                    on_move(PointerPosition {
                        x: event.client_x(),
                        y: event.client_y(),
                    });
                }),
                window_event_listener(ev::pointerup, move |_| {
                    on_up.release();
                }),
                window_event_listener(ev::pointercancel, move |_| {
                    on_cancel.release();
                }),
                window_event_listener(ev::blur, move |_| {
                    on_blur.release();
                }),
            ];
            guard.inner.listeners.borrow_mut().extend(handles);
        }
        #[cfg(not(target_arch = "wasm32"))]
        let _ = on_move;
        guard
    }

    pub fn releaser(&self) -> GestureReleaser {
        GestureReleaser {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Ends the gesture. Returns `false` when it had already ended.
    pub fn release(&self) -> bool {
        self.inner.release()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }
}

impl Drop for GestureGuard {
    fn drop(&mut self) {
        self.inner.release();
    }
}
