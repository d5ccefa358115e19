//! Reducer actions, side-effect intents, and transition logic for the desktop runtime.

use thiserror::Error;

use crate::model::{
    AppId, DesktopSnapshot, DesktopState, DragSession, InteractionState, OpenWindowRequest,
    PointerPosition, ResizeEdge, ResizeSession, TitleBarHit, ViewportInfo, WindowId, WindowPatch,
    WindowRecord,
};
use crate::window_manager::{
    anchored_min, clamp_drag_rect, fit_maximized_windows, focus_window_internal,
    initial_window_rect, maximize_if_dropped_on_menu_bar, maximize_window_internal,
    minimize_window_internal, normalize_window_stack, resize_rect, tear_off_rect,
    unmaximize_window_internal,
};

#[derive(Debug, Clone, PartialEq)]
/// Actions accepted by [`reduce_desktop`] to mutate [`DesktopState`].
pub enum DesktopAction {
    /// Open a new window using the supplied request.
    OpenWindow(OpenWindowRequest),
    /// Shallow-merge a patch into an existing window.
    UpdateWindow {
        /// Window to patch.
        window_id: WindowId,
        /// Fields to replace.
        patch: WindowPatch,
    },
    /// Close a window by id.
    CloseWindow {
        /// Window to close.
        window_id: WindowId,
    },
    /// Activate a window, un-minimizing it when needed.
    FocusWindow {
        /// Window to focus.
        window_id: WindowId,
    },
    /// Minimize a window.
    MinimizeWindow {
        /// Window to minimize.
        window_id: WindowId,
    },
    /// Maximize a window into the desktop area.
    MaximizeWindow {
        /// Window to maximize.
        window_id: WindowId,
    },
    /// Restore a minimized or maximized window.
    RestoreWindow {
        /// Window to restore.
        window_id: WindowId,
    },
    /// Maximize a normal window or restore a maximized one.
    ToggleMaximize {
        /// Window whose title bar was double-clicked.
        window_id: WindowId,
    },
    /// Dock button behavior: restore if minimized, minimize if active, otherwise focus.
    ToggleTaskbarWindow {
        /// Window associated with the dock button.
        window_id: WindowId,
    },
    /// Record a new viewport size.
    SetViewport {
        /// Current browser viewport.
        viewport: ViewportInfo,
    },
    /// Pointer-down on a window frame; starts a drag when it landed in the title bar.
    BeginMove {
        /// Window under the pointer.
        window_id: WindowId,
        /// Pointer position at drag start.
        pointer: PointerPosition,
        /// Where the pointer landed relative to the frame.
        hit: TitleBarHit,
    },
    /// Update an in-progress window drag.
    UpdateMove {
        /// Current pointer position.
        pointer: PointerPosition,
    },
    /// End the active window drag, committing the current geometry.
    EndMove,
    /// Begin resizing a window.
    BeginResize {
        /// Window being resized.
        window_id: WindowId,
        /// Edge or corner being dragged.
        edge: ResizeEdge,
        /// Pointer position at resize start.
        pointer: PointerPosition,
    },
    /// Update an in-progress window resize.
    UpdateResize {
        /// Current pointer position.
        pointer: PointerPosition,
    },
    /// End the active window resize.
    EndResize,
    /// Show the mobile app switcher.
    OpenSwitcher,
    /// Report which switcher card is centered on screen.
    PollSwitcherSlot {
        /// Index of the centered card.
        slot: usize,
    },
    /// Hide the mobile app switcher.
    CloseSwitcher {
        /// Activate the window under the current slot.
        activate: bool,
    },
    /// Retitle every window showing the given content.
    RetitleContent {
        /// Content identity (for filesystem items, the item id).
        content_key: String,
        /// New title.
        title: String,
    },
    /// Hydrate runtime state from a persisted snapshot.
    HydrateSnapshot {
        /// Snapshot payload to restore.
        snapshot: DesktopSnapshot,
    },
}

#[derive(Debug, Clone, PartialEq)]
/// Side-effect intents emitted by [`reduce_desktop`] for the runtime services to execute.
pub enum RuntimeEffect {
    /// Persist the current desktop layout snapshot.
    PersistLayout,
    /// Move focus into the newly focused window's primary input.
    FocusWindowInput(WindowId),
    /// A window appeared; spawn the process bound to it.
    SpawnProcess {
        /// New window.
        window_id: WindowId,
        /// Kind of app hosted by the window.
        app_id: AppId,
    },
    /// A window was removed; kill and detach its processes.
    KillProcess {
        /// Removed window.
        window_id: WindowId,
    },
    /// A window was minimized.
    SuspendProcess {
        /// Minimized window.
        window_id: WindowId,
    },
    /// A window was un-minimized.
    ResumeProcess {
        /// Restored window.
        window_id: WindowId,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Reducer errors for invalid actions.
pub enum ReducerError {
    /// The target window id was not found in the current state.
    #[error("window not found")]
    WindowNotFound,
    /// An explicit window id is already in use.
    #[error("window id {0} already in use")]
    DuplicateWindow(u64),
    /// The transition is not allowed in the window's current mode.
    #[error("{0} is not allowed")]
    Disallowed(&'static str),
}

/// Applies a [`DesktopAction`] to the desktop runtime state and collects resulting side effects.
///
/// This function is the authoritative state transition engine for window management. Process
/// lifecycle effects are derived once, at the end, by diffing the window list.
///
/// # Errors
///
/// Returns [`ReducerError::WindowNotFound`] when an action references a window that is not
/// present, and [`ReducerError::Disallowed`] for gestures the window or layout forbids.
pub fn reduce_desktop(
    state: &mut DesktopState,
    interaction: &mut InteractionState,
    action: DesktopAction,
) -> Result<Vec<RuntimeEffect>, ReducerError> {
    let before = state.windows.clone();
    let mut effects = Vec::new();
    match action {
        DesktopAction::OpenWindow(req) => {
            let window_id = match req.window_id {
                Some(id) if state.window(id).is_some() => {
                    return Err(ReducerError::DuplicateWindow(id.0))
                }
                Some(id) => {
                    state.next_window_id = state.next_window_id.max(id.0.saturating_add(1));
                    id
                }
                None => next_window_id(state),
            };
            let rect = initial_window_rect(&state.config, state.viewport, &req, window_id);
            let record = WindowRecord {
                id: window_id,
                app_id: req.app_id,
                title: req.title.unwrap_or_else(|| req.app_id.title().to_string()),
                component: req
                    .component
                    .unwrap_or_else(|| req.app_id.component_key().to_string()),
                launch_params: req.launch_params,
                content_key: req.content_key,
                rect,
                restore_rect: None,
                restore_maximized: false,
                z_index: 0,
                is_focused: false,
                minimized: false,
                maximized: false,
                flags: req.flags,
            };
            state.windows.push(record);
            focus(state, window_id)?;
            state.switcher.open = false;
            effects.push(RuntimeEffect::PersistLayout);
            effects.push(RuntimeEffect::FocusWindowInput(window_id));
        }
        DesktopAction::UpdateWindow { window_id, patch } => {
            let window = find_window_mut(state, window_id)?;
            if patch.maximized == Some(true) && !window.flags.maximizable {
                return Err(ReducerError::Disallowed("maximizing this window"));
            }
            if patch.minimized == Some(true) && !window.flags.minimizable {
                return Err(ReducerError::Disallowed("minimizing this window"));
            }
            if let Some(title) = patch.title {
                window.title = title;
            }
            if let Some(launch_params) = patch.launch_params {
                window.launch_params = launch_params;
            }
            if let Some(rect) = patch.rect {
                window.rect = rect;
            }
            match patch.maximized {
                Some(true) => {
                    maximize_window_internal(state, window_id);
                }
                Some(false) => {
                    unmaximize_window_internal(state, window_id);
                }
                None => {}
            }
            match patch.minimized {
                Some(true) => {
                    minimize_window_internal(state, window_id);
                }
                Some(false) => {
                    focus(state, window_id)?;
                }
                None => {}
            }
            effects.push(RuntimeEffect::PersistLayout);
        }
        DesktopAction::CloseWindow { window_id } => {
            let before_len = state.windows.len();
            state.windows.retain(|w| w.id != window_id);
            if state.windows.len() == before_len {
                return Err(ReducerError::WindowNotFound);
            }
            if interaction
                .dragging
                .as_ref()
                .is_some_and(|s| s.window_id == window_id)
            {
                interaction.dragging = None;
            }
            if interaction
                .resizing
                .as_ref()
                .is_some_and(|s| s.window_id == window_id)
            {
                interaction.resizing = None;
            }
            clamp_switcher_slot(state);
            effects.push(RuntimeEffect::PersistLayout);
        }
        DesktopAction::FocusWindow { window_id } => {
            focus(state, window_id)?;
            effects.push(RuntimeEffect::FocusWindowInput(window_id));
        }
        DesktopAction::MinimizeWindow { window_id } => {
            if !find_window_mut(state, window_id)?.flags.minimizable {
                return Err(ReducerError::Disallowed("minimizing this window"));
            }
            minimize_window_internal(state, window_id);
            effects.push(RuntimeEffect::PersistLayout);
        }
        DesktopAction::MaximizeWindow { window_id } => {
            if !find_window_mut(state, window_id)?.flags.maximizable {
                return Err(ReducerError::Disallowed("maximizing this window"));
            }
            maximize_window_internal(state, window_id);
            effects.push(RuntimeEffect::PersistLayout);
        }
        DesktopAction::RestoreWindow { window_id } => {
            let window = find_window_mut(state, window_id)?;
            if window.minimized {
                focus(state, window_id)?;
            } else {
                unmaximize_window_internal(state, window_id);
                focus(state, window_id)?;
            }
            effects.push(RuntimeEffect::PersistLayout);
        }
        DesktopAction::ToggleMaximize { window_id } => {
            let window = find_window_mut(state, window_id)?;
            if window.maximized {
                unmaximize_window_internal(state, window_id);
                focus(state, window_id)?;
            } else if window.flags.maximizable {
                maximize_window_internal(state, window_id);
            } else {
                return Err(ReducerError::Disallowed("maximizing this window"));
            }
            effects.push(RuntimeEffect::PersistLayout);
        }
        DesktopAction::ToggleTaskbarWindow { window_id } => {
            let focused = state.focused_window_id() == Some(window_id);
            let window = find_window_mut(state, window_id)?;
            if window.minimized {
                focus(state, window_id)?;
                effects.push(RuntimeEffect::PersistLayout);
            } else if focused && window.flags.minimizable {
                minimize_window_internal(state, window_id);
                effects.push(RuntimeEffect::PersistLayout);
            } else {
                focus(state, window_id)?;
                effects.push(RuntimeEffect::FocusWindowInput(window_id));
            }
        }
        DesktopAction::SetViewport { viewport } => {
            state.viewport = viewport;
            fit_maximized_windows(state);
            if !state.is_mobile() {
                state.switcher = Default::default();
            }
        }
        DesktopAction::BeginMove {
            window_id,
            pointer,
            hit,
        } => {
            let rect_start = find_window_mut(state, window_id)?.rect;
            if state.is_mobile() {
                return Err(ReducerError::Disallowed("dragging on the mobile layout"));
            }
            focus(state, window_id)?;
            let in_title_bar =
                !hit.over_interactive && (0..state.config.titlebar_hit_height).contains(&hit.offset_y);
            if in_title_bar {
                interaction.resizing = None;
                interaction.dragging = Some(DragSession {
                    window_id,
                    pointer_start: pointer,
                    rect_start,
                    grab_offset_y: hit.offset_y,
                    started: false,
                });
            }
        }
        DesktopAction::UpdateMove { pointer } => {
            if let Some(mut session) = interaction.dragging.clone() {
                update_drag(state, &mut session, pointer)?;
                interaction.dragging = Some(session);
            }
        }
        DesktopAction::EndMove => {
            if let Some(session) = interaction.dragging.take() {
                if session.started {
                    maximize_if_dropped_on_menu_bar(state, session.window_id);
                    effects.push(RuntimeEffect::PersistLayout);
                }
            }
        }
        DesktopAction::BeginResize {
            window_id,
            edge,
            pointer,
        } => {
            let window = find_window_mut(state, window_id)?;
            if window.maximized {
                return Err(ReducerError::Disallowed("resizing a maximized window"));
            }
            if !window.flags.resizable {
                return Err(ReducerError::Disallowed("resizing this window"));
            }
            let rect_start = window.rect;
            if state.is_mobile() {
                return Err(ReducerError::Disallowed("resizing on the mobile layout"));
            }
            focus(state, window_id)?;
            interaction.dragging = None;
            interaction.resizing = Some(ResizeSession {
                window_id,
                edge,
                pointer_start: pointer,
                rect_start,
            });
        }
        DesktopAction::UpdateResize { pointer } => {
            if let Some(session) = interaction.resizing.as_ref() {
                let dx = pointer.x - session.pointer_start.x;
                let dy = pointer.y - session.pointer_start.y;
                let (min_w, min_h) = (state.config.min_width, state.config.min_height);
                let window = find_window_mut(state, session.window_id)?;
                let raw = resize_rect(session.rect_start, session.edge, dx, dy);
                window.rect = anchored_min(session.rect_start, session.edge, raw, min_w, min_h);
            }
        }
        DesktopAction::EndResize => {
            if interaction.resizing.take().is_some() {
                effects.push(RuntimeEffect::PersistLayout);
            }
        }
        DesktopAction::OpenSwitcher => {
            if !state.is_mobile() {
                return Err(ReducerError::Disallowed("the app switcher outside the mobile layout"));
            }
            state.switcher.open = true;
            state.switcher.slot = state
                .focused_window_id()
                .and_then(|id| state.windows.iter().position(|w| w.id == id))
                .unwrap_or(0);
        }
        DesktopAction::PollSwitcherSlot { slot } => {
            if state.switcher.open {
                state.switcher.slot = slot;
                clamp_switcher_slot(state);
            }
        }
        DesktopAction::CloseSwitcher { activate } => {
            let target = state.windows.get(state.switcher.slot).map(|w| w.id);
            state.switcher.open = false;
            if let (true, Some(window_id)) = (activate, target) {
                focus(state, window_id)?;
                effects.push(RuntimeEffect::FocusWindowInput(window_id));
            }
        }
        DesktopAction::RetitleContent { content_key, title } => {
            let mut changed = false;
            for window in state
                .windows
                .iter_mut()
                .filter(|w| w.content_key.as_deref() == Some(content_key.as_str()))
            {
                window.title = title.clone();
                changed = true;
            }
            if changed {
                effects.push(RuntimeEffect::PersistLayout);
            }
        }
        DesktopAction::HydrateSnapshot { snapshot } => {
            *state = DesktopState::from_snapshot(snapshot, state.viewport);
            *interaction = InteractionState::default();
            fit_maximized_windows(state);
        }
    }

    normalize_window_stack(state);
    effects.extend(lifecycle_effects(&before, &state.windows));
    Ok(effects)
}

/// Process lifecycle intents implied by a change of the window list.
///
/// New windows spawn (and suspend at once when minimized), removed windows kill, and minimize
/// flips suspend or resume.
pub fn lifecycle_effects(before: &[WindowRecord], after: &[WindowRecord]) -> Vec<RuntimeEffect> {
    let mut effects = Vec::new();
    for window in after {
        match before.iter().find(|w| w.id == window.id) {
            None => {
                effects.push(RuntimeEffect::SpawnProcess {
                    window_id: window.id,
                    app_id: window.app_id,
                });
                // Restored layouts can bring windows back already minimized.
                if window.minimized {
                    effects.push(RuntimeEffect::SuspendProcess {
                        window_id: window.id,
                    });
                }
            }
            Some(previous) if !previous.minimized && window.minimized => {
                effects.push(RuntimeEffect::SuspendProcess {
                    window_id: window.id,
                })
            }
            Some(previous) if previous.minimized && !window.minimized => {
                effects.push(RuntimeEffect::ResumeProcess {
                    window_id: window.id,
                })
            }
            Some(_) => {}
        }
    }
    for window in before {
        if !after.iter().any(|w| w.id == window.id) {
            effects.push(RuntimeEffect::KillProcess {
                window_id: window.id,
            });
        }
    }
    effects
}

fn update_drag(
    state: &mut DesktopState,
    session: &mut DragSession,
    pointer: PointerPosition,
) -> Result<(), ReducerError> {
    let dx = pointer.x - session.pointer_start.x;
    let dy = pointer.y - session.pointer_start.y;
    let config = state.config.clone();
    if !session.started {
        if dx.abs() <= config.drag_dead_zone && dy.abs() <= config.drag_dead_zone {
            return Ok(());
        }
        session.started = true;
    }

    let viewport = state.viewport;
    let window = find_window_mut(state, session.window_id)?;
    if window.maximized {
        if dy.abs() <= config.tear_off_threshold {
            return Ok(());
        }
        let restored = window
            .restore_rect
            .map(|rect| rect.size())
            .unwrap_or(config.default_window);
        let torn = clamp_drag_rect(
            tear_off_rect(
                restored,
                pointer,
                session.grab_offset_y,
                config.titlebar_hit_height,
            ),
            viewport,
        );
        window.rect = torn;
        window.maximized = false;
        session.pointer_start = pointer;
        session.rect_start = torn;
    } else {
        window.rect = clamp_drag_rect(session.rect_start.offset(dx, dy), viewport);
    }
    Ok(())
}

fn clamp_switcher_slot(state: &mut DesktopState) {
    let last = state.windows.len().saturating_sub(1);
    state.switcher.slot = state.switcher.slot.min(last);
}

fn next_window_id(state: &mut DesktopState) -> WindowId {
    let id = WindowId(state.next_window_id);
    state.next_window_id = state.next_window_id.saturating_add(1);
    id
}

fn find_window_mut(
    state: &mut DesktopState,
    window_id: WindowId,
) -> Result<&mut WindowRecord, ReducerError> {
    state
        .windows
        .iter_mut()
        .find(|w| w.id == window_id)
        .ok_or(ReducerError::WindowNotFound)
}

fn focus(state: &mut DesktopState, window_id: WindowId) -> Result<(), ReducerError> {
    if focus_window_internal(state, window_id) {
        Ok(())
    } else {
        Err(ReducerError::WindowNotFound)
    }
}
