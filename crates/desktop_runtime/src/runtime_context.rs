//! Reactive service surfaces for the desktop shell.
//!
//! [`DesktopServices`] is a `Copy` handle over the long-lived signals: window state, pointer
//! interaction, the process table, and the virtual filesystem. Every window transition goes
//! through [`DesktopServices::dispatch`], which runs the reducer and applies its process lifecycle
//! effects in the same update, so windows and processes never drift apart.
#![allow(clippy::clone_on_copy)]

use leptos::*;
use platform_host::{
    authorize, ChildQuery, FileSystemItem, FsRefusal, FsSnapshot, ItemId, NewItem,
    PermissionRequest, UploadedFile, VirtualFileSystem, WellKnownFolders,
};

use crate::{
    apps::AppRegistry,
    effect_executor,
    gesture::GestureGuard,
    host::{self, DesktopHostContext},
    model::{
        AppId, DesktopState, InteractionState, OpenWindowRequest, PointerPosition, ResizeEdge,
        TitleBarHit, ViewportInfo, WindowId, WindowPatch, WindowRecord,
    },
    persistence::{self, PersistenceError},
    process::{ProcessError, ProcessId, ProcessRecord, ProcessState, ProcessTable},
    reducer::{reduce_desktop, DesktopAction, ReducerError, RuntimeEffect},
    resolver::{resolve_launch, LaunchTarget},
};

#[derive(Clone, Copy)]
/// Handle to the desktop's window, process and filesystem services.
pub struct DesktopServices {
    /// Host service bundle for storage and permission prompts.
    pub host: StoredValue<DesktopHostContext>,
    /// Launchable applications.
    pub registry: StoredValue<AppRegistry>,
    /// Reactive desktop state signal.
    pub state: RwSignal<DesktopState>,
    /// Reactive pointer/drag/resize interaction state signal.
    pub interaction: RwSignal<InteractionState>,
    /// Process table kept in step with the window list.
    pub processes: RwSignal<ProcessTable>,
    /// Virtual filesystem; the single source of truth for items.
    pub fs: RwSignal<VirtualFileSystem>,
    /// Queue of reducer effects that run outside the reducer (persistence, DOM focus).
    pub effects: RwSignal<Vec<RuntimeEffect>>,
    gesture: StoredValue<Option<GestureGuard>>,
}

impl DesktopServices {
    /// Creates the service signals in the current reactive runtime.
    pub fn new(host: DesktopHostContext, registry: AppRegistry, fs: VirtualFileSystem) -> Self {
        Self {
            host: store_value(host),
            registry: store_value(registry),
            state: create_rw_signal(DesktopState::default()),
            interaction: create_rw_signal(InteractionState::default()),
            processes: create_rw_signal(ProcessTable::default()),
            fs: create_rw_signal(fs),
            effects: create_rw_signal(Vec::new()),
            gesture: store_value(None),
        }
    }

    /// Runs one reducer action and applies the resulting effects.
    ///
    /// Process lifecycle effects are applied to the process table before this returns; other
    /// effects are queued on [`DesktopServices::effects`].
    ///
    /// # Errors
    ///
    /// Returns the reducer error unchanged (state untouched), after logging it.
    pub fn dispatch(&self, action: DesktopAction) -> Result<(), ReducerError> {
        let mut desktop = self.state.get_untracked();
        let mut ui = self.interaction.get_untracked();
        let previous_desktop = desktop.clone();
        let previous_ui = ui.clone();

        match reduce_desktop(&mut desktop, &mut ui, action) {
            Ok(effects) => {
                if desktop != previous_desktop {
                    self.state.set(desktop);
                }
                if ui != previous_ui {
                    self.interaction.set(ui);
                }
                let queued: Vec<RuntimeEffect> = effects
                    .into_iter()
                    .filter(|effect| !self.apply_lifecycle_effect(effect))
                    .collect();
                if !queued.is_empty() {
                    self.effects.update(|queue| queue.extend(queued));
                }
                Ok(())
            }
            Err(err) => {
                logging::warn!("desktop reducer error: {err}");
                Err(err)
            }
        }
    }

    /// Returns `true` when `effect` was a process lifecycle effect and has been applied.
    fn apply_lifecycle_effect(&self, effect: &RuntimeEffect) -> bool {
        match *effect {
            RuntimeEffect::SpawnProcess { window_id, app_id } => {
                self.spawn(app_id, Some(window_id));
            }
            RuntimeEffect::KillProcess { window_id } => {
                let mut released = Vec::new();
                self.processes
                    .update(|table| released = table.release_window(window_id));
                for pid in released {
                    logging::log!("process {pid} ended with window {}", window_id.0);
                }
            }
            RuntimeEffect::SuspendProcess { window_id } => {
                if let Some(pid) = self.pid_for_window(window_id) {
                    let _ = self.suspend(pid);
                }
            }
            RuntimeEffect::ResumeProcess { window_id } => {
                if let Some(pid) = self.pid_for_window(window_id) {
                    let _ = self.resume(pid);
                }
            }
            RuntimeEffect::PersistLayout | RuntimeEffect::FocusWindowInput(_) => return false,
        }
        true
    }

    /// Drains queued effects without running them.
    pub fn take_effects(&self) -> Vec<RuntimeEffect> {
        let queued = self.effects.get_untracked();
        if !queued.is_empty() {
            self.effects.set(Vec::new());
        }
        queued
    }

    // Windows

    /// Opens a window and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`ReducerError::DuplicateWindow`] when an explicit id is taken.
    pub fn add_window(&self, request: OpenWindowRequest) -> Result<WindowId, ReducerError> {
        self.dispatch(DesktopAction::OpenWindow(request))?;
        self.state
            .with_untracked(DesktopState::focused_window_id)
            .ok_or(ReducerError::WindowNotFound)
    }

    pub fn update_window(
        &self,
        window_id: WindowId,
        patch: WindowPatch,
    ) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::UpdateWindow { window_id, patch })
    }

    /// Closes a window; its process is killed through the lifecycle effects.
    pub fn remove_window(&self, window_id: WindowId) -> Result<(), ReducerError> {
        if self.interaction.with_untracked(|ui| !ui.is_idle()) {
            self.end_gesture();
        }
        self.dispatch(DesktopAction::CloseWindow { window_id })
    }

    pub fn set_active_window(&self, window_id: WindowId) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::FocusWindow { window_id })
    }

    pub fn minimize_window(&self, window_id: WindowId) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::MinimizeWindow { window_id })
    }

    pub fn maximize_window(&self, window_id: WindowId) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::MaximizeWindow { window_id })
    }

    pub fn restore_window(&self, window_id: WindowId) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::RestoreWindow { window_id })
    }

    /// Title-bar double-click.
    pub fn toggle_maximize(&self, window_id: WindowId) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::ToggleMaximize { window_id })
    }

    /// Dock button click.
    pub fn toggle_taskbar_window(&self, window_id: WindowId) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::ToggleTaskbarWindow { window_id })
    }

    /// Tracked copy of the window list.
    pub fn windows(&self) -> Vec<WindowRecord> {
        self.state.with(|state| state.windows.clone())
    }

    pub fn window(&self, window_id: WindowId) -> Option<WindowRecord> {
        self.state.with(|state| state.window(window_id).cloned())
    }

    pub fn active_window_id(&self) -> Option<WindowId> {
        self.state.with(DesktopState::focused_window_id)
    }

    pub fn set_viewport(&self, viewport: ViewportInfo) {
        let _ = self.dispatch(DesktopAction::SetViewport { viewport });
    }

    pub fn open_switcher(&self) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::OpenSwitcher)
    }

    pub fn poll_switcher_slot(&self, slot: usize) {
        let _ = self.dispatch(DesktopAction::PollSwitcherSlot { slot });
    }

    pub fn close_switcher(&self, activate: bool) -> Result<(), ReducerError> {
        self.dispatch(DesktopAction::CloseSwitcher { activate })
    }

    /// Opens `target` through the item resolver and the multi-instance policy.
    ///
    /// Single-window apps reuse their open window and reusable apps reuse the window already
    /// showing the same content; either way the window is restored and focused. Returns `None`
    /// when nothing can open the target.
    pub fn launch(&self, target: LaunchTarget) -> Option<WindowId> {
        let action = self.fs.with_untracked(|fs| {
            self.registry
                .with_value(|registry| resolve_launch(&target, fs, registry))
        });
        let Some(action) = action else {
            logging::warn!("nothing can open {target:?}");
            return None;
        };
        let app = self
            .registry
            .with_value(|registry| registry.get(&action.app_id).cloned())?;

        let existing = self.state.with_untracked(|state| {
            state
                .windows
                .iter()
                .find(|w| {
                    w.component == app.component
                        && (!app.multiwindow
                            || (app.reusable
                                && action.content_key.is_some()
                                && w.content_key == action.content_key))
                })
                .map(|w| w.id)
        });
        if let Some(window_id) = existing {
            return self.set_active_window(window_id).ok().map(|_| window_id);
        }

        let mut request = app.open_request();
        request.title = Some(action.title);
        request.launch_params = action.launch_params;
        request.content_key = action.content_key;
        self.add_window(request).ok()
    }

    // Gestures

    /// Pointer-down on a window frame. Starts a drag when the hit is in the title bar.
    ///
    /// Any gesture still in progress is ended first.
    pub fn begin_move(
        &self,
        window_id: WindowId,
        pointer: PointerPosition,
        hit: TitleBarHit,
    ) -> Result<(), ReducerError> {
        self.end_gesture();
        self.dispatch(DesktopAction::BeginMove {
            window_id,
            pointer,
            hit,
        })?;
        if self.interaction.with_untracked(|ui| ui.dragging.is_some()) {
            self.install_gesture(DesktopAction::EndMove);
        }
        Ok(())
    }

    /// Starts resizing from `edge`.
    pub fn begin_resize(
        &self,
        window_id: WindowId,
        edge: ResizeEdge,
        pointer: PointerPosition,
    ) -> Result<(), ReducerError> {
        self.end_gesture();
        self.dispatch(DesktopAction::BeginResize {
            window_id,
            edge,
            pointer,
        })?;
        self.install_gesture(DesktopAction::EndResize);
        Ok(())
    }

    /// Feeds a pointer position to the active drag or resize.
    pub fn update_pointer(&self, pointer: PointerPosition) {
        let (dragging, resizing) = self
            .interaction
            .with_untracked(|ui| (ui.dragging.is_some(), ui.resizing.is_some()));
        let action = if dragging {
            DesktopAction::UpdateMove { pointer }
        } else if resizing {
            DesktopAction::UpdateResize { pointer }
        } else {
            return;
        };
        let _ = self.dispatch(action);
    }

    /// Ends the active gesture, committing the current geometry. Returns `false` when idle.
    pub fn end_gesture(&self) -> bool {
        let guard = self.gesture.try_update_value(Option::take).flatten();
        match guard {
            Some(guard) => guard.release(),
            None => false,
        }
    }

    fn install_gesture(&self, end: DesktopAction) {
        let services = *self;
        let guard = GestureGuard::with_pointer_listeners(
            move |pointer| services.update_pointer(pointer),
            move || {
                let _ = services.dispatch(end);
                services.gesture.update_value(|slot| {
                    slot.take();
                });
            },
        );
        self.gesture.set_value(Some(guard));
    }

    // Processes

    /// Starts a process; window-bound processes are normally spawned by `add_window`.
    pub fn spawn(&self, app_id: AppId, window_id: Option<WindowId>) -> ProcessId {
        let mut pid = ProcessId(0);
        self.processes
            .update(|table| pid = table.spawn(app_id, window_id));
        logging::log!("spawned process {pid} ({})", app_id.component_key());
        pid
    }

    fn update_process(
        &self,
        pid: ProcessId,
        op: impl FnOnce(&mut ProcessTable) -> Result<ProcessState, ProcessError>,
    ) -> Result<ProcessState, ProcessError> {
        let mut table = self.processes.get_untracked();
        let before = table.get(pid).map(|p| p.state);
        match op(&mut table) {
            Ok(state) => {
                if before != Some(state) {
                    self.processes.set(table);
                }
                Ok(state)
            }
            Err(err) => {
                logging::warn!("process service: {err}");
                Err(err)
            }
        }
    }

    pub fn suspend(&self, pid: ProcessId) -> Result<ProcessState, ProcessError> {
        self.update_process(pid, |table| table.suspend(pid))
    }

    pub fn resume(&self, pid: ProcessId) -> Result<ProcessState, ProcessError> {
        self.update_process(pid, |table| table.resume(pid))
    }

    /// Marks the process killed. The window, if any, stays until removed.
    pub fn kill(&self, pid: ProcessId) -> Result<ProcessState, ProcessError> {
        let state = self.update_process(pid, |table| table.kill(pid))?;
        logging::log!("process {pid} is {state:?}");
        Ok(state)
    }

    pub fn crash(&self, pid: ProcessId, message: &str) -> Result<ProcessState, ProcessError> {
        let state = self.update_process(pid, |table| table.crash(pid, message))?;
        logging::error!("process {pid} crashed: {message}");
        Ok(state)
    }

    fn pid_for_window(&self, window_id: WindowId) -> Option<ProcessId> {
        self.processes
            .with_untracked(|table| table.get_by_window(window_id).map(|p| p.pid))
    }

    pub fn process_for_window(&self, window_id: WindowId) -> Option<ProcessRecord> {
        self.processes
            .with(|table| table.get_by_window(window_id).cloned())
    }

    /// Full process table including terminal rows.
    pub fn processes(&self) -> Vec<ProcessRecord> {
        self.processes.with(|table| table.processes().to_vec())
    }

    /// Entry point for hosted-app rendering faults. The window stays open.
    pub fn report_app_fault(&self, window_id: WindowId, message: &str) -> Option<ProcessId> {
        let pid = self.pid_for_window(window_id)?;
        self.crash(pid, message).ok().map(|_| pid)
    }

    /// Kills the window's process, then closes the window.
    pub fn force_quit(&self, window_id: WindowId) -> Result<(), ReducerError> {
        if let Some(pid) = self.pid_for_window(window_id) {
            let _ = self.kill(pid);
        }
        self.remove_window(window_id)
    }

    // Filesystem

    /// Applies `op` to a copy of the filesystem and publishes it on success.
    fn mutate_fs<T>(
        &self,
        op: impl FnOnce(&mut VirtualFileSystem) -> Result<T, FsRefusal>,
    ) -> Result<T, FsRefusal> {
        let mut fs = self.fs.get_untracked();
        match op(&mut fs) {
            Ok(value) => {
                self.fs.set(fs);
                Ok(value)
            }
            Err(err) => {
                logging::warn!("filesystem refused: {err}");
                Err(err)
            }
        }
    }

    /// Runs `op` after the permission gate approves `request`.
    ///
    /// The live filesystem is read after the gate resolves, so edits made while a prompt was open
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`FsRefusal::PermissionDenied`] when the gate or the user says no, or the
    /// refusal from `op`.
    pub async fn run_privileged<T>(
        &self,
        request: PermissionRequest,
        op: impl FnOnce(&mut VirtualFileSystem) -> Result<T, FsRefusal>,
    ) -> Result<T, FsRefusal> {
        let host = self.host.get_value();
        let gate = host.permission_gate();
        let prompter = host.prompter();
        if let Err(err) = authorize(gate.as_ref(), prompter.as_ref(), &request).await {
            logging::warn!("permission refused: {err}");
            return Err(err);
        }
        self.mutate_fs(op)
    }

    pub fn items(&self) -> Vec<FileSystemItem> {
        self.fs.with(|fs| fs.items().to_vec())
    }

    pub fn item(&self, id: &ItemId) -> Option<FileSystemItem> {
        self.fs.with(|fs| fs.item(id).cloned())
    }

    pub fn children(&self, parent: &ItemId, query: ChildQuery) -> Vec<FileSystemItem> {
        self.fs.with(|fs| {
            fs.resolve_children(parent, query)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Deepest item matched by walking `segments` from `start`.
    pub fn resolve_path<S: AsRef<str>>(&self, start: &ItemId, segments: &[S]) -> ItemId {
        self.fs.with(|fs| fs.resolve_path_to_id(start, segments))
    }

    /// Item a typed address (explorer location bar) leads to from `start`.
    pub fn resolve_address(&self, start: &ItemId, address: &str) -> ItemId {
        self.fs.with(|fs| fs.resolve_address(start, address))
    }

    pub fn breadcrumb(&self, id: &ItemId) -> Vec<String> {
        self.fs.with(|fs| fs.breadcrumb(id))
    }

    pub fn well_known(&self, username: &str) -> Option<WellKnownFolders> {
        self.fs.with(|fs| fs.well_known(username))
    }

    pub fn create_folder(&self, name: &str, parent: &ItemId) -> Result<ItemId, FsRefusal> {
        self.mutate_fs(|fs| fs.create_folder(name, parent))
    }

    pub fn create_file(
        &self,
        name: &str,
        parent: &ItemId,
        content: Option<String>,
    ) -> Result<ItemId, FsRefusal> {
        self.mutate_fs(|fs| fs.create_file(name, parent, content))
    }

    pub fn create_shortcut(
        &self,
        name: &str,
        parent: &ItemId,
        target: &ItemId,
    ) -> Result<ItemId, FsRefusal> {
        self.mutate_fs(|fs| fs.create_shortcut(name, parent, target))
    }

    pub fn create_item(&self, parent: &ItemId, new_item: NewItem) -> Result<ItemId, FsRefusal> {
        self.mutate_fs(|fs| fs.create_item(parent, new_item))
    }

    /// Renames an item and retitles the windows showing it.
    pub fn rename_item(&self, id: &ItemId, new_name: &str) -> Result<(), FsRefusal> {
        self.mutate_fs(|fs| fs.rename_item(id, new_name))?;
        let title = self
            .fs
            .with_untracked(|fs| fs.item(id).map(|item| item.name.clone()))
            .unwrap_or_else(|| new_name.to_string());
        let _ = self.dispatch(DesktopAction::RetitleContent {
            content_key: id.to_string(),
            title,
        });
        Ok(())
    }

    pub fn update_content(&self, id: &ItemId, content: String) -> Result<(), FsRefusal> {
        self.mutate_fs(|fs| fs.update_content(id, content))
    }

    pub fn move_to_trash(&self, id: &ItemId) -> Result<(), FsRefusal> {
        self.mutate_fs(|fs| fs.move_to_trash(id))
    }

    pub fn restore_from_trash(&self, id: &ItemId) -> Result<(), FsRefusal> {
        self.mutate_fs(|fs| fs.restore_from_trash(id))
    }

    pub fn empty_trash(&self, owner: &str) -> Result<Vec<ItemId>, FsRefusal> {
        self.mutate_fs(|fs| fs.empty_trash(owner))
    }

    pub fn delete_item(&self, id: &ItemId) -> Result<Vec<ItemId>, FsRefusal> {
        self.mutate_fs(|fs| fs.delete_item(id))
    }

    pub fn force_delete_item(&self, id: &ItemId) -> Result<Vec<ItemId>, FsRefusal> {
        self.mutate_fs(|fs| fs.force_delete_item(id))
    }

    pub fn move_item(&self, source: &ItemId, dest: &ItemId) -> Result<(), FsRefusal> {
        self.mutate_fs(|fs| fs.move_item(source, dest))
    }

    pub fn copy_items(&self, ids: &[ItemId]) -> Result<(), FsRefusal> {
        self.mutate_fs(|fs| fs.copy_items(ids))
    }

    pub fn cut_items(&self, ids: &[ItemId]) -> Result<(), FsRefusal> {
        self.mutate_fs(|fs| fs.cut_items(ids))
    }

    pub fn paste_items(&self, target: &ItemId) -> Result<Vec<ItemId>, FsRefusal> {
        self.mutate_fs(|fs| fs.paste_items(target))
    }

    pub fn upload_file(&self, upload: UploadedFile, parent: &ItemId) -> Result<ItemId, FsRefusal> {
        self.mutate_fs(|fs| fs.upload_file(upload, parent))
    }

    /// Replaces the item list wholesale.
    pub fn restore_snapshot(&self, snapshot: FsSnapshot) {
        self.fs.update(|fs| fs.restore_snapshot(snapshot));
    }

    // Persistence

    /// Saves the filesystem through the host store.
    pub async fn save_filesystem(&self) -> Result<(), PersistenceError> {
        let store = self.host.with_value(DesktopHostContext::app_state_store);
        let fs = self.fs.get_untracked();
        persistence::persist_filesystem(store.as_ref(), &fs).await
    }

    /// Saves the window layout through the host store.
    pub async fn save_layout(&self) -> Result<(), PersistenceError> {
        let store = self.host.with_value(DesktopHostContext::app_state_store);
        let state = self.state.get_untracked();
        persistence::persist_layout(store.as_ref(), &state).await
    }

    /// Loads the persisted filesystem and layout, keeping current values for whatever is absent.
    ///
    /// Restored windows get fresh processes through the lifecycle effects.
    pub async fn hydrate(&self) -> Result<(), PersistenceError> {
        let store = self.host.with_value(DesktopHostContext::app_state_store);
        let user = self.fs.with_untracked(|fs| fs.current_user().to_string());
        if let Some(fs) = persistence::load_filesystem(store.as_ref(), &user).await? {
            self.fs.set(fs);
        }
        if let Some(snapshot) = persistence::load_layout(store.as_ref()).await? {
            let _ = self.dispatch(DesktopAction::HydrateSnapshot { snapshot });
        }
        Ok(())
    }
}

#[component]
/// Provides [`DesktopServices`] to descendant components and boots persisted state.
pub fn DesktopProvider(
    /// Host services assembled by the entry layer.
    #[prop(optional)]
    host: Option<DesktopHostContext>,
    /// User the filesystem acts on behalf of.
    #[prop(optional, into)]
    username: Option<String>,
    children: Children,
) -> impl IntoView {
    let username = username.unwrap_or_else(|| "guest".to_string());
    let services = DesktopServices::new(
        host.unwrap_or_default(),
        AppRegistry::builtin(),
        VirtualFileSystem::with_user(&username, &username),
    );
    provide_context(services);

    services.set_viewport(host::viewport_from_host());
    #[cfg(target_arch = "wasm32")]
    {
        let resize = window_event_listener(ev::resize, move |_| {
            services.set_viewport(host::viewport_from_host());
        });
        on_cleanup(move || resize.remove());
    }

    spawn_local(async move {
        if let Err(err) = services.hydrate().await {
            logging::warn!("desktop hydration failed: {err}");
        }
    });
    effect_executor::install(services);

    children().into_view()
}

/// Returns the current [`DesktopServices`].
///
/// # Panics
///
/// Panics if called outside [`DesktopProvider`].
pub fn use_desktop_services() -> DesktopServices {
    use_context::<DesktopServices>().expect("DesktopServices not provided")
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use platform_host::{
        FixedPrompter, MemoryAppStateStore, MemoryPermissionGate, PermissionDecision,
        PrivilegedOperation,
    };
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    use super::*;

    fn services() -> (DesktopServices, WellKnownFolders) {
        services_with_host(DesktopHostContext::default())
    }

    fn services_with_host(host: DesktopHostContext) -> (DesktopServices, WellKnownFolders) {
        let fs = VirtualFileSystem::with_user("ada", "Ada");
        let folders = fs.well_known("ada").expect("seeded");
        (
            DesktopServices::new(host, AppRegistry::builtin(), fs),
            folders,
        )
    }

    fn state_of(services: &DesktopServices, window_id: WindowId) -> Option<ProcessState> {
        services.process_for_window(window_id).map(|p| p.state)
    }

    #[test]
    fn windows_and_processes_move_together() {
        let _ = create_runtime();
        let (services, _) = services();

        let id = services
            .add_window(OpenWindowRequest::new(AppId::Terminal))
            .expect("open");
        assert_eq!(state_of(&services, id), Some(ProcessState::Running));
        assert_eq!(services.active_window_id(), Some(id));

        services.minimize_window(id).expect("minimize");
        assert_eq!(state_of(&services, id), Some(ProcessState::Suspended));
        services.set_active_window(id).expect("focus");
        assert_eq!(state_of(&services, id), Some(ProcessState::Running));

        services.remove_window(id).expect("close");
        assert_eq!(state_of(&services, id), None);
        let rows = services.processes();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, ProcessState::Killed);
        assert_eq!(rows[0].window_id, None);
    }

    #[test]
    fn rejected_actions_leave_state_alone() {
        let _ = create_runtime();
        let (services, _) = services();
        let before = services.state.get_untracked();

        assert_eq!(
            services.set_active_window(WindowId(99)),
            Err(ReducerError::WindowNotFound)
        );
        assert_eq!(services.state.get_untracked(), before);
        assert!(services.processes().is_empty());
    }

    #[test]
    fn non_lifecycle_effects_are_queued() {
        let _ = create_runtime();
        let (services, _) = services();
        let id = services
            .add_window(OpenWindowRequest::new(AppId::Calculator))
            .expect("open");

        assert_eq!(
            services.take_effects(),
            vec![RuntimeEffect::PersistLayout, RuntimeEffect::FocusWindowInput(id)]
        );
        assert!(services.take_effects().is_empty());
    }

    #[test]
    fn reusable_apps_focus_the_window_already_showing_the_content() {
        let _ = create_runtime();
        let (services, folders) = services();
        let todo = services
            .create_file("todo.txt", &folders.documents, Some("milk".to_string()))
            .expect("file");

        let first = services
            .launch(LaunchTarget::Item(todo.clone()))
            .expect("opened");
        let other = services
            .launch(LaunchTarget::App("terminal".to_string()))
            .expect("terminal");
        assert_eq!(services.active_window_id(), Some(other));

        assert_eq!(services.launch(LaunchTarget::Item(todo)), Some(first));
        assert_eq!(services.active_window_id(), Some(first));
        assert_eq!(services.windows().len(), 2);

        // Plain app launches of a multi-window app always open a new window.
        let second_terminal = services
            .launch(LaunchTarget::App("Terminal".to_string()))
            .expect("terminal");
        assert_ne!(second_terminal, other);
        assert_eq!(services.windows().len(), 3);
    }

    #[test]
    fn unresolvable_launches_open_nothing() {
        let _ = create_runtime();
        let (services, _) = services();
        assert_eq!(
            services.launch(LaunchTarget::App("solitaire".to_string())),
            None
        );
        assert!(services.windows().is_empty());
    }

    #[test]
    fn renaming_an_item_retitles_its_windows() {
        let _ = create_runtime();
        let (services, folders) = services();
        let notes = services
            .create_file("notes.txt", &folders.desktop, None)
            .expect("file");
        let window = services
            .launch(LaunchTarget::Item(notes.clone()))
            .expect("open");

        services.rename_item(&notes, "ideas.txt").expect("rename");
        assert_eq!(
            services.window(window).map(|w| w.title),
            Some("ideas.txt".to_string())
        );
    }

    #[test]
    fn filesystem_refusals_do_not_publish() {
        let _ = create_runtime();
        let (services, folders) = services();
        services
            .create_folder("Notes", &folders.desktop)
            .expect("folder");
        let before = services.items();

        assert_eq!(
            services.create_folder("Notes", &folders.desktop),
            Err(FsRefusal::DuplicateName("Notes".to_string()))
        );
        assert_eq!(services.items(), before);
        assert_eq!(
            services.breadcrumb(&services.resolve_path(&folders.home, &["Desktop", "Notes"])),
            vec!["ada", "Desktop", "Notes"]
        );
    }

    #[test]
    fn privileged_operations_wait_for_the_gate() {
        let _ = create_runtime();
        let gate = MemoryPermissionGate::new(PermissionDecision::Denied);
        gate.set_rule(
            "explorer",
            PrivilegedOperation::EmptyTrash,
            PermissionDecision::Prompt,
        );
        let host =
            DesktopHostContext::default().with_permissions(Rc::new(gate), Rc::new(FixedPrompter(true)));
        let (services, folders) = services_with_host(host);
        let junk = services
            .create_file("junk.txt", &folders.desktop, None)
            .expect("file");
        services.move_to_trash(&junk).expect("trash");

        let denied = block_on(services.run_privileged(
            PermissionRequest::new("notepad", PrivilegedOperation::DeleteItem)
                .with_target(junk.clone()),
            |fs| fs.delete_item(&junk),
        ));
        assert!(matches!(denied, Err(FsRefusal::PermissionDenied(_))));
        assert!(services.item(&junk).is_some());

        let emptied = block_on(services.run_privileged(
            PermissionRequest::new("explorer", PrivilegedOperation::EmptyTrash),
            |fs| fs.empty_trash("ada"),
        ))
        .expect("prompt approved");
        assert_eq!(emptied, vec![junk.clone()]);
        assert!(services.item(&junk).is_none());
    }

    #[test]
    fn drag_gesture_ends_once() {
        let _ = create_runtime();
        let (services, _) = services();
        let id = services
            .add_window(OpenWindowRequest::new(AppId::Explorer))
            .expect("open");
        let start = services.window(id).expect("window").rect;

        services
            .begin_move(
                id,
                PointerPosition { x: 200, y: 100 },
                TitleBarHit {
                    offset_y: 10,
                    over_interactive: false,
                },
            )
            .expect("begin");
        services.update_pointer(PointerPosition { x: 260, y: 140 });
        assert!(services.end_gesture());
        assert!(!services.end_gesture());

        assert!(services.interaction.get_untracked().is_idle());
        assert_eq!(
            services.window(id).expect("window").rect,
            start.offset(60, 40)
        );
    }

    #[test]
    fn starting_a_gesture_ends_the_previous_one() {
        let _ = create_runtime();
        let (services, _) = services();
        let id = services
            .add_window(OpenWindowRequest::new(AppId::Explorer))
            .expect("open");
        let hit = TitleBarHit {
            offset_y: 10,
            over_interactive: false,
        };

        services
            .begin_move(id, PointerPosition { x: 0, y: 0 }, hit)
            .expect("first");
        services
            .begin_resize(id, ResizeEdge::SouthEast, PointerPosition { x: 0, y: 0 })
            .expect("resize");
        let ui = services.interaction.get_untracked();
        assert!(ui.dragging.is_none());
        assert!(ui.resizing.is_some());

        assert!(services.end_gesture());
        assert!(services.interaction.get_untracked().is_idle());
    }

    #[test]
    fn faults_crash_the_process_and_force_quit_closes_the_window() {
        let _ = create_runtime();
        let (services, _) = services();
        let id = services
            .add_window(OpenWindowRequest::new(AppId::Browser))
            .expect("open");

        let pid = services
            .report_app_fault(id, "render failed")
            .expect("crashed");
        assert_eq!(state_of(&services, id), Some(ProcessState::Crashed));
        assert!(services.window(id).is_some());

        services.force_quit(id).expect("force quit");
        assert!(services.window(id).is_none());
        assert_eq!(
            services
                .processes()
                .into_iter()
                .find(|p| p.pid == pid)
                .map(|p| p.state),
            Some(ProcessState::Crashed)
        );
    }

    #[test]
    fn hydrate_restores_filesystem_and_layout() {
        let _ = create_runtime();
        let store = MemoryAppStateStore::default();
        let host = DesktopHostContext::default().with_app_state_store(Rc::new(store.clone()));

        let (saved, folders) = services_with_host(host.clone());
        saved
            .create_file("todo.txt", &folders.desktop, Some("buy milk".to_string()))
            .expect("file");
        let window = saved
            .add_window(OpenWindowRequest::new(AppId::Terminal))
            .expect("open");
        block_on(saved.save_filesystem()).expect("save fs");
        block_on(saved.save_layout()).expect("save layout");

        let (restored, _) = services_with_host(host);
        block_on(restored.hydrate()).expect("hydrate");
        assert_eq!(restored.items(), saved.items());
        assert_eq!(restored.windows(), saved.windows());
        assert_eq!(state_of(&restored, window), Some(ProcessState::Running));
    }

    #[test]
    fn hydrated_minimized_windows_come_back_suspended() {
        let _ = create_runtime();
        let store = MemoryAppStateStore::default();
        let host = DesktopHostContext::default().with_app_state_store(Rc::new(store.clone()));

        let (saved, _) = services_with_host(host.clone());
        let hidden = saved
            .add_window(OpenWindowRequest::new(AppId::Terminal))
            .expect("open");
        let shown = saved
            .add_window(OpenWindowRequest::new(AppId::Explorer))
            .expect("open");
        saved.minimize_window(hidden).expect("minimize");
        block_on(saved.save_layout()).expect("save layout");

        let (restored, _) = services_with_host(host);
        block_on(restored.hydrate()).expect("hydrate");
        assert!(restored.window(hidden).is_some_and(|w| w.minimized));
        assert_eq!(state_of(&restored, hidden), Some(ProcessState::Suspended));
        assert_eq!(state_of(&restored, shown), Some(ProcessState::Running));

        restored.set_active_window(hidden).expect("focus");
        assert_eq!(state_of(&restored, hidden), Some(ProcessState::Running));
    }
}
