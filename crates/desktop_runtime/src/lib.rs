pub mod apps;
mod effect_executor;
pub mod gesture;
pub mod host;
pub mod model;
pub mod persistence;
pub mod process;
pub mod reducer;
pub mod resolver;
pub mod runtime_context;
pub mod window_manager;

pub use apps::{AppDescriptor, AppRegistry};
pub use host::{viewport_from_host, DesktopHostContext};
pub use model::*;
pub use persistence::{
    export_snapshot_json, import_snapshot_json, load_filesystem, load_layout, persist_filesystem,
    persist_layout, PersistenceError,
};
pub use process::{ProcessError, ProcessId, ProcessRecord, ProcessState, ProcessTable};
pub use reducer::{reduce_desktop, DesktopAction, ReducerError, RuntimeEffect};
pub use resolver::{resolve_launch, LaunchAction, LaunchTarget, MAX_SHORTCUT_DEPTH};
pub use runtime_context::{use_desktop_services, DesktopProvider, DesktopServices};
