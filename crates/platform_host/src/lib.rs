//! Host-domain contracts and the in-memory virtual filesystem used by the desktop runtime.
//!
//! This crate is the leaf of the workspace. It owns the filesystem item model and engine, the
//! permission-gate contract consulted before privileged operations, the snapshot storage
//! contract, and time helpers. It knows nothing about windows or processes.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod fs;
pub mod storage;
pub mod time;

pub use fs::path::{
    is_valid_item_name, mimetype_for_filename, numbered_name, path_segments, split_extension,
};
pub use fs::service::{
    authorize, AllowAllPermissionGate, FixedPrompter, MemoryPermissionGate, PermissionDecision,
    PermissionFuture, PermissionGate, PermissionPrompter, PermissionRequest, PrivilegedOperation,
};
pub use fs::types::{
    ChildQuery, ClipboardMode, ClipboardState, FileSystemItem, FsRefusal, FsSnapshot, ItemId,
    MimeType, SortKey, SortOrder, UploadedFile, UserRecord, WellKnownFolders,
    FS_SNAPSHOT_SCHEMA_VERSION, MAX_TREE_DEPTH, ROOT_ITEM_ID,
};
pub use fs::vfs::{NewItem, VirtualFileSystem};
pub use storage::app_state::{
    build_app_state_envelope, save_app_state_with, AppStateEnvelope, AppStateStore,
    AppStateStoreFuture, MemoryAppStateStore, NoopAppStateStore, APP_STATE_ENVELOPE_VERSION,
    DESKTOP_STATE_NAMESPACE, FILESYSTEM_STATE_NAMESPACE,
};
pub use time::{next_monotonic_timestamp_ms, unix_time_ms_now};
