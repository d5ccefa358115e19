//! Snapshot persistence for the filesystem and the desktop layout.
//!
//! Both snapshots travel in versioned [`AppStateEnvelope`]s through an [`AppStateStore`]. Older
//! payload schemas are migrated on load; newer ones are refused rather than misread.

use platform_host::{
    build_app_state_envelope, save_app_state_with, AppStateEnvelope, AppStateStore,
    FileSystemItem, FsSnapshot, VirtualFileSystem, DESKTOP_STATE_NAMESPACE,
    FILESYSTEM_STATE_NAMESPACE, FS_SNAPSHOT_SCHEMA_VERSION,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::model::{DesktopSnapshot, DesktopState, DESKTOP_LAYOUT_SCHEMA_VERSION};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("snapshot encode failed: {0}")]
    Encode(String),
    #[error("snapshot decode failed: {0}")]
    Decode(String),
    #[error("app state store failed: {0}")]
    Store(String),
    /// Written by a newer build.
    #[error("unsupported snapshot schema version {0}")]
    UnsupportedSchema(u32),
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, PersistenceError> {
    serde_json::from_value(payload).map_err(|err| PersistenceError::Decode(err.to_string()))
}

fn migrate_fs_snapshot(envelope: AppStateEnvelope) -> Result<FsSnapshot, PersistenceError> {
    match envelope.schema_version {
        // Schema 0 stored the bare item list.
        0 => Ok(snapshot_from_items(decode(envelope.payload)?)),
        FS_SNAPSHOT_SCHEMA_VERSION => decode(envelope.payload),
        newer => Err(PersistenceError::UnsupportedSchema(newer)),
    }
}

fn migrate_desktop_snapshot(
    envelope: AppStateEnvelope,
) -> Result<DesktopSnapshot, PersistenceError> {
    match envelope.schema_version {
        0 | DESKTOP_LAYOUT_SCHEMA_VERSION => {
            let mut snapshot: DesktopSnapshot = decode(envelope.payload)?;
            snapshot.schema_version = DESKTOP_LAYOUT_SCHEMA_VERSION;
            Ok(snapshot)
        }
        newer => Err(PersistenceError::UnsupportedSchema(newer)),
    }
}

fn snapshot_from_items(items: Vec<FileSystemItem>) -> FsSnapshot {
    FsSnapshot {
        schema_version: FS_SNAPSHOT_SCHEMA_VERSION,
        items,
        users: Vec::new(),
    }
}

async fn load_envelope(
    store: &dyn AppStateStore,
    namespace: &str,
) -> Result<Option<AppStateEnvelope>, PersistenceError> {
    store
        .load(namespace)
        .await
        .map_err(PersistenceError::Store)
}

/// Saves the full filesystem snapshot.
///
/// # Errors
///
/// Returns [`PersistenceError::Store`] when the backend rejects the write.
pub async fn persist_filesystem(
    store: &dyn AppStateStore,
    fs: &VirtualFileSystem,
) -> Result<(), PersistenceError> {
    save_app_state_with(
        store,
        FILESYSTEM_STATE_NAMESPACE,
        FS_SNAPSHOT_SCHEMA_VERSION,
        &fs.snapshot(),
    )
    .await
    .map_err(PersistenceError::Store)
}

/// Loads the persisted filesystem, acting on behalf of `current_user`.
///
/// Returns `Ok(None)` when nothing has been stored yet.
///
/// # Errors
///
/// Returns store and decode failures, and [`PersistenceError::UnsupportedSchema`] for snapshots
/// written by a newer schema.
pub async fn load_filesystem(
    store: &dyn AppStateStore,
    current_user: &str,
) -> Result<Option<VirtualFileSystem>, PersistenceError> {
    let Some(envelope) = load_envelope(store, FILESYSTEM_STATE_NAMESPACE).await? else {
        return Ok(None);
    };
    let snapshot = migrate_fs_snapshot(envelope)?;
    let mut fs = VirtualFileSystem::new(current_user);
    fs.restore_snapshot(snapshot);
    Ok(Some(fs))
}

/// Saves the desktop window layout.
///
/// # Errors
///
/// Returns [`PersistenceError::Store`] when the backend rejects the write.
pub async fn persist_layout(
    store: &dyn AppStateStore,
    state: &DesktopState,
) -> Result<(), PersistenceError> {
    save_app_state_with(
        store,
        DESKTOP_STATE_NAMESPACE,
        DESKTOP_LAYOUT_SCHEMA_VERSION,
        &state.snapshot(),
    )
    .await
    .map_err(PersistenceError::Store)
}

/// Loads the persisted desktop layout snapshot, if any.
///
/// # Errors
///
/// Returns store and decode failures, and [`PersistenceError::UnsupportedSchema`] for newer
/// layouts.
pub async fn load_layout(
    store: &dyn AppStateStore,
) -> Result<Option<DesktopSnapshot>, PersistenceError> {
    match load_envelope(store, DESKTOP_STATE_NAMESPACE).await? {
        Some(envelope) => migrate_desktop_snapshot(envelope).map(Some),
        None => Ok(None),
    }
}

/// Exports the filesystem as a pretty-printed envelope for download.
///
/// # Errors
///
/// Returns [`PersistenceError::Encode`] if serialization fails.
pub fn export_snapshot_json(fs: &VirtualFileSystem) -> Result<String, PersistenceError> {
    let envelope = build_app_state_envelope(
        FILESYSTEM_STATE_NAMESPACE,
        FS_SNAPSHOT_SCHEMA_VERSION,
        &fs.snapshot(),
    )
    .map_err(PersistenceError::Encode)?;
    serde_json::to_string_pretty(&envelope).map_err(|err| PersistenceError::Encode(err.to_string()))
}

/// Parses an uploaded snapshot.
///
/// Accepts an exported envelope, a bare snapshot object, or a bare item array.
///
/// # Errors
///
/// Returns [`PersistenceError::Decode`] for anything else, and
/// [`PersistenceError::UnsupportedSchema`] for envelopes from a newer schema.
pub fn import_snapshot_json(raw: &str) -> Result<FsSnapshot, PersistenceError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| PersistenceError::Decode(err.to_string()))?;
    if value.is_array() {
        return decode(value).map(snapshot_from_items);
    }
    if value.get("payload").is_some() {
        if value.get("namespace").and_then(Value::as_str) != Some(FILESYSTEM_STATE_NAMESPACE) {
            return Err(PersistenceError::Decode(
                "envelope is not a filesystem snapshot".to_string(),
            ));
        }
        return migrate_fs_snapshot(decode(value)?);
    }
    if value.get("items").is_some() {
        return decode(value);
    }
    Err(PersistenceError::Decode(
        "expected a snapshot envelope, snapshot or item list".to_string(),
    ))
}
