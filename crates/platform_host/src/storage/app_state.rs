//! Snapshot persistence contracts: versioned envelopes and the store trait.
//!
//! The desktop core never talks to a concrete backend. It wraps serializable snapshots in an
//! [`AppStateEnvelope`] and hands them to an [`AppStateStore`]; schema migration is the caller's
//! business.

use std::{cell::RefCell, collections::BTreeMap, future::Future, pin::Pin, rc::Rc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Version of the envelope wrapper itself, independent of payload schemas.
pub const APP_STATE_ENVELOPE_VERSION: u32 = 1;
/// Namespace of the desktop window-layout snapshot.
pub const DESKTOP_STATE_NAMESPACE: &str = "system.desktop";
/// Namespace of the virtual filesystem snapshot.
pub const FILESYSTEM_STATE_NAMESPACE: &str = "system.filesystem";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Versioned wrapper around one persisted snapshot.
pub struct AppStateEnvelope {
    /// Wrapper format version.
    pub envelope_version: u32,
    /// Owning domain; one envelope per namespace.
    pub namespace: String,
    /// Payload schema version, defined by the owning domain.
    pub schema_version: u32,
    /// Write time in unix milliseconds, strictly increasing within a process.
    pub updated_at_unix_ms: u64,
    /// Snapshot as JSON.
    pub payload: Value,
}

impl AppStateEnvelope {
    /// Wraps an already-encoded payload.
    pub fn new(namespace: impl Into<String>, schema_version: u32, payload: Value) -> Self {
        Self {
            envelope_version: APP_STATE_ENVELOPE_VERSION,
            namespace: namespace.into(),
            schema_version,
            updated_at_unix_ms: crate::time::next_monotonic_timestamp_ms(),
            payload,
        }
    }

    /// Decodes the payload as `T`, whatever its schema version.
    ///
    /// # Errors
    ///
    /// Returns the serde error text when the payload does not fit `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, String> {
        T::deserialize(&self.payload).map_err(|err| err.to_string())
    }
}

/// Boxed future returned by [`AppStateStore`] methods.
pub type AppStateStoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Save/load boundary for persisted snapshots, keyed by namespace.
///
/// Backends report failures as display strings.
pub trait AppStateStore {
    /// The envelope last saved under `namespace`, if any.
    fn load<'a>(
        &'a self,
        namespace: &'a str,
    ) -> AppStateStoreFuture<'a, Result<Option<AppStateEnvelope>, String>>;

    /// Stores `envelope` under its namespace, replacing what was there.
    fn save<'a>(&'a self, envelope: &'a AppStateEnvelope)
        -> AppStateStoreFuture<'a, Result<(), String>>;

    /// Forgets the envelope under `namespace`.
    fn remove<'a>(&'a self, namespace: &'a str) -> AppStateStoreFuture<'a, Result<(), String>>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Store that keeps nothing; used when persistence is unavailable.
pub struct NoopAppStateStore;

impl AppStateStore for NoopAppStateStore {
    fn load<'a>(
        &'a self,
        _namespace: &'a str,
    ) -> AppStateStoreFuture<'a, Result<Option<AppStateEnvelope>, String>> {
        Box::pin(async { Ok(None) })
    }

    fn save<'a>(
        &'a self,
        _envelope: &'a AppStateEnvelope,
    ) -> AppStateStoreFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }

    fn remove<'a>(&'a self, _namespace: &'a str) -> AppStateStoreFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory store. Clones share one backing map, so a test can keep a handle to inspect what
/// the runtime wrote.
pub struct MemoryAppStateStore {
    envelopes: Rc<RefCell<BTreeMap<String, AppStateEnvelope>>>,
}

impl MemoryAppStateStore {
    /// Stored namespaces in sorted order.
    pub fn namespaces(&self) -> Vec<String> {
        self.envelopes.borrow().keys().cloned().collect()
    }

    /// Copy of the envelope stored under `namespace`.
    pub fn envelope(&self, namespace: &str) -> Option<AppStateEnvelope> {
        self.envelopes.borrow().get(namespace).cloned()
    }
}

impl AppStateStore for MemoryAppStateStore {
    fn load<'a>(
        &'a self,
        namespace: &'a str,
    ) -> AppStateStoreFuture<'a, Result<Option<AppStateEnvelope>, String>> {
        let found = self.envelope(namespace);
        Box::pin(async move { Ok(found) })
    }

    fn save<'a>(
        &'a self,
        envelope: &'a AppStateEnvelope,
    ) -> AppStateStoreFuture<'a, Result<(), String>> {
        self.envelopes
            .borrow_mut()
            .insert(envelope.namespace.clone(), envelope.clone());
        Box::pin(async { Ok(()) })
    }

    fn remove<'a>(&'a self, namespace: &'a str) -> AppStateStoreFuture<'a, Result<(), String>> {
        self.envelopes.borrow_mut().remove(namespace);
        Box::pin(async { Ok(()) })
    }
}

/// Encodes `payload` and wraps it in a fresh envelope.
///
/// # Errors
///
/// Returns the serde error text when `payload` cannot be encoded.
pub fn build_app_state_envelope<T: Serialize>(
    namespace: &str,
    schema_version: u32,
    payload: &T,
) -> Result<AppStateEnvelope, String> {
    serde_json::to_value(payload)
        .map(|payload| AppStateEnvelope::new(namespace, schema_version, payload))
        .map_err(|err| err.to_string())
}

/// Encodes `payload` and saves it under `namespace`.
///
/// # Errors
///
/// Returns encode failures and backend errors.
pub async fn save_app_state_with<T: Serialize>(
    store: &dyn AppStateStore,
    namespace: &str,
    schema_version: u32,
    payload: &T,
) -> Result<(), String> {
    let envelope = build_app_state_envelope(namespace, schema_version, payload)?;
    store.save(&envelope).await
}
