//! Virtual filesystem domain: item model, path helpers, the in-memory engine, and the
//! permission-gate contract.

pub mod path;
pub mod service;
pub mod types;
pub mod vfs;
