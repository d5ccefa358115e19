//! Persistence contracts consumed through a narrow save/load boundary.

pub mod app_state;
