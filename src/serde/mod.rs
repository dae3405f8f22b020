//! Serde helpers for configuration values.

pub mod duration;
