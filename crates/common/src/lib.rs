//! Shared types for the lunrstore workspace
//!
//! This crate holds the record shape every stage agrees on and the layered
//! configuration used by both the library and the `lunrstore` binary.

pub mod config;
pub mod record;

// Re-export commonly used types
pub use config::{ConfigError, ConfigFile, SearchFields, SideFileSource, StoreConfig, StoreFormat};
pub use record::{ID_FIELD, Record, Variant};

/// Default config filename, looked up in the working directory
pub const CONFIG_FILENAME: &str = "lunrstore.toml";
