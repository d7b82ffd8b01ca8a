//! Arbor common types, errors, and configuration.
//!
//! This crate provides shared definitions used by every Arbor component.

pub mod config;
pub mod error;
pub mod types;
pub mod value;

pub use config::IndexConfig;
pub use error::{ArborError, Result};
pub use types::TypeId;
pub use value::Value;
