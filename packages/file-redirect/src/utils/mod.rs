// packages/file-redirect/src/utils/mod.rs
//! Shared configuration and error types

pub mod config;
pub mod errors;

pub use self::config::RedirectConfig;
pub use self::errors::{RedirectError, Result};
