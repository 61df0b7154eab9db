//! # Auricle Common
//!
//! Shared code for the audio identification engine:
//! - Error type used by every component (`error`)
//! - Environment-driven configuration (`config`)
//! - Small time helpers (`time`)

pub mod config;
pub mod error;
pub mod time;

pub use config::Settings;
pub use error::{Error, Result};
