//! Core types and configuration for the spatial clonal growth simulator.

pub mod config;
pub mod error;
pub mod palette;
pub mod snapshot;
pub mod stats;
pub mod types;

pub use config::*;
pub use error::{Error, Result};
pub use snapshot::*;
pub use types::*;
