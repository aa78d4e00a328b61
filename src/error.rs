//! Crate error type.
//!
//! Only configuration problems are surfaced as hard errors. Per-item
//! failures, timeouts, and cancellation all degrade into result data
//! (see [`crate::outcome`]) so a run always produces a usable report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad partition or concurrency parameters. Surfaced before any run starts.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The strategy's runtime could not be constructed.
    #[error("runtime setup failed: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
