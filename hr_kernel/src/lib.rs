#![forbid(unsafe_code)]

/// Kernel v1. Changing canonical hashing or chain rules requires a bump.
pub const KERNEL_VERSION: u32 = 1;

pub mod error;
pub mod ids;
pub mod domain;
pub mod state;
pub mod graph;
pub mod invariants;
pub mod transitions;
pub mod engine;
pub mod events;
pub mod units;
pub mod timeline;
pub mod hashing;

pub use error::{CoreError, Result};
