#![forbid(unsafe_code)]

//! HR core runtime.
//!
//! Wraps `hr_kernel` with tenant-scoped stores, a length-prefixed protobuf
//! journal, replay, JSON snapshots and the `HrCore` facade.
//!
//! Shape and chain rules live in the kernel; stores here only serialize
//! writers, journal accepted changes and install them.

pub mod config;
pub mod directory;
pub mod error;
pub mod event_store;
pub mod hierarchy_store;
pub mod journal;
pub mod logging;
pub mod org_tree;
pub mod proto_bridge;
pub mod proto_types;
pub mod query;
pub mod replay;
pub mod sequencer;
pub mod service;
pub mod snapshot_codec;

pub use config::CoreConfig;
pub use directory::{EmployeeDirectory, OpenDirectory, StaticDirectory};
pub use error::{JournalError, Result, RuntimeError};
pub use event_store::RecordEventRequest;
pub use query::ProfileSnapshot;
pub use service::{CancelOutcome, ConfigureOutcome, HrCore};
pub use snapshot_codec::{CoreSnapshot, SnapshotError};
