//! Resource acquisition with timed auto-unlock
//!
//! Callers lock a named resource under a user name and own it exclusively
//! until they unlock it or the configured timeout elapses.
//!
//! # Architecture
//!
//! - **Lock Table**: `LockTable`, one `LockEntry` per locked key
//! - **Service**: `ResourceAcquisitionService`, Lock / Unlock processing
//! - **Schedulers**: `TokioScheduler` for production, `ManualScheduler` for
//!   deterministic virtual time
//!
//! # Example
//!
//! ```ignore
//! use ras_core::acquisition::{CommandResult, ResourceAcquisitionService};
//!
//! let service = ResourceAcquisitionService::<String>::with_defaults()?;
//!
//! let response = service.lock("U1", "R1".to_string())?;
//! assert_eq!(response.result, CommandResult::LockSucceeded);
//!
//! // Another user is turned away and told who holds it
//! let response = service.lock("U2", "R1".to_string())?;
//! assert_eq!(response.resource.owner(), "U1");
//! ```

pub mod command;
pub mod scheduler;
pub mod service;
pub mod table;
pub mod types;

// Re-export main types
pub use command::{Command, CommandResponse, CommandResult};
pub use scheduler::{ExpiryAction, ExpiryHandle, ManualScheduler, Scheduler, TokioScheduler};
pub use service::ResourceAcquisitionService;
pub use table::{LockEntry, LockTable};
pub use types::{AcquiredResource, AcquisitionState, DEFAULT_UNLOCK_TIMEOUT, LockTimeout};
