//! RAS Core Library
//!
//! This crate provides the in-process resource acquisition registry:
//! - Lock table with at most one owner per resource key
//! - Lock / Unlock command processing with per-key atomicity
//! - Timer-driven auto-unlock with stale-expiry protection
//! - Configuration persisted as TOML

pub mod acquisition;
pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::acquisition::{
        AcquiredResource, AcquisitionState, Command, CommandResponse, CommandResult, LockTimeout,
        ResourceAcquisitionService,
    };
    pub use crate::config::{AcquisitionConfig, Config};
    pub use crate::error::{Error, Result};
}
