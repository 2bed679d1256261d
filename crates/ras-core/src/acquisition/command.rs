//! Commands and their outcomes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::AcquiredResource;
use crate::error::Error;

/// Command submitted to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Take (or refresh) exclusive ownership of a resource
    Lock,
    /// Give up ownership of a resource
    Unlock,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lock" => Ok(Self::Lock),
            "unlock" => Ok(Self::Unlock),
            _ => Err(Error::UnsupportedCommand(s.trim().to_string())),
        }
    }
}

/// Outcome of a committed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandResult {
    LockSucceeded,
    LockFailed,
    UnlockSucceeded,
    UnlockFailed,
}

impl CommandResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LockSucceeded => "lock_succeeded",
            Self::LockFailed => "lock_failed",
            Self::UnlockSucceeded => "unlock_succeeded",
            Self::UnlockFailed => "unlock_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::LockSucceeded | Self::UnlockSucceeded)
    }

    /// The command this result answers
    pub fn command(&self) -> Command {
        match self {
            Self::LockSucceeded | Self::LockFailed => Command::Lock,
            Self::UnlockSucceeded | Self::UnlockFailed => Command::Unlock,
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response to `commit`.
///
/// Always carries a resource snapshot: the new lock on success, the blocking
/// holder on a contention/ownership failure, or a synthesized unlocked
/// snapshot for the caller otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse<K> {
    pub result: CommandResult,
    pub key: K,
    pub resource: AcquiredResource,
}

impl<K> CommandResponse<K> {
    pub fn new(result: CommandResult, key: K, resource: AcquiredResource) -> Self {
        Self {
            result,
            key,
            resource,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

impl<K: fmt::Display> fmt::Display for CommandResponse<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.result, self.key, self.resource)
    }
}
