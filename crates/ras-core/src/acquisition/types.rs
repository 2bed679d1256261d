//! Acquisition value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Error;

/// Default auto-unlock timeout (30 seconds).
pub const DEFAULT_UNLOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// State of an acquired resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionState {
    /// Resource is held by its owner
    Locked,
    /// Resource is free
    Unlocked,
}

impl AcquisitionState {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How long a lock survives without being re-locked or unlocked.
///
/// Textual form: `"<n>h"`, `"<n>m"`, `"<n>s"`, `"<n>ms"`, `"<n>us"`,
/// `"<n>ns"` or `"never"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LockTimeout {
    /// Auto-unlock after the given duration
    After(Duration),
    /// Never auto-unlock; only an explicit unlock releases the resource
    Never,
}

impl LockTimeout {
    /// The expiry delay, or `None` when the lock never expires
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::After(d) => Some(*d),
            Self::Never => None,
        }
    }

    /// Whether locks taken with this timeout expire at all
    pub fn expires(&self) -> bool {
        matches!(self, Self::After(_))
    }
}

impl Default for LockTimeout {
    fn default() -> Self {
        Self::After(DEFAULT_UNLOCK_TIMEOUT)
    }
}

impl From<Duration> for LockTimeout {
    fn from(d: Duration) -> Self {
        Self::After(d)
    }
}

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MIN: u64 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MIN;

/// Largest first, so `Display` picks the coarsest exact unit
const UNITS: &[(&str, u64)] = &[
    ("h", NANOS_PER_HOUR),
    ("m", NANOS_PER_MIN),
    ("s", NANOS_PER_SEC),
    ("ms", NANOS_PER_MILLI),
    ("us", NANOS_PER_MICRO),
    ("ns", 1),
];

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = match self {
            Self::Never => return write!(f, "never"),
            Self::After(d) => d,
        };

        let nanos = d.as_nanos();
        if nanos == 0 {
            return write!(f, "0ms");
        }

        for &(suffix, unit) in UNITS {
            let unit = u128::from(unit);
            if nanos % unit == 0 {
                return write!(f, "{}{}", nanos / unit, suffix);
            }
        }
        write!(f, "{}ns", nanos)
    }
}

impl FromStr for LockTimeout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("never") {
            return Ok(Self::Never);
        }

        // Two-letter suffixes first: "ms" also ends in "s"
        let mut units: Vec<&(&str, u64)> = UNITS.iter().collect();
        units.sort_by_key(|(suffix, _)| std::cmp::Reverse(suffix.len()));

        let Some((digits, unit)) = units
            .into_iter()
            .find_map(|&(suffix, unit)| s.strip_suffix(suffix).map(|n| (n, unit)))
        else {
            return Err(Error::Config(format!(
                "Invalid timeout '{}'. Expected e.g. 1500ms, 30s, 2m, 1h or never",
                s
            )));
        };

        let value: u64 = digits.trim().parse().map_err(|_| {
            Error::Config(format!("Invalid timeout '{}': '{}' is not a number", s, digits))
        })?;
        let nanos = value
            .checked_mul(unit)
            .ok_or_else(|| Error::Config(format!("Timeout '{}' is too large", s)))?;

        Ok(Self::After(Duration::from_nanos(nanos)))
    }
}

impl TryFrom<String> for LockTimeout {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LockTimeout> for String {
    fn from(value: LockTimeout) -> Self {
        value.to_string()
    }
}

/// A snapshot of who holds (or tried to free) a resource.
///
/// Equality, hashing and ordering only look at the owner (case-insensitive)
/// and the state. Two separate acquisitions by the same owner compare equal;
/// use [`AcquiredResource::is_same_acquisition`] to tell them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredResource {
    /// Unique per-acquisition token
    id: Uuid,

    /// User that holds or requested the resource
    owner: String,

    /// Locked or unlocked
    state: AcquisitionState,

    /// When this snapshot was taken (UTC)
    acquired_at: DateTime<Utc>,

    /// Auto-unlock timeout in effect
    timeout: LockTimeout,
}

impl AcquiredResource {
    /// Create a new acquisition stamped with the current UTC time
    pub fn new(owner: impl Into<String>, state: AcquisitionState, timeout: LockTimeout) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            state,
            acquired_at: Utc::now(),
            timeout,
        }
    }

    /// A fresh lock held by `owner`
    pub fn locked(owner: impl Into<String>, timeout: LockTimeout) -> Self {
        Self::new(owner, AcquisitionState::Locked, timeout)
    }

    /// A synthesized unlocked snapshot for `owner`
    pub fn unlocked(owner: impl Into<String>, timeout: LockTimeout) -> Self {
        Self::new(owner, AcquisitionState::Unlocked, timeout)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn timeout(&self) -> LockTimeout {
        self.timeout
    }

    pub fn is_locked(&self) -> bool {
        self.state == AcquisitionState::Locked
    }

    /// Whether `user` names the owner (case-insensitive)
    pub fn is_owned_by(&self, user: &str) -> bool {
        fold_owner(&self.owner) == fold_owner(user)
    }

    /// Whether both snapshots come from the very same acquisition
    pub fn is_same_acquisition(&self, other: &AcquiredResource) -> bool {
        self.id == other.id
    }

    /// When the auto-unlock fires, or `None` if it never does (or lies
    /// beyond what `DateTime` can represent)
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.timeout.as_duration()?).ok()?;
        self.acquired_at.checked_add_signed(ttl)
    }
}

fn fold_owner(owner: &str) -> String {
    owner.to_lowercase()
}

impl PartialEq for AcquiredResource {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state && self.is_owned_by(&other.owner)
    }
}

impl Eq for AcquiredResource {}

impl Hash for AcquiredResource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fold_owner(&self.owner).hash(state);
        self.state.hash(state);
    }
}

impl PartialOrd for AcquiredResource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AcquiredResource {
    fn cmp(&self, other: &Self) -> Ordering {
        fold_owner(&self.owner)
            .cmp(&fold_owner(&other.owner))
            .then(self.state.cmp(&other.state))
    }
}

impl fmt::Display for AcquiredResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner={} state={}", self.owner, self.state)
    }
}
