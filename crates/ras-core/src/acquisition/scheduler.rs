//! Timer facilities for auto-unlock
//!
//! The registry only needs "run this action after a delay, give me a handle
//! I can cancel". Cancellation is best-effort: an action may already be
//! running (or about to run) when `cancel` is called, so callers must make
//! the action itself harmless when it arrives late.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::error::{Error, Result};

/// Deferred work handed to a scheduler
pub type ExpiryAction = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled action
pub trait ExpiryHandle: Send + Sync + fmt::Debug {
    /// Ask the scheduler not to run the action. Never blocks.
    fn cancel(&self);
}

/// Something that can run an action after a delay.
///
/// Implementations may run an already-due action inline from
/// `schedule_after`; callers must not hold locks the action needs.
pub trait Scheduler: Send + Sync {
    fn schedule_after(&self, delay: Duration, action: ExpiryAction) -> Box<dyn ExpiryHandle>;
}

/// Scheduler backed by tokio timers.
///
/// Each action is a spawned task sleeping for the delay; cancelling aborts
/// the task.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Bind to the runtime of the calling context
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::with_handle)
            .map_err(|_| Error::NoRuntime)
    }

    /// Bind to an explicit runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, action: ExpiryAction) -> Box<dyn ExpiryHandle> {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });

        Box::new(TokioExpiryHandle {
            abort: task.abort_handle(),
        })
    }
}

#[derive(Debug)]
struct TokioExpiryHandle {
    abort: AbortHandle,
}

impl ExpiryHandle for TokioExpiryHandle {
    fn cancel(&self) {
        self.abort.abort();
    }
}

/// Deterministic scheduler driven by a virtual clock.
///
/// Nothing fires until [`ManualScheduler::advance`] moves the clock past an
/// action's due time.
#[derive(Default, Clone)]
pub struct ManualScheduler {
    clock: Arc<Mutex<ManualClock>>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    timers: Vec<ManualTimer>,
}

struct ManualTimer {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    action: ExpiryAction,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner).now
    }

    /// Number of scheduled actions that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        self.clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .timers
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move the clock forward, running every due action in due order.
    ///
    /// Actions run without the clock locked, so they may schedule more work.
    pub fn advance(&self, by: Duration) {
        let target = self.now().saturating_add(by);

        while let Some(timer) = self.pop_due(target) {
            if !timer.cancelled.load(Ordering::SeqCst) {
                (timer.action)();
            }
        }

        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        if clock.now < target {
            clock.now = target;
        }
    }

    fn pop_due(&self, target: Duration) -> Option<ManualTimer> {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        let index = clock
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;

        let timer = clock.timers.swap_remove(index);
        if clock.now < timer.due {
            clock.now = timer.due;
        }
        Some(timer)
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, action: ExpiryAction) -> Box<dyn ExpiryHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);

        clock.timers.retain(|t| !t.cancelled.load(Ordering::SeqCst));

        let seq = clock.next_seq;
        clock.next_seq += 1;
        let due = clock.now.saturating_add(delay);
        clock.timers.push(ManualTimer {
            due,
            seq,
            cancelled: Arc::clone(&cancelled),
            action,
        });

        Box::new(ManualExpiryHandle { cancelled })
    }
}

#[derive(Debug)]
struct ManualExpiryHandle {
    cancelled: Arc<AtomicBool>,
}

impl ExpiryHandle for ManualExpiryHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
