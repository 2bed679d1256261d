//! Resource acquisition service
//!
//! Processes Lock / Unlock commands against the lock table. Every decision
//! for a key is made while holding that key's table slot, so two commands
//! on the same key never both see "no owner". Auto-unlock timers capture the
//! id of the acquisition they were scheduled for and only remove an entry
//! that still carries that id; a re-lock by the same owner produces a new
//! id, so a late timer from the previous acquisition is a no-op.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use uuid::Uuid;

use super::command::{Command, CommandResponse, CommandResult};
use super::scheduler::{ExpiryHandle, Scheduler, TokioScheduler};
use super::table::{LockEntry, LockTable};
use super::types::{AcquiredResource, LockTimeout};
use crate::config::AcquisitionConfig;
use crate::error::{Error, Result};

/// In-process registry granting exclusive, auto-expiring ownership of
/// resources keyed by `K`.
pub struct ResourceAcquisitionService<K>
where
    K: Eq + Hash,
{
    config: AcquisitionConfig,
    table: Arc<LockTable<K>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<K> ResourceAcquisitionService<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Create a service whose timers run on the current tokio runtime
    pub fn new(config: AcquisitionConfig) -> Result<Self> {
        let scheduler = TokioScheduler::current()?;
        Ok(Self::with_scheduler(config, Arc::new(scheduler)))
    }

    /// Create a service with the default 30 second timeout
    pub fn with_defaults() -> Result<Self> {
        Self::new(AcquisitionConfig::default())
    }

    /// Create a service with an injected timer facility
    pub fn with_scheduler(config: AcquisitionConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        debug!(unlock_timeout = %config.unlock_timeout, "Resource acquisition service created");
        Self {
            config,
            table: Arc::new(LockTable::new()),
            scheduler,
        }
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn unlock_timeout(&self) -> LockTimeout {
        self.config.unlock_timeout
    }

    /// Apply `command` on behalf of `user` to the resource `key`.
    ///
    /// Contention and ownership failures are reported through the response's
    /// `result`; only an empty user name is an error.
    pub fn commit(&self, command: Command, user: &str, key: K) -> Result<CommandResponse<K>> {
        validate_owner(user)?;

        Ok(match command {
            Command::Lock => self.process_lock(user, key),
            Command::Unlock => self.process_unlock(user, key),
        })
    }

    /// Shorthand for `commit(Command::Lock, ..)`
    pub fn lock(&self, user: &str, key: K) -> Result<CommandResponse<K>> {
        self.commit(Command::Lock, user, key)
    }

    /// Shorthand for `commit(Command::Unlock, ..)`
    pub fn unlock(&self, user: &str, key: K) -> Result<CommandResponse<K>> {
        self.commit(Command::Unlock, user, key)
    }

    /// Current holder of `key`. Looking does not refresh the lock.
    pub fn holder(&self, key: &K) -> Option<AcquiredResource> {
        self.table.get(key)
    }

    /// Number of locked resources
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Cancel every pending auto-unlock and free all resources.
    ///
    /// Returns how many locks were released.
    pub fn release_all(&self) -> usize {
        let drained = self.table.drain();
        for (_, entry) in &drained {
            entry.cancel_expiry();
        }

        debug!(count = drained.len(), "Released all locks");
        drained.len()
    }

    fn process_lock(&self, user: &str, key: K) -> CommandResponse<K> {
        // Scheduler calls stay outside the slot: an already-due expiry may
        // run inline and needs the same shard.
        let (acquired, replaced) = match self.table.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get().current();
                if !existing.is_owned_by(user) {
                    debug!(
                        resource = ?key,
                        holder = %existing.owner(),
                        requested_by = %user,
                        "Lock rejected, resource held by another owner"
                    );
                    return CommandResponse::new(CommandResult::LockFailed, key, existing.clone());
                }

                let acquired = AcquiredResource::locked(user, self.config.unlock_timeout);
                let previous = slot.insert(LockEntry::new(acquired.clone(), None));
                (acquired, Some(previous))
            }
            Entry::Vacant(slot) => {
                let acquired = AcquiredResource::locked(user, self.config.unlock_timeout);
                slot.insert(LockEntry::new(acquired.clone(), None));
                (acquired, None)
            }
        };

        match replaced {
            Some(previous) => {
                // A late firing of this timer is filtered by the acquisition id
                previous.cancel_expiry();
                debug!(resource = ?key, owner = %user, "Lock refreshed");
            }
            None => debug!(resource = ?key, owner = %user, "Lock acquired"),
        }

        if let Some(handle) = self.schedule_expiry(&key, &acquired) {
            // Superseded, released or already expired in the meantime
            if let Err(handle) = self.table.attach_expiry(&key, acquired.id(), handle) {
                handle.cancel();
            }
        }

        CommandResponse::new(CommandResult::LockSucceeded, key, acquired)
    }

    fn process_unlock(&self, user: &str, key: K) -> CommandResponse<K> {
        let unlocked = AcquiredResource::unlocked(user, self.config.unlock_timeout);

        match self.table.entry(key.clone()) {
            Entry::Vacant(_) => {
                debug!(resource = ?key, requested_by = %user, "Unlock rejected, resource is not locked");
                CommandResponse::new(CommandResult::UnlockFailed, key, unlocked)
            }
            Entry::Occupied(slot) => {
                let existing = slot.get().current();
                if !existing.is_owned_by(user) {
                    debug!(
                        resource = ?key,
                        holder = %existing.owner(),
                        requested_by = %user,
                        "Unlock rejected, resource held by another owner"
                    );
                    return CommandResponse::new(CommandResult::UnlockFailed, key, existing.clone());
                }

                let (_, entry) = slot.remove_entry();
                entry.cancel_expiry();

                debug!(resource = ?key, owner = %user, "Lock released");
                CommandResponse::new(CommandResult::UnlockSucceeded, key, unlocked)
            }
        }
    }

    fn schedule_expiry(
        &self,
        key: &K,
        acquired: &AcquiredResource,
    ) -> Option<Box<dyn ExpiryHandle>> {
        let delay = acquired.timeout().as_duration()?;
        let table = Arc::downgrade(&self.table);
        let key = key.clone();
        let id = acquired.id();

        Some(
            self.scheduler
                .schedule_after(delay, Box::new(move || expire(&table, &key, id))),
        )
    }
}

impl<K> ResourceAcquisitionService<K>
where
    K: Eq + Hash + Ord + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// All locked resources, sorted by key
    pub fn locked_resources(&self) -> Vec<(K, AcquiredResource)> {
        let mut resources = self.table.snapshot();
        resources.sort_by(|a, b| a.0.cmp(&b.0));
        resources
    }
}

/// Auto-unlock for acquisition `id`; does nothing if it was superseded
fn expire<K>(table: &Weak<LockTable<K>>, key: &K, id: Uuid)
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    let Some(table) = table.upgrade() else {
        return;
    };

    match table.remove_acquisition(key, id) {
        Some(entry) => info!(
            resource = ?key,
            owner = %entry.current().owner(),
            "Lock expired, resource released"
        ),
        None => debug!(resource = ?key, "Stale expiry ignored"),
    }
}

fn validate_owner(user: &str) -> Result<()> {
    if user.trim().is_empty() {
        return Err(Error::InvalidOwner(user.to_string()));
    }
    Ok(())
}

impl<K> Clone for ResourceAcquisitionService<K>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            table: Arc::clone(&self.table),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<K> fmt::Debug for ResourceAcquisitionService<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceAcquisitionService")
            .field("config", &self.config)
            .field("locked", &self.table.len())
            .finish_non_exhaustive()
    }
}
