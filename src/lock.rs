//! Per-entry construction locks
//!
//! A singleton or request-scoped cache miss is built while holding the lock of
//! that one entry. A first-access race on the same entry builds once, and
//! unrelated entries build in parallel. Locks are re-entrant and only live
//! while some thread holds or waits for them.
//!
//! A thread about to wait on an entry whose holder is itself waiting, directly
//! or through other threads, on an entry this thread holds does not block. It
//! builds without the lock and its resolution path reports the cycle.

use crate::{RequestId, Token};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

#[cfg(feature = "logging")]
use tracing::debug;

/// One lockable cache entry: a singleton, or a token within one request
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct LockKey {
    token: Token,
    request: Option<RequestId>,
}

impl LockKey {
    #[inline]
    pub fn singleton(token: &Token) -> Self {
        Self {
            token: token.clone(),
            request: None,
        }
    }

    #[inline]
    pub fn request(token: &Token, request_id: &RequestId) -> Self {
        Self {
            token: token.clone(),
            request: Some(request_id.clone()),
        }
    }
}

impl fmt::Debug for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            Some(request) => write!(f, "{}@{}", self.token, request),
            None => write!(f, "{}", self.token),
        }
    }
}

type Slot = Arc<ReentrantMutex<()>>;

/// Who holds which entry, and which entry each blocked thread waits for
#[derive(Default)]
struct Holders {
    owners: HashMap<LockKey, (ThreadId, usize), RandomState>,
    waiting: HashMap<ThreadId, LockKey, RandomState>,
}

impl Holders {
    /// Whether blocking `me` on `key` would close a wait loop back to `me`
    fn would_deadlock(&self, key: &LockKey, me: ThreadId) -> bool {
        let mut next = key;
        // A loop that does not pass through `me` is not ours to break
        for _ in 0..=self.waiting.len() {
            let Some(&(owner, _)) = self.owners.get(next) else {
                return false;
            };
            if owner == me {
                return true;
            }
            match self.waiting.get(&owner) {
                Some(key) => next = key,
                None => return false,
            }
        }
        false
    }

    fn enter(&mut self, key: &LockKey, me: ThreadId) {
        self.owners
            .entry(key.clone())
            .and_modify(|(_, depth)| *depth += 1)
            .or_insert((me, 1));
    }

    fn leave(&mut self, key: &LockKey) {
        if let Some((_, depth)) = self.owners.get_mut(key) {
            *depth -= 1;
            if *depth == 0 {
                self.owners.remove(key);
            }
        }
    }
}

/// Re-entrant locks keyed by cache entry
pub(crate) struct ConstructionLocks {
    slots: DashMap<LockKey, Slot, RandomState>,
    holders: Mutex<Holders>,
}

impl ConstructionLocks {
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_hasher(RandomState::new()),
            holders: Mutex::new(Holders::default()),
        }
    }

    /// The lock for `key`, created on demand
    pub fn slot(&self, key: &LockKey) -> Slot {
        let entry = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())));
        Arc::clone(entry.value())
    }

    /// Lock `slot` on behalf of `key`.
    ///
    /// Returns `None` without blocking when waiting would deadlock.
    pub fn acquire<'s>(&'s self, key: &LockKey, slot: &'s ReentrantMutex<()>) -> Option<Held<'s>> {
        let me = thread::current().id();

        let guard = match slot.try_lock() {
            Some(guard) => {
                self.holders.lock().enter(key, me);
                guard
            }
            None => {
                {
                    let mut holders = self.holders.lock();
                    if holders.would_deadlock(key, me) {
                        #[cfg(feature = "logging")]
                        debug!(
                            target: crate::logging::TARGET,
                            entry = ?key,
                            "Entry held by a thread waiting on this one, building unlocked"
                        );
                        return None;
                    }
                    holders.waiting.insert(me, key.clone());
                }

                let guard = slot.lock();
                let mut holders = self.holders.lock();
                holders.waiting.remove(&me);
                holders.enter(key, me);
                guard
            }
        };

        Some(Held {
            locks: self,
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Number of entries currently locked or waited on
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

impl Default for ConstructionLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConstructionLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructionLocks")
            .field("entries", &self.len())
            .finish()
    }
}

/// A held construction lock, released on drop
pub(crate) struct Held<'s> {
    locks: &'s ConstructionLocks,
    key: LockKey,
    _guard: ReentrantMutexGuard<'s, ()>,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.locks.holders.lock().leave(&self.key);
        // The table and the holder's own handle; anyone else is waiting
        self.locks
            .slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) <= 2);
    }
}
