//! Read-through cache of panel list pages, plus the per-panel mutation lock.
//!
//! Pages are keyed by `(entity, owner, query)`. A successful mutation invalidates every
//! page of its `(entity, owner)` scope at a new epoch, so a fetch that was already in
//! flight cannot write its stale page back afterwards.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::{
    entities::EntityKind,
    error::AppError,
    models::{Page, PageQuery, Record},
};

const DEFAULT_FETCH_WINDOW: Duration = Duration::from_secs(60);

/// Scope
///
/// Everything a panel mutation can affect: one entity type for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub entity: EntityKind,
    pub owner_id: String,
}

impl Scope {
    pub fn new(entity: EntityKind, owner_id: impl Into<String>) -> Self {
        Self {
            entity,
            owner_id: owner_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub scope: Scope,
    pub query: PageQuery,
}

/// Proof that a fetch started at a given cache epoch.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    key: QueryKey,
    epoch: u64,
    started_at: Instant,
}

struct CachedPage {
    page: Page<Record>,
    stored_at: Instant,
}

/// When a scope was last invalidated.
struct Invalidation {
    epoch: u64,
    at: Instant,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<QueryKey, CachedPage>,
    invalidations: HashMap<Scope, Invalidation>,
    epoch: u64,
}

/// QueryCache
///
/// Expired pages are swept on every store. Invalidation records are kept for one fetch
/// window; a fetch older than that window is never stored, so dropping older records
/// cannot let a stale page back in.
pub struct QueryCache {
    ttl: Duration,
    fetch_window: Duration,
    inner: Mutex<CacheInner>,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_fetch_window(ttl, DEFAULT_FETCH_WINDOW)
    }

    /// `fetch_window` is the longest a list fetch may take and still be stored.
    pub fn with_fetch_window(ttl: Duration, fetch_window: Duration) -> Self {
        Self {
            ttl,
            fetch_window,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a fresh cached page, evicting it if it has expired.
    pub fn get(&self, key: &QueryKey) -> Option<Page<Record>> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            Some(cached) if cached.stored_at.elapsed() < self.ttl => {
                return Some(cached.page.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    /// Records the epoch a fetch starts from.
    pub fn begin(&self, key: QueryKey) -> FetchTicket {
        let inner = self.lock();
        FetchTicket {
            key,
            epoch: inner.epoch,
            started_at: Instant::now(),
        }
    }

    /// Stores a fetched page unless its scope was invalidated after the fetch began or
    /// the fetch outlived the fetch window. Returns whether the page was stored.
    pub fn complete(&self, ticket: FetchTicket, page: Page<Record>) -> bool {
        let mut inner = self.lock();
        self.sweep(&mut inner);

        let invalidated = inner
            .invalidations
            .get(&ticket.key.scope)
            .is_some_and(|record| record.epoch > ticket.epoch);
        if invalidated || ticket.started_at.elapsed() > self.fetch_window {
            tracing::debug!(
                entity = ticket.key.scope.entity.key(),
                owner = %ticket.key.scope.owner_id,
                "discarding stale page fetched before invalidation"
            );
            return false;
        }

        inner.entries.insert(
            ticket.key,
            CachedPage {
                page,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Drops every cached page of `scope` and marks it invalidated at a new epoch.
    pub fn invalidate(&self, scope: &Scope) {
        let mut inner = self.lock();
        inner.entries.retain(|key, _| &key.scope != scope);
        inner.epoch += 1;
        let epoch = inner.epoch;
        inner.invalidations.insert(
            scope.clone(),
            Invalidation {
                epoch,
                at: Instant::now(),
            },
        );
    }

    fn sweep(&self, inner: &mut CacheInner) {
        inner.entries.retain(|_, cached| cached.stored_at.elapsed() < self.ttl);
        inner
            .invalidations
            .retain(|_, record| record.at.elapsed() <= self.fetch_window);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// MutationTracker
///
/// At most one outstanding mutation per scope, the server-side equivalent of disabling the
/// submit button while a request is in flight.
#[derive(Default)]
pub struct MutationTracker {
    active: Mutex<HashSet<Scope>>,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `scope` for the lifetime of the returned guard, or fails with `Busy`.
    pub fn try_begin(&self, scope: &Scope) -> Result<MutationGuard<'_>, AppError> {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if !active.insert(scope.clone()) {
            return Err(AppError::Busy);
        }
        Ok(MutationGuard {
            tracker: self,
            scope: scope.clone(),
        })
    }

    pub fn is_active(&self, scope: &Scope) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(scope)
    }
}

pub struct MutationGuard<'a> {
    tracker: &'a MutationTracker,
    scope: Scope,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.tracker
            .active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.scope);
    }
}
