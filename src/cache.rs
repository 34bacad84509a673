//! Recommendation Cache - per (user, request parameters) ranked results
//!
//! Each key moves through `Absent -> Computing -> Fresh -> Stale -> Computing`.
//! A `Computing` entry owns a [`Flight`]: the single in-progress computation
//! every concurrent request for that key blocks on and shares. The map lock
//! is only held for state transitions, never while ranking.
//!
//! Memory stays bounded two ways. A user who asks for a new key while already
//! holding `max_entries_per_user` entries first loses their stale and expired
//! entries, then their oldest fresh one. A periodic sweep drops stale and
//! expired entries of users who never come back.
//!
//! Invalidation that lands while a flight is running marks it dirty. A dirty
//! flight's result is handed to the requests that were already waiting but is
//! never stored as fresh, and requests that arrive after the invalidation
//! queue behind the flight and then start the next one.

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{RecError, Result};
use crate::model::{RankedResult, RequestParams};

/// One in-progress computation shared by every request for its key
struct Flight {
    outcome: Mutex<Option<Result<Arc<RankedResult>>>>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn publish(&self, outcome: Result<Arc<RankedResult>>) {
        *self.outcome.lock() = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<Arc<RankedResult>> {
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.done.wait(&mut slot);
        }
    }
}

enum Entry {
    Fresh {
        result: Arc<RankedResult>,
        /// `None` when the TTL reaches past what `Instant` can represent
        expires_at: Option<Instant>,
    },
    Stale,
    Computing {
        flight: Arc<Flight>,
        dirty: bool,
    },
}

fn unexpired(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |at| at > now)
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        match self {
            Entry::Fresh { expires_at, .. } => unexpired(*expires_at, now),
            Entry::Stale => false,
            Entry::Computing { .. } => true,
        }
    }
}

/// Observable state of one cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Absent,
    Fresh,
    Stale,
    Computing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub users: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub coalesced: u64,
    pub invalidations: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    coalesced: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
}

type UserEntries = HashMap<RequestParams, Entry>;

pub const DEFAULT_MAX_ENTRIES_PER_USER: usize = 16;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct RecommendationCache {
    ttl: Duration,
    max_entries_per_user: usize,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
    entries: Mutex<HashMap<String, UserEntries>>,
    counters: Counters,
}

/// Publishes a failure to waiters if the owning computation unwinds
struct FlightGuard<'a> {
    cache: &'a RecommendationCache,
    user_id: &'a str,
    params: RequestParams,
    flight: Arc<Flight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(mut self, outcome: Result<Arc<RankedResult>>) -> Result<Arc<RankedResult>> {
        self.cache
            .settle(self.user_id, self.params, &self.flight, outcome.as_ref().ok());
        self.flight.publish(outcome.clone());
        // Set last so an unwind in settle still reaches Drop
        self.finished = true;
        outcome
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(user_id = self.user_id, "recommendation computation panicked");
        self.cache.settle(self.user_id, self.params, &self.flight, None);
        self.flight.publish(Err(RecError::Internal(
            "recommendation computation panicked".to_string(),
        )));
    }
}

impl RecommendationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries_per_user: DEFAULT_MAX_ENTRIES_PER_USER,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            last_sweep: Mutex::new(Instant::now()),
            entries: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Cap on the keys one user may hold; in-flight entries are never evicted
    pub fn with_max_entries_per_user(mut self, max: usize) -> Self {
        self.max_entries_per_user = max.max(1);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expiry(&self) -> Option<Instant> {
        Instant::now().checked_add(self.ttl)
    }

    /// Serve the fresh result for this key, or compute it exactly once
    ///
    /// Concurrent callers for the same key share one call to `compute`;
    /// callers for different keys never wait on each other.
    pub fn get_or_compute<F>(
        &self,
        user_id: &str,
        params: RequestParams,
        compute: F,
    ) -> Result<Arc<RankedResult>>
    where
        F: FnOnce() -> Result<RankedResult>,
    {
        let flight = loop {
            let mut entries = self.entries.lock();
            let slot = entries.entry(user_id.to_string()).or_default();

            match slot.get(&params) {
                Some(Entry::Fresh { result, expires_at })
                    if unexpired(*expires_at, Instant::now()) =>
                {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(user_id, limit = params.limit, "cache hit");
                    return Ok(Arc::clone(result));
                }
                Some(Entry::Computing { flight, dirty }) => {
                    let flight = Arc::clone(flight);
                    let joined_dirty = *dirty;
                    drop(entries);

                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(user_id, limit = params.limit, "waiting on in-flight computation");
                    let outcome = flight.wait();

                    // Joined after an invalidation: that result is already outdated
                    if joined_dirty {
                        continue;
                    }
                    return outcome;
                }
                _ => {
                    // Absent, stale, or past its TTL
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    if !slot.contains_key(&params) && slot.len() >= self.max_entries_per_user {
                        let evicted = make_room(slot, self.max_entries_per_user);
                        self.counters
                            .evictions
                            .fetch_add(evicted as u64, Ordering::Relaxed);
                        debug!(user_id, evicted, "evicted entries to make room");
                    }
                    let flight = Arc::new(Flight::new());
                    slot.insert(
                        params,
                        Entry::Computing {
                            flight: Arc::clone(&flight),
                            dirty: false,
                        },
                    );
                    break flight;
                }
            }
        };

        let guard = FlightGuard {
            cache: self,
            user_id,
            params,
            flight,
            finished: false,
        };
        self.counters.computations.fetch_add(1, Ordering::Relaxed);
        let outcome = compute().map(Arc::new);
        guard.finish(outcome)
    }

    /// Record the end of a flight, if it still owns the entry
    fn settle(
        &self,
        user_id: &str,
        params: RequestParams,
        flight: &Arc<Flight>,
        result: Option<&Arc<RankedResult>>,
    ) {
        let mut entries = self.entries.lock();
        let Some(slot) = entries.get_mut(user_id) else {
            return;
        };
        let dirty = match slot.get(&params) {
            Some(Entry::Computing { flight: current, dirty }) if Arc::ptr_eq(current, flight) => {
                *dirty
            }
            _ => return,
        };

        match result {
            Some(result) if !dirty => {
                slot.insert(
                    params,
                    Entry::Fresh {
                        result: Arc::clone(result),
                        expires_at: self.expiry(),
                    },
                );
            }
            Some(_) => {
                slot.insert(params, Entry::Stale);
            }
            None => {
                slot.remove(&params);
                if slot.is_empty() {
                    entries.remove(user_id);
                }
            }
        }
    }

    /// Mark every entry of one user stale (a new reaction by that user)
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let mut entries = self.entries.lock();
        let marked = entries
            .get_mut(user_id)
            .map(|slot| mark_stale(slot.values_mut()))
            .unwrap_or(0);
        drop(entries);

        self.counters
            .invalidations
            .fetch_add(marked as u64, Ordering::Relaxed);
        info!(user_id, marked, "invalidated user recommendations");
        marked
    }

    /// Mark every entry stale (a new item changed the eligible corpus)
    pub fn invalidate_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let marked = entries
            .values_mut()
            .map(|slot| mark_stale(slot.values_mut()))
            .sum::<usize>();
        drop(entries);

        self.counters
            .invalidations
            .fetch_add(marked as u64, Ordering::Relaxed);
        info!(marked, "invalidated all recommendations");
        marked
    }

    /// Drop stale and expired entries; in-flight ones stay
    pub fn evict_stale(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let mut evicted = 0;
        entries.retain(|_, slot| {
            let before = slot.len();
            slot.retain(|_, entry| entry.is_live(now));
            evicted += before - slot.len();
            !slot.is_empty()
        });
        drop(entries);

        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        debug!(evicted, "evicted stale cache entries");
        evicted
    }

    /// Run `evict_stale` if the sweep interval has passed since the last one
    pub fn sweep_if_due(&self) -> usize {
        {
            let mut last = self.last_sweep.lock();
            if last.elapsed() < self.sweep_interval {
                return 0;
            }
            *last = Instant::now();
        }
        self.evict_stale()
    }

    pub fn state(&self, user_id: &str, params: RequestParams) -> EntryState {
        let entries = self.entries.lock();
        match entries.get(user_id).and_then(|slot| slot.get(&params)) {
            None => EntryState::Absent,
            Some(Entry::Fresh { expires_at, .. }) if unexpired(*expires_at, Instant::now()) => {
                EntryState::Fresh
            }
            Some(Entry::Fresh { .. }) | Some(Entry::Stale) => EntryState::Stale,
            Some(Entry::Computing { .. }) => EntryState::Computing,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            users: entries.len(),
            entries: entries.values().map(|slot| slot.len()).sum(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Shrink one user's entries below `max`: stale and expired first, then the
/// fresh entry closest to expiry
fn make_room(slot: &mut UserEntries, max: usize) -> usize {
    let now = Instant::now();
    let before = slot.len();
    slot.retain(|_, entry| entry.is_live(now));

    while slot.len() >= max {
        let oldest = slot
            .iter()
            .filter_map(|(params, entry)| match entry {
                Entry::Fresh { expires_at, .. } => Some((*params, *expires_at)),
                _ => None,
            })
            .min_by(|a, b| match (a.1, b.1) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .map(|(params, _)| params);
        match oldest {
            Some(params) => {
                slot.remove(&params);
            }
            None => break,
        }
    }
    before - slot.len()
}

fn mark_stale<'a>(entries: impl Iterator<Item = &'a mut Entry>) -> usize {
    let mut marked = 0;
    for entry in entries {
        match entry {
            Entry::Fresh { .. } => {
                *entry = Entry::Stale;
                marked += 1;
            }
            Entry::Computing { dirty, .. } => {
                *dirty = true;
                marked += 1;
            }
            Entry::Stale => {}
        }
    }
    marked
}
