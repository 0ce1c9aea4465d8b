//! Client-scoped idempotency cache
//!
//! Keys are (client id, idempotency key). A hit replays the cached response
//! byte-for-byte with no side effects. Expired entries are purged lazily on
//! access; capacity is enforced by evicting the oldest entries, globally and
//! per client, with insertion order breaking created_at ties.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Cache limits
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// How long a cached response stays replayable
    pub ttl: Duration,
    /// Entry cap across all clients
    pub max_total: usize,
    /// Entry cap per client
    pub max_per_client: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_total: 10_000,
            max_per_client: 100,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    /// Monotonic insertion counter; deterministic eviction tie-break
    id: u64,
    status: u16,
    payload: String,
    created_at: i64,
    expires_at: i64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<(String, String), Entry>,
    next_id: u64,
}

/// Linearizable key → cached-response store
#[derive(Debug)]
pub struct IdempotencyCache {
    config: IdempotencyConfig,
    state: Mutex<CacheState>,
}

impl IdempotencyCache {
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cached (status, payload) when present and unexpired
    pub fn try_get(&self, client_id: &str, key: &str, now: i64) -> Option<(u16, String)> {
        let mut state = self.state.lock();
        let cache_key = (client_id.to_string(), key.to_string());
        match state.entries.get(&cache_key) {
            Some(entry) if entry.expires_at > now => Some((entry.status, entry.payload.clone())),
            Some(_) => {
                state.entries.remove(&cache_key);
                None
            }
            None => None,
        }
    }

    /// Cache a response and enforce the capacity caps
    pub fn store(&self, client_id: &str, key: &str, status: u16, payload: String, now: i64) {
        let ttl = self.config.ttl.as_nanos() as i64;
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.entries.insert(
            (client_id.to_string(), key.to_string()),
            Entry {
                id,
                status,
                payload,
                created_at: now,
                expires_at: now + ttl,
            },
        );

        while state.entries.len() > self.config.max_total {
            evict_oldest(&mut state, None);
        }
        while client_entry_count(&state, client_id) > self.config.max_per_client {
            evict_oldest(&mut state, Some(client_id));
        }
    }

    /// Total live entries (expired ones included until touched)
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn client_entry_count(state: &CacheState, client_id: &str) -> usize {
    state
        .entries
        .keys()
        .filter(|(client, _)| client == client_id)
        .count()
}

fn evict_oldest(state: &mut CacheState, client_filter: Option<&str>) {
    let victim = state
        .entries
        .iter()
        .filter(|((client, _), _)| client_filter.map_or(true, |c| client == c))
        .min_by_key(|(_, entry)| (entry.created_at, entry.id))
        .map(|(key, _)| key.clone());
    if let Some(key) = victim {
        state.entries.remove(&key);
    }
}
