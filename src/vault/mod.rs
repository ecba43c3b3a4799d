//! TokenVault: persistent, session-scoped, TTL-bounded, LRU-capped
//! bidirectional store from placeholder to original value.
//!
//! Uses a `parking_lot::Mutex` around a single in-memory map for cheap,
//! non-poisoning, uncontended locking, with a debounced atomic flush to
//! disk layered on top: write to a sibling `.tmp` file, then rename over
//! the target, with `0600`/`0700` permission discipline for the credential
//! material it stores.

mod persist;

use crate::error::Result;
use crate::pii::{Category, Placeholder};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use zeroize::Zeroize;

pub use persist::default_vault_path;

/// One persisted mapping between a placeholder and the original value it
/// stands in for. `(session_id, token)` is unique; `(session_id,
/// original_value)` is unique (idempotency).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VaultEntry {
    pub token: TokenRef,
    pub original_value: String,
    pub category: Category,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Drop for VaultEntry {
    fn drop(&mut self) {
        self.original_value.zeroize();
    }
}

/// Serializable form of `Placeholder` (category + counter), since
/// `Placeholder` itself carries no serde impl — it's a display/parse type,
/// not a wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TokenRef {
    pub category: Category,
    pub n: u32,
}

impl From<Placeholder> for TokenRef {
    fn from(p: Placeholder) -> Self {
        Self { category: p.category, n: p.n }
    }
}

impl From<TokenRef> for Placeholder {
    fn from(t: TokenRef) -> Self {
        Placeholder::new(t.category, t.n)
    }
}

/// Ordered, bidirectional projection of one session's current mappings,
/// the concrete type backing the "proxied map" the source exposes through
/// an object proxy. Plain `set`/`get`/`has`/`delete` plus insertion-order
/// iteration; every mutation here is also reflected into the vault that
/// produced it.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    order: Vec<Placeholder>,
    forward: HashMap<Placeholder, String>,
}

impl MappingTable {
    pub fn set(&mut self, placeholder: Placeholder, original: String) {
        if !self.forward.contains_key(&placeholder) {
            self.order.push(placeholder);
        }
        self.forward.insert(placeholder, original);
    }

    pub fn get(&self, placeholder: &Placeholder) -> Option<&String> {
        self.forward.get(placeholder)
    }

    pub fn has(&self, placeholder: &Placeholder) -> bool {
        self.forward.contains_key(placeholder)
    }

    pub fn delete(&mut self, placeholder: &Placeholder) -> Option<String> {
        self.order.retain(|p| p != placeholder);
        self.forward.remove(placeholder)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Placeholder, &String)> {
        self.order.iter().map(move |p| (p, &self.forward[p]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct SessionProjection {
    mapping: MappingTable,
    reverse: HashMap<String, Placeholder>,
    counters: HashMap<Category, u32>,
}

impl SessionProjection {
    fn new() -> Self {
        Self {
            mapping: MappingTable::default(),
            reverse: HashMap::new(),
            counters: HashMap::new(),
        }
    }
}

struct VaultInner {
    entries: HashMap<(Uuid, Placeholder), VaultEntry>,
    sessions: HashMap<Uuid, SessionProjection>,
}

impl VaultInner {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    fn session_mut(&mut self, session_id: Uuid) -> &mut SessionProjection {
        self.sessions.entry(session_id).or_insert_with(SessionProjection::new)
    }
}

/// Global eviction cap default, per the design's "default 10 000".
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
/// Default session TTL in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 300;
/// How often the background purge sweep runs.
pub const PURGE_INTERVAL_SECONDS: u64 = 300;
/// Debounce window for coalescing writes into one flush.
pub const DEBOUNCE_MILLIS: u64 = 100;

pub struct TokenVault {
    inner: Mutex<VaultInner>,
    path: PathBuf,
    ttl: ChronoDuration,
    max_entries: usize,
    dirty: AtomicBool,
    _lock_guard: Option<persist::FileLock>,
}

impl TokenVault {
    /// Load the vault from `path` (or start empty if missing/corrupt),
    /// taking an advisory lock on the vault directory so a second process
    /// cannot run against the same file concurrently.
    pub fn open(path: PathBuf, ttl_seconds: u64, max_entries: usize) -> Result<Arc<Self>> {
        let lock_guard = persist::acquire_lock(&path)?;

        let mut inner = VaultInner::new();
        match persist::load_entries(&path) {
            Ok(entries) => {
                let now = Utc::now();
                for entry in entries {
                    if entry.expires_at <= now {
                        continue;
                    }
                    let session = inner.session_mut(entry.session_id);
                    let placeholder: Placeholder = entry.token.into();
                    session.mapping.set(placeholder, entry.original_value.clone());
                    session.reverse.insert(entry.original_value.clone(), placeholder);
                    let counter = session.counters.entry(placeholder.category).or_insert(0);
                    *counter = (*counter).max(placeholder.n);
                    inner.entries.insert((entry.session_id, placeholder), entry);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "vault file unreadable or corrupt, starting empty");
            }
        }

        tracing::info!(path = %path.display(), entries = inner.entries.len(), "vault loaded");

        Ok(Arc::new(Self {
            inner: Mutex::new(inner),
            path,
            ttl: ChronoDuration::seconds(ttl_seconds as i64),
            max_entries,
            dirty: AtomicBool::new(false),
            _lock_guard: lock_guard,
        }))
    }

    /// Create a new session with a cryptographically random UUID-v4.
    pub fn create_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().session_mut(id);
        tracing::debug!(session_id = %id, "vault session created");
        id
    }

    /// Idempotent store: if `original` is already mapped in this session,
    /// returns the existing placeholder without allocating a new counter;
    /// otherwise allocates the next counter for `category`, persists a new
    /// entry, and returns the newly-formed placeholder.
    pub fn store(&self, session_id: Uuid, original: &str, category: Category) -> Placeholder {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let ttl = self.ttl;

        {
            let session = inner.session_mut(session_id);
            if let Some(&existing) = session.reverse.get(original) {
                drop(session);
                self.touch_entry(&mut inner, session_id, existing, now);
                return existing;
            }
        }

        let next_n = {
            let session = inner.session_mut(session_id);
            let counter = session.counters.entry(category).or_insert(0);
            *counter += 1;
            *counter
        };
        let placeholder = Placeholder::new(category, next_n);

        {
            let session = inner.session_mut(session_id);
            session.mapping.set(placeholder, original.to_string());
            session.reverse.insert(original.to_string(), placeholder);
        }

        inner.entries.insert(
            (session_id, placeholder),
            VaultEntry {
                token: placeholder.into(),
                original_value: original.to_string(),
                category,
                session_id,
                created_at: now,
                last_accessed_at: now,
                expires_at: now + ttl,
            },
        );

        self.evict_if_over_cap(&mut inner);
        self.dirty.store(true, Ordering::Relaxed);
        placeholder
    }

    /// Resolve a placeholder back to its original value, refreshing its
    /// last-accessed time. Returns `None` if unknown or expired.
    pub fn resolve(&self, session_id: Uuid, placeholder: Placeholder) -> Option<String> {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let key = (session_id, placeholder);
        let expired = match inner.entries.get(&key) {
            Some(entry) => entry.expires_at <= now,
            None => return None,
        };
        if expired {
            inner.entries.remove(&key);
            if let Some(session) = inner.sessions.get_mut(&session_id) {
                if let Some(original) = session.mapping.delete(&placeholder) {
                    session.reverse.remove(&original);
                }
            }
            return None;
        }
        self.touch_entry(&mut inner, session_id, placeholder, now);
        inner.entries.get(&key).map(|e| e.original_value.clone())
    }

    fn touch_entry(&self, inner: &mut VaultInner, session_id: Uuid, placeholder: Placeholder, now: DateTime<Utc>) {
        if let Some(entry) = inner.entries.get_mut(&(session_id, placeholder)) {
            entry.last_accessed_at = now;
        }
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// A snapshot of the session's full current mapping table, suitable
    /// for passing to `Restorer::restore` — includes entries allocated in
    /// earlier calls sharing this session, not just the most recent call.
    pub fn mapping_snapshot(&self, session_id: Uuid) -> MappingTable {
        let inner = self.inner.lock();
        inner
            .sessions
            .get(&session_id)
            .map(|s| s.mapping.clone())
            .unwrap_or_default()
    }

    /// Current per-category counters for the session.
    pub fn counters_snapshot(&self, session_id: Uuid) -> HashMap<Category, u32> {
        let inner = self.inner.lock();
        inner
            .sessions
            .get(&session_id)
            .map(|s| s.counters.clone())
            .unwrap_or_default()
    }

    /// Remove all entries belonging to `session_id`. Returns the count
    /// removed.
    pub fn destroy_session(&self, session_id: Uuid) -> usize {
        let mut inner = self.inner.lock();
        let removed = inner
            .entries
            .keys()
            .filter(|(sid, _)| *sid == session_id)
            .count();
        inner.entries.retain(|(sid, _), _| *sid != session_id);
        inner.sessions.remove(&session_id);
        if removed > 0 {
            self.dirty.store(true, Ordering::Relaxed);
        }
        tracing::debug!(session_id = %session_id, entries_removed = removed, "vault session destroyed");
        removed
    }

    /// Remove every entry whose `expires_at` has passed. Called
    /// periodically by the background purge task and once at load.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let expired_keys: Vec<(Uuid, Placeholder)> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| *k)
            .collect();

        for (session_id, placeholder) in &expired_keys {
            inner.entries.remove(&(*session_id, *placeholder));
            if let Some(session) = inner.sessions.get_mut(session_id) {
                if let Some(original) = session.mapping.delete(placeholder) {
                    session.reverse.remove(&original);
                }
            }
        }

        if !expired_keys.is_empty() {
            self.dirty.store(true, Ordering::Relaxed);
            tracing::debug!(count = expired_keys.len(), "purged expired vault entries");
        }
        expired_keys.len()
    }

    fn evict_if_over_cap(&self, inner: &mut VaultInner) {
        while inner.entries.len() > self.max_entries {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed_at)
                .map(|(k, _)| *k);
            let Some(key) = oldest else { break };
            inner.entries.remove(&key);
            if let Some(session) = inner.sessions.get_mut(&key.0) {
                if let Some(original) = session.mapping.delete(&key.1) {
                    session.reverse.remove(&original);
                }
            }
            tracing::debug!(session_id = %key.0, placeholder = %Placeholder::from(key.1), "evicted LRU vault entry over cap");
        }
    }

    /// Flush pending writes to disk if dirty, atomically.
    pub fn flush(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        let entries: Vec<VaultEntry> = {
            let inner = self.inner.lock();
            inner.entries.values().cloned().collect()
        };
        persist::atomic_write(&self.path, &entries)
    }

    /// Flush any pending writes and release the advisory lock. Must be
    /// called before the process exits.
    pub async fn close(&self) -> Result<()> {
        self.flush()
    }

    /// Spawn the debounced flush task and the periodic purge task. Both
    /// run for the lifetime of the returned `JoinHandle`s' tasks; callers
    /// typically let them run until process shutdown.
    /// Spawn the debounced-flush and periodic-purge loops. Both loops
    /// select over `shutdown` alongside their tick interval so they exit
    /// promptly instead of lingering after the server has stopped
    /// accepting requests.
    pub fn spawn_background_tasks(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let flush_vault = Arc::clone(self);
        let flush_shutdown = shutdown.clone();
        let flush_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(DEBOUNCE_MILLIS));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = flush_vault.flush() {
                            tracing::error!(error = %e, "vault flush failed; will retry on next debounce");
                        }
                    }
                    _ = flush_shutdown.cancelled() => break,
                }
            }
        });

        let purge_vault = Arc::clone(self);
        let purge_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(PURGE_INTERVAL_SECONDS));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        purge_vault.purge_expired();
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        });

        (flush_task, purge_task)
    }
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("path", &self.path)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_test_vault() -> (Arc<TokenVault>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault").join("token-vault.json");
        let vault = TokenVault::open(path, 300, DEFAULT_MAX_ENTRIES).unwrap();
        (vault, dir)
    }

    #[test]
    fn store_and_resolve_round_trip() {
        let (vault, _dir) = open_test_vault();
        let session = vault.create_session();
        let placeholder = vault.store(session, "123-45-6789", Category::Ssn);
        assert_eq!(placeholder.n, 1);
        assert_eq!(vault.resolve(session, placeholder).as_deref(), Some("123-45-6789"));
    }

    #[test]
    fn store_is_idempotent_for_same_original() {
        let (vault, _dir) = open_test_vault();
        let session = vault.create_session();
        let p1 = vault.store(session, "John Smith", Category::Person);
        let p2 = vault.store(session, "John Smith", Category::Person);
        assert_eq!(p1, p2);
    }

    #[test]
    fn counters_increase_monotonically_per_category() {
        let (vault, _dir) = open_test_vault();
        let session = vault.create_session();
        let p1 = vault.store(session, "alice@example.com", Category::Email);
        let p2 = vault.store(session, "bob@example.com", Category::Email);
        assert_eq!(p1.n, 1);
        assert_eq!(p2.n, 2);
    }

    #[test]
    fn separate_sessions_get_independent_counters() {
        let (vault, _dir) = open_test_vault();
        let s1 = vault.create_session();
        let s2 = vault.create_session();
        let p1 = vault.store(s1, "alice@example.com", Category::Email);
        let p2 = vault.store(s2, "alice@example.com", Category::Email);
        assert_eq!(p1.n, 1);
        assert_eq!(p2.n, 1);
    }

    #[test]
    fn destroy_session_removes_its_entries() {
        let (vault, _dir) = open_test_vault();
        let session = vault.create_session();
        vault.store(session, "123-45-6789", Category::Ssn);
        let removed = vault.destroy_session(session);
        assert_eq!(removed, 1);
        assert_eq!(vault.mapping_snapshot(session).len(), 0);
    }

    #[test]
    fn purge_expired_removes_past_ttl_entries() {
        let (vault, _dir) = open_test_vault();
        let session = vault.create_session();
        let placeholder = vault.store(session, "123-45-6789", Category::Ssn);
        {
            let mut inner = vault.inner.lock();
            if let Some(entry) = inner.entries.get_mut(&(session, placeholder)) {
                entry.expires_at = Utc::now() - ChronoDuration::seconds(1);
            }
        }
        let purged = vault.purge_expired();
        assert_eq!(purged, 1);
        assert!(vault.resolve(session, placeholder).is_none());
    }

    #[test]
    fn eviction_respects_global_cap_across_sessions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault").join("token-vault.json");
        let vault = TokenVault::open(path, 300, 2).unwrap();
        let session = vault.create_session();
        vault.store(session, "one@example.com", Category::Email);
        vault.store(session, "two@example.com", Category::Email);
        vault.store(session, "three@example.com", Category::Email);
        assert_eq!(vault.mapping_snapshot(session).len(), 2);
    }

    #[test]
    fn persists_and_reloads_across_open_calls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault").join("token-vault.json");
        let session;
        let placeholder;
        {
            let vault = TokenVault::open(path.clone(), 300, DEFAULT_MAX_ENTRIES).unwrap();
            session = vault.create_session();
            placeholder = vault.store(session, "123-45-6789", Category::Ssn);
            vault.flush().unwrap();
        }
        {
            let vault = TokenVault::open(path, 300, DEFAULT_MAX_ENTRIES).unwrap();
            assert_eq!(vault.resolve(session, placeholder).as_deref(), Some("123-45-6789"));
        }
    }
}
