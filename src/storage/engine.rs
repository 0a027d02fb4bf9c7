//! Thread-Safe Storage Engine
//!
//! [`StorageEngine`] is the shared handle hosts use. It wraps the
//! [`Keyspace`] and the [`PubSubRegistry`] behind one exclusive lock.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                StorageEngine                 │
//! │  ┌────────────────────────────────────────┐  │
//! │  │          parking_lot::Mutex            │  │
//! │  │   ┌────────────┐   ┌───────────────┐   │  │
//! │  │   │  Keyspace  │   │ PubSubRegistry│   │  │
//! │  │   │ map + pool │   │               │   │  │
//! │  │   └────────────┘   └───────────────┘   │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//!          ▲                         ▲
//!   foreground commands       ExpirySweeper thread
//! ```
//!
//! Every command and every sweep pass holds the lock for its full duration,
//! so commands never interleave with each other or with a sweep. There is no
//! read/write split: reads evict expired keys and therefore mutate.

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::pubsub::{Delivery, PubSubRegistry, SubscriberId};
use crate::storage::keyspace::{KeyDump, KeyMeta, Keyspace};
use crate::storage::pool::PoolStats;
use crate::storage::value::KeyType;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// State guarded by the engine lock.
#[derive(Debug)]
struct Shared {
    keyspace: Keyspace,
    pubsub: PubSubRegistry,
}

/// The main storage engine.
///
/// # Example
///
/// ```
/// use keystash::StorageEngine;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set("name", "Ariz");
/// assert_eq!(engine.get("name").unwrap(), Some("Ariz".to_string()));
///
/// // Set with expiry
/// engine.set_with_ttl("session", "abc123", Duration::from_secs(60));
/// assert!(engine.ttl("session") > 0);
/// ```
pub struct StorageEngine {
    shared: Mutex<Shared>,
    config: StoreConfig,

    /// Statistics: completed sweep passes
    sweep_passes: AtomicU64,

    /// Statistics: total PUBLISH calls
    publish_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("config", &self.config)
            .field("sweep_passes", &self.sweep_passes.load(Ordering::Relaxed))
            .field("publish_count", &self.publish_count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new storage engine with default settings.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a storage engine with an explicit configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            shared: Mutex::new(Shared {
                keyspace: Keyspace::new(config.pool_capacity),
                pubsub: PubSubRegistry::new(),
            }),
            config,
            sweep_passes: AtomicU64::new(0),
            publish_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Runs `f` against the keyspace under the engine lock.
    ///
    /// Useful for composing several commands into one step that no other
    /// caller or sweep pass can interleave with.
    ///
    /// # Deadlocks
    ///
    /// The engine lock is not reentrant. Calling any `StorageEngine` method
    /// from inside `f`, on this engine, blocks forever. Use the `Keyspace`
    /// passed to `f` instead.
    pub fn with_keyspace<R>(&self, f: impl FnOnce(&mut Keyspace) -> R) -> R {
        f(&mut self.shared.lock().keyspace)
    }

    // ========================================================================
    // GENERIC COMMANDS
    // ========================================================================

    /// Sets a key to a string value, replacing any previous value.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.with_keyspace(|ks| ks.set(key, value))
    }

    /// Sets a key to a string value that expires after `ttl`.
    pub fn set_with_ttl(&self, key: &str, value: impl Into<String>, ttl: Duration) {
        self.with_keyspace(|ks| ks.set_with_ttl(key, value, ttl))
    }

    /// Gets the string value of a key.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_keyspace(|ks| ks.get(key))
    }

    /// Deletes keys, returning how many existed.
    pub fn del<K: AsRef<str>>(&self, keys: impl IntoIterator<Item = K>) -> usize {
        self.with_keyspace(|ks| ks.del(keys))
    }

    /// Counts how many of the given keys exist.
    pub fn exists<K: AsRef<str>>(&self, keys: impl IntoIterator<Item = K>) -> usize {
        self.with_keyspace(|ks| ks.exists(keys))
    }

    pub fn key_exists(&self, key: &str) -> bool {
        self.with_keyspace(|ks| ks.key_exists(key))
    }

    pub fn incr(&self, key: &str) -> StoreResult<i64> {
        self.with_keyspace(|ks| ks.incr(key))
    }

    pub fn decr(&self, key: &str) -> StoreResult<i64> {
        self.with_keyspace(|ks| ks.decr(key))
    }

    pub fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.with_keyspace(|ks| ks.incr_by(key, delta))
    }

    pub fn decr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.with_keyspace(|ks| ks.decr_by(key, delta))
    }

    /// Returns all live keys matching a glob pattern.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        self.with_keyspace(|ks| ks.keys(pattern))
    }

    /// Sets several keys. Each entry is applied under a single lock hold.
    pub fn mset<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        self.with_keyspace(|ks| ks.mset(pairs))
    }

    pub fn mget<K: AsRef<str>>(&self, keys: impl IntoIterator<Item = K>) -> Vec<Option<String>> {
        self.with_keyspace(|ks| ks.mget(keys))
    }

    pub fn key_type(&self, key: &str) -> StoreResult<KeyType> {
        self.with_keyspace(|ks| ks.key_type(key))
    }

    pub fn dump(&self, key: &str) -> StoreResult<KeyDump> {
        self.with_keyspace(|ks| ks.dump(key))
    }

    pub fn snapshot(&self, pattern: &str) -> StoreResult<BTreeMap<String, KeyMeta>> {
        self.with_keyspace(|ks| ks.snapshot(pattern))
    }

    /// Clears all data from the database.
    ///
    /// Subscriptions are left untouched.
    pub fn flush(&self) {
        self.with_keyspace(Keyspace::flush)
    }

    /// Returns the number of keys in the map.
    ///
    /// Expired keys that have not been evicted yet are included.
    pub fn len(&self) -> usize {
        self.with_keyspace(|ks| ks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // EXPIRY
    // ========================================================================

    pub fn expire(&self, key: &str, seconds: i64) -> bool {
        self.with_keyspace(|ks| ks.expire(key, seconds))
    }

    pub fn pexpire(&self, key: &str, millis: i64) -> bool {
        self.with_keyspace(|ks| ks.pexpire(key, millis))
    }

    /// Remaining TTL in seconds; `-1` without expiry, `-2` if missing.
    pub fn ttl(&self, key: &str) -> i64 {
        self.with_keyspace(|ks| ks.ttl(key))
    }

    pub fn pttl(&self, key: &str) -> i64 {
        self.with_keyspace(|ks| ks.pttl(key))
    }

    pub fn persist(&self, key: &str) -> bool {
        self.with_keyspace(|ks| ks.persist(key))
    }

    /// Evicts every expired key in one pass.
    ///
    /// This is called by the background expiry sweeper.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were evicted.
    pub fn cleanup_expired(&self) -> u64 {
        let removed = self.with_keyspace(|ks| ks.remove_expired(Instant::now())) as u64;
        self.sweep_passes.fetch_add(1, Ordering::Relaxed);
        if removed > 0 {
            trace!(removed, "Sweep pass evicted keys");
        }
        removed
    }

    // ========================================================================
    // HASH COMMANDS
    // ========================================================================

    pub fn hset(
        &self,
        key: &str,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> StoreResult<bool> {
        self.with_keyspace(|ks| ks.hset(key, field, value))
    }

    pub fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.with_keyspace(|ks| ks.hget(key, field))
    }

    pub fn hget_or(&self, key: &str, field: &str, default: &str) -> StoreResult<String> {
        self.with_keyspace(|ks| ks.hget_or(key, field, default))
    }

    pub fn hdel<F: AsRef<str>>(
        &self,
        key: &str,
        fields: impl IntoIterator<Item = F>,
    ) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.hdel(key, fields))
    }

    pub fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        self.with_keyspace(|ks| ks.hexists(key, field))
    }

    pub fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.with_keyspace(|ks| ks.hgetall(key))
    }

    pub fn hkeys(&self, key: &str) -> StoreResult<Vec<String>> {
        self.with_keyspace(|ks| ks.hkeys(key))
    }

    pub fn hvals(&self, key: &str) -> StoreResult<Vec<String>> {
        self.with_keyspace(|ks| ks.hvals(key))
    }

    pub fn hlen(&self, key: &str) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.hlen(key))
    }

    // ========================================================================
    // LIST COMMANDS
    // ========================================================================

    /// Pushes values to the head of a list, one at a time in input order.
    pub fn lpush<V: Into<String>>(
        &self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.lpush(key, values))
    }

    /// Pushes values to the tail of a list.
    pub fn rpush<V: Into<String>>(
        &self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.rpush(key, values))
    }

    pub fn lpop(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_keyspace(|ks| ks.lpop(key))
    }

    pub fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_keyspace(|ks| ks.rpop(key))
    }

    pub fn llen(&self, key: &str) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.llen(key))
    }

    pub fn lindex(&self, key: &str, index: i64) -> StoreResult<Option<String>> {
        self.with_keyspace(|ks| ks.lindex(key, index))
    }

    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.with_keyspace(|ks| ks.lrange(key, start, stop))
    }

    pub fn lset(&self, key: &str, index: i64, element: impl Into<String>) -> StoreResult<bool> {
        self.with_keyspace(|ks| ks.lset(key, index, element))
    }

    pub fn lrem(&self, key: &str, count: i64, element: &str) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.lrem(key, count, element))
    }

    // ========================================================================
    // SET COMMANDS
    // ========================================================================

    pub fn sadd<M: Into<String>>(
        &self,
        key: &str,
        members: impl IntoIterator<Item = M>,
    ) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.sadd(key, members))
    }

    pub fn srem<M: AsRef<str>>(
        &self,
        key: &str,
        members: impl IntoIterator<Item = M>,
    ) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.srem(key, members))
    }

    pub fn smembers(&self, key: &str) -> StoreResult<HashSet<String>> {
        self.with_keyspace(|ks| ks.smembers(key))
    }

    pub fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.with_keyspace(|ks| ks.sismember(key, member))
    }

    pub fn scard(&self, key: &str) -> StoreResult<usize> {
        self.with_keyspace(|ks| ks.scard(key))
    }

    pub fn spop(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_keyspace(|ks| ks.spop(key))
    }

    pub fn smove(&self, source: &str, destination: &str, member: &str) -> StoreResult<bool> {
        self.with_keyspace(|ks| ks.smove(source, destination, member))
    }

    // ========================================================================
    // PUB/SUB
    // ========================================================================

    pub fn subscribe(&self, channel: &str, subscriber: SubscriberId) {
        self.shared.lock().pubsub.subscribe(channel, subscriber)
    }

    pub fn unsubscribe(&self, channel: &str, subscriber: SubscriberId) -> bool {
        self.shared.lock().pubsub.unsubscribe(channel, subscriber)
    }

    pub fn psubscribe(&self, pattern: &str, subscriber: SubscriberId) {
        self.shared.lock().pubsub.psubscribe(pattern, subscriber)
    }

    pub fn punsubscribe(&self, pattern: &str, subscriber: SubscriberId) -> bool {
        self.shared.lock().pubsub.punsubscribe(pattern, subscriber)
    }

    pub fn get_subscribers(&self, channel: &str) -> Vec<SubscriberId> {
        self.shared.lock().pubsub.get_subscribers(channel)
    }

    pub fn get_all_pattern_subscriptions(&self) -> HashMap<String, Vec<SubscriberId>> {
        self.shared.lock().pubsub.get_all_pattern_subscriptions()
    }

    /// Drops every channel and pattern registration of `subscriber`.
    pub fn remove_subscriber(&self, subscriber: SubscriberId) -> usize {
        self.shared.lock().pubsub.remove_subscriber(subscriber)
    }

    /// Resolves who should receive a message on `channel`.
    ///
    /// The engine does not deliver anything; the caller notifies each
    /// returned subscriber through its own mechanism.
    pub fn publish(&self, channel: &str) -> Vec<Delivery> {
        self.publish_count.fetch_add(1, Ordering::Relaxed);
        self.shared.lock().pubsub.resolve(channel)
    }

    // ========================================================================
    // STATISTICS
    // ========================================================================

    /// Returns database statistics.
    pub fn stats(&self) -> StorageStats {
        let shared = self.shared.lock();
        let keyspace = shared.keyspace.stats();
        StorageStats {
            keys: keyspace.keys,
            expired_lazy: keyspace.expired_lazy,
            expired_swept: keyspace.expired_swept,
            sweep_passes: self.sweep_passes.load(Ordering::Relaxed),
            channels: shared.pubsub.channel_count(),
            patterns: shared.pubsub.pattern_count(),
            publishes: self.publish_count.load(Ordering::Relaxed),
            pool: keyspace.pool,
        }
    }
}

/// Database statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: usize,
    /// Keys evicted on access
    pub expired_lazy: u64,
    /// Keys evicted by sweeps and key scans
    pub expired_swept: u64,
    /// Completed sweep passes
    pub sweep_passes: u64,
    /// Channels with at least one subscriber
    pub channels: usize,
    /// Patterns with at least one subscriber
    pub patterns: usize,
    /// Total publish calls
    pub publishes: u64,
    pub pool: PoolStats,
}
