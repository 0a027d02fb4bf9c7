//! Keyspace: Command Logic Over the Key Map
//!
//! [`Keyspace`] owns the key → value map and the [`ValuePool`] the values
//! live in. It implements every data command but does no locking of its own;
//! [`StorageEngine`](crate::storage::StorageEngine) wraps it in a single
//! exclusive lock for shared use.
//!
//! ## Expiry
//!
//! Every command that reads or mutates a key first compares the key's
//! deadline with the current time and evicts it when the deadline has
//! passed. The check is unconditional, so an expired key is never observed.
//! [`Keyspace::remove_expired`] does the same for the whole map and is what
//! the background sweeper calls.
//!
//! ## Type Safety
//!
//! A key's kind is fixed when its value is created. Commands that address a
//! key of another kind return [`StoreError::WrongType`] without touching it.

use crate::error::{StoreError, StoreResult};
use crate::pattern::GlobPattern;
use crate::storage::pool::{PoolStats, ValueHandle, ValuePool};
use crate::storage::value::{KeyType, Value, ValueData, ValueKind};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Full snapshot of one key, as returned by [`Keyspace::dump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDump {
    pub key_type: KeyType,
    /// Same encoding as [`Keyspace::ttl`]
    pub ttl: i64,
    /// None when the key is missing or expired
    pub value: Option<ValueData>,
}

/// Metadata-only view of one key, as returned by [`Keyspace::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMeta {
    pub key_type: KeyType,
    pub ttl: i64,
}

/// Keyspace counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyspaceStats {
    /// Keys currently in the map (may include expired keys not yet evicted)
    pub keys: usize,
    /// Keys evicted on access
    pub expired_lazy: u64,
    /// Keys evicted by full scans (`remove_expired`, `keys`)
    pub expired_swept: u64,
    pub pool: PoolStats,
}

/// Single-threaded store engine.
///
/// # Example
///
/// ```
/// use keystash::storage::Keyspace;
///
/// let mut ks = Keyspace::new(16);
/// ks.set("name", "Ariz");
/// assert_eq!(ks.get("name").unwrap(), Some("Ariz".to_string()));
///
/// ks.rpush("queue", ["a", "b"]).unwrap();
/// assert_eq!(ks.lrange("queue", 0, -1).unwrap(), vec!["a", "b"]);
/// ```
#[derive(Debug)]
pub struct Keyspace {
    entries: HashMap<String, ValueHandle>,
    pool: ValuePool,
    expired_lazy: u64,
    expired_swept: u64,
}

impl Keyspace {
    /// Creates an empty keyspace whose pool holds `pool_capacity` slots.
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            pool: ValuePool::with_capacity(pool_capacity),
            expired_lazy: 0,
            expired_swept: 0,
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Removes a key and releases its value. Returns true if the key existed.
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(handle) => {
                if let Err(e) = self.pool.release(handle) {
                    warn!(key, error = %e, "Released a value through an invalid handle");
                }
                true
            }
            None => false,
        }
    }

    /// Evicts `key` if its deadline has passed. Returns true if it was evicted.
    fn evict_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let expired = match self.entries.get(key) {
            // A handle that no longer resolves is treated as gone
            Some(handle) => self
                .pool
                .get(handle)
                .map(|value| value.is_expired_at(now))
                .unwrap_or(true),
            None => return false,
        };

        if expired {
            self.remove(key);
            self.expired_lazy += 1;
            trace!(key, "Evicted expired key on access");
        }
        expired
    }

    /// Looks up a live value.
    fn lookup(&mut self, key: &str) -> StoreResult<Option<&Value>> {
        self.evict_if_expired(key, Instant::now());
        match self.entries.get(key) {
            Some(handle) => Ok(Some(self.pool.get(handle)?)),
            None => Ok(None),
        }
    }

    /// Looks up a live value for mutation.
    fn lookup_mut(&mut self, key: &str) -> StoreResult<Option<&mut Value>> {
        self.evict_if_expired(key, Instant::now());
        match self.entries.get_mut(key) {
            Some(handle) => Ok(Some(self.pool.get_mut(handle)?)),
            None => Ok(None),
        }
    }

    /// Returns the live value for `key`, creating an empty value of `kind`
    /// if the key is missing. Fails without side effects on a kind mismatch.
    fn get_or_create(&mut self, key: &str, kind: ValueKind) -> StoreResult<&mut Value> {
        self.evict_if_expired(key, Instant::now());
        let handle = match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.pool.acquire(ValueData::empty(kind))),
        };

        let value = self.pool.get_mut(handle)?;
        if value.kind() != kind {
            return Err(StoreError::WrongType {
                expected: kind,
                actual: value.kind(),
            });
        }
        Ok(value)
    }

    /// Installs a fresh value, releasing whatever the key held before.
    fn install(&mut self, key: &str, data: ValueData, deadline: Option<Instant>) {
        self.remove(key);
        let mut handle = self.pool.acquire(data);
        if deadline.is_some() {
            if let Ok(value) = self.pool.get_mut(&mut handle) {
                value.set_expires_at(deadline);
            }
        }
        self.entries.insert(key.to_string(), handle);
    }

    fn ttl_of(value: &Value, now: Instant) -> i64 {
        match value.ttl_at(now) {
            None => -1,
            // Rounded up so a live key never reports 0
            Some(remaining) => remaining.as_millis().div_ceil(1000).max(1) as i64,
        }
    }

    // ========================================================================
    // GENERIC COMMANDS
    // ========================================================================

    /// Sets a key to a string value, replacing any previous value of any kind.
    /// The new value has no expiry.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.install(key, ValueData::Str(value.into()), None);
    }

    /// Sets a key to a string value that expires after `ttl`.
    pub fn set_with_ttl(&mut self, key: &str, value: impl Into<String>, ttl: Duration) {
        self.install(key, ValueData::Str(value.into()), Some(deadline_after(ttl)));
    }

    /// Gets the string value of a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    pub fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        match self.lookup(key)? {
            Some(value) => Ok(Some(value.as_str()?.to_string())),
            None => Ok(None),
        }
    }

    /// Deletes keys, returning how many existed (expired keys don't count).
    pub fn del<K: AsRef<str>>(&mut self, keys: impl IntoIterator<Item = K>) -> usize {
        let now = Instant::now();
        keys.into_iter()
            .filter(|key| {
                let key: &str = key.as_ref();
                !self.evict_if_expired(key, now) && self.remove(key)
            })
            .count()
    }

    /// Counts how many of the given keys exist. Duplicates count each time.
    pub fn exists<K: AsRef<str>>(&mut self, keys: impl IntoIterator<Item = K>) -> usize {
        keys.into_iter()
            .filter(|key| {
                let key: &str = key.as_ref();
                self.key_exists(key)
            })
            .count()
    }

    /// Checks if a single key exists (and is not expired).
    pub fn key_exists(&mut self, key: &str) -> bool {
        !self.evict_if_expired(key, Instant::now()) && self.entries.contains_key(key)
    }

    /// Increments an integer value by 1.
    ///
    /// If the key doesn't exist, it's treated as "0" before the operation.
    pub fn incr(&mut self, key: &str) -> StoreResult<i64> {
        self.incr_by(key, 1)
    }

    /// Decrements an integer value by 1.
    pub fn decr(&mut self, key: &str) -> StoreResult<i64> {
        self.incr_by(key, -1)
    }

    /// Decrements an integer value by a specified amount.
    pub fn decr_by(&mut self, key: &str, delta: i64) -> StoreResult<i64> {
        let delta = delta.checked_neg().ok_or(StoreError::IntegerOverflow)?;
        self.incr_by(key, delta)
    }

    /// Adds `delta` to the integer stored at `key`, keeping its expiry.
    pub fn incr_by(&mut self, key: &str, delta: i64) -> StoreResult<i64> {
        if let Some(value) = self.lookup_mut(key)? {
            let current = value.as_str_mut()?;
            let parsed: i64 = current.parse().map_err(|_| StoreError::NotAnInteger)?;
            let next = parsed
                .checked_add(delta)
                .ok_or(StoreError::IntegerOverflow)?;
            *current = next.to_string();
            return Ok(next);
        }

        self.install(key, ValueData::Str(delta.to_string()), None);
        Ok(delta)
    }

    /// Returns all live keys matching a glob pattern.
    ///
    /// Expired keys met during the scan are evicted.
    pub fn keys(&mut self, pattern: &str) -> Vec<String> {
        let pattern = GlobPattern::new(pattern);
        let now = Instant::now();
        let mut matched = Vec::new();
        let mut expired = Vec::new();

        for (key, handle) in &self.entries {
            match self.pool.get(handle) {
                Ok(value) if !value.is_expired_at(now) => {
                    if pattern.matches(key) {
                        matched.push(key.clone());
                    }
                }
                _ => expired.push(key.clone()),
            }
        }

        for key in &expired {
            self.remove(key);
        }
        self.expired_swept += expired.len() as u64;

        matched
    }

    /// Sets several keys. Not atomic across entries.
    pub fn mset<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.set(key.as_ref(), value);
        }
    }

    /// Gets several keys. Missing, expired and non-string keys read as `None`.
    pub fn mget<K: AsRef<str>>(&mut self, keys: impl IntoIterator<Item = K>) -> Vec<Option<String>> {
        keys.into_iter()
            .map(|key| {
                let key: &str = key.as_ref();
                self.get(key).ok().flatten()
            })
            .collect()
    }

    /// Returns the type of a key.
    pub fn key_type(&mut self, key: &str) -> StoreResult<KeyType> {
        Ok(KeyType::from(self.lookup(key)?.map(Value::kind)))
    }

    /// Returns the type, TTL and full contents of a key.
    pub fn dump(&mut self, key: &str) -> StoreResult<KeyDump> {
        let now = Instant::now();
        Ok(match self.lookup(key)? {
            Some(value) => KeyDump {
                key_type: value.kind().into(),
                ttl: Self::ttl_of(value, now),
                value: Some(value.data().clone()),
            },
            None => KeyDump {
                key_type: KeyType::None,
                ttl: -2,
                value: None,
            },
        })
    }

    /// Returns type and TTL for every live key matching `pattern`.
    pub fn snapshot(&mut self, pattern: &str) -> StoreResult<BTreeMap<String, KeyMeta>> {
        let now = Instant::now();
        let mut result = BTreeMap::new();

        for key in self.keys(pattern) {
            if let Some(handle) = self.entries.get(&key) {
                let value = self.pool.get(handle)?;
                result.insert(
                    key,
                    KeyMeta {
                        key_type: value.kind().into(),
                        ttl: Self::ttl_of(value, now),
                    },
                );
            }
        }

        Ok(result)
    }

    /// Removes every key.
    pub fn flush(&mut self) {
        for (_, handle) in self.entries.drain() {
            if let Err(e) = self.pool.release(handle) {
                warn!(error = %e, "Released a value through an invalid handle");
            }
        }
    }

    /// Returns the number of keys in the map, including expired keys that
    /// have not been evicted yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> KeyspaceStats {
        KeyspaceStats {
            keys: self.entries.len(),
            expired_lazy: self.expired_lazy,
            expired_swept: self.expired_swept,
            pool: self.pool.stats(),
        }
    }

    // ========================================================================
    // EXPIRY
    // ========================================================================

    /// Sets a key to expire `seconds` from now. Zero or negative values
    /// expire it immediately.
    ///
    /// Returns `false` if the key doesn't exist.
    pub fn expire(&mut self, key: &str, seconds: i64) -> bool {
        self.expire_in(key, Duration::from_secs(seconds.max(0) as u64))
    }

    /// Millisecond variant of [`Keyspace::expire`].
    pub fn pexpire(&mut self, key: &str, millis: i64) -> bool {
        self.expire_in(key, Duration::from_millis(millis.max(0) as u64))
    }

    fn expire_in(&mut self, key: &str, ttl: Duration) -> bool {
        let deadline = deadline_after(ttl);
        match self.lookup_mut(key) {
            Ok(Some(value)) => {
                value.set_expires_at(Some(deadline));
                true
            }
            _ => false,
        }
    }

    /// Gets the remaining TTL for a key in seconds.
    ///
    /// - `-2` if the key doesn't exist or has expired
    /// - `-1` if the key exists but has no expiry
    /// - otherwise the remaining seconds, rounded up
    pub fn ttl(&mut self, key: &str) -> i64 {
        let now = Instant::now();
        match self.lookup(key) {
            Ok(Some(value)) => Self::ttl_of(value, now),
            _ => -2,
        }
    }

    /// Gets the remaining TTL for a key in milliseconds, with the same
    /// `-1`/`-2` encoding as [`Keyspace::ttl`].
    pub fn pttl(&mut self, key: &str) -> i64 {
        let now = Instant::now();
        match self.lookup(key) {
            Ok(Some(value)) => value
                .ttl_at(now)
                .map(|remaining| remaining.as_millis().max(1) as i64)
                .unwrap_or(-1),
            _ => -2,
        }
    }

    /// Removes the expiry from a key.
    ///
    /// Returns `false` if the key doesn't exist or had no expiry.
    pub fn persist(&mut self, key: &str) -> bool {
        match self.lookup_mut(key) {
            Ok(Some(value)) if value.expires_at().is_some() => {
                value.set_expires_at(None);
                true
            }
            _ => false,
        }
    }

    /// Evicts every expired key. Returns how many were evicted.
    pub fn remove_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, handle)| {
                self.pool
                    .get(handle)
                    .map(|value| value.is_expired_at(now))
                    .unwrap_or(true)
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        self.expired_swept += expired.len() as u64;

        expired.len()
    }

    // ========================================================================
    // HASH COMMANDS
    // ========================================================================

    /// Sets a hash field, creating the hash if needed.
    ///
    /// Returns `true` if the field is new, `false` if it was overwritten.
    pub fn hset(
        &mut self,
        key: &str,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> StoreResult<bool> {
        let hash = self.get_or_create(key, ValueKind::Hash)?.as_hash_mut()?;
        Ok(hash.insert(field.into(), value.into()).is_none())
    }

    /// Gets a hash field. `None` if the key or field is missing.
    pub fn hget(&mut self, key: &str, field: &str) -> StoreResult<Option<String>> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_hash()?.get(field).cloned()),
            None => Ok(None),
        }
    }

    /// Gets a hash field, falling back to `default` if the key or field is missing.
    pub fn hget_or(&mut self, key: &str, field: &str, default: &str) -> StoreResult<String> {
        Ok(self
            .hget(key, field)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Returns a copy of the whole hash (empty if the key is missing).
    pub fn hgetall(&mut self, key: &str) -> StoreResult<HashMap<String, String>> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_hash()?.clone()),
            None => Ok(HashMap::new()),
        }
    }

    /// Deletes hash fields, returning how many were present.
    pub fn hdel<F: AsRef<str>>(
        &mut self,
        key: &str,
        fields: impl IntoIterator<Item = F>,
    ) -> StoreResult<usize> {
        match self.lookup_mut(key)? {
            Some(value) => {
                let hash = value.as_hash_mut()?;
                Ok(fields
                    .into_iter()
                    .filter(|field| {
                        let field: &str = field.as_ref();
                        hash.remove(field).is_some()
                    })
                    .count())
            }
            None => Ok(0),
        }
    }

    pub fn hexists(&mut self, key: &str, field: &str) -> StoreResult<bool> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_hash()?.contains_key(field)),
            None => Ok(false),
        }
    }

    pub fn hkeys(&mut self, key: &str) -> StoreResult<Vec<String>> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_hash()?.keys().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn hvals(&mut self, key: &str) -> StoreResult<Vec<String>> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_hash()?.values().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn hlen(&mut self, key: &str) -> StoreResult<usize> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_hash()?.len()),
            None => Ok(0),
        }
    }

    // ========================================================================
    // LIST COMMANDS
    // ========================================================================

    /// Pushes values to the head of a list, one at a time in input order.
    /// Creates the list if it doesn't exist.
    ///
    /// LPUSH key a b c results in [c, b, a] ahead of the previous contents.
    ///
    /// # Returns
    /// The length of the list after the push operation.
    pub fn lpush<V: Into<String>>(
        &mut self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> StoreResult<usize> {
        let list = self.get_or_create(key, ValueKind::List)?.as_list_mut()?;
        for value in values {
            list.push_front(value.into());
        }
        Ok(list.len())
    }

    /// Pushes values to the tail of a list.
    /// Creates the list if it doesn't exist.
    pub fn rpush<V: Into<String>>(
        &mut self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> StoreResult<usize> {
        let list = self.get_or_create(key, ValueKind::List)?.as_list_mut()?;
        for value in values {
            list.push_back(value.into());
        }
        Ok(list.len())
    }

    /// Removes and returns the first element of a list.
    pub fn lpop(&mut self, key: &str) -> StoreResult<Option<String>> {
        match self.lookup_mut(key)? {
            Some(value) => Ok(value.as_list_mut()?.pop_front()),
            None => Ok(None),
        }
    }

    /// Removes and returns the last element of a list.
    pub fn rpop(&mut self, key: &str) -> StoreResult<Option<String>> {
        match self.lookup_mut(key)? {
            Some(value) => Ok(value.as_list_mut()?.pop_back()),
            None => Ok(None),
        }
    }

    /// Returns the length of a list, or 0 if the list doesn't exist.
    pub fn llen(&mut self, key: &str) -> StoreResult<usize> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_list()?.len()),
            None => Ok(0),
        }
    }

    /// Returns the element at `index`. Negative indices count from the end.
    pub fn lindex(&mut self, key: &str, index: i64) -> StoreResult<Option<String>> {
        match self.lookup(key)? {
            Some(value) => {
                let list = value.as_list()?;
                Ok(resolve_index(index, list.len()).and_then(|i| list.get(i).cloned()))
            }
            None => Ok(None),
        }
    }

    /// Returns a range of elements from a list.
    /// Both start and stop are inclusive. Negative indices count from the end.
    pub fn lrange(&mut self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        match self.lookup(key)? {
            Some(value) => {
                let list = value.as_list()?;
                Ok(match clamp_range(start, stop, list.len()) {
                    Some((from, count)) => list.iter().skip(from).take(count).cloned().collect(),
                    None => Vec::new(),
                })
            }
            None => Ok(Vec::new()),
        }
    }

    /// Sets the element at `index`. Negative indices count from the end.
    ///
    /// Returns `false` if the key is missing or the index is out of range.
    pub fn lset(&mut self, key: &str, index: i64, element: impl Into<String>) -> StoreResult<bool> {
        match self.lookup_mut(key)? {
            Some(value) => {
                let list = value.as_list_mut()?;
                match resolve_index(index, list.len()) {
                    Some(i) => {
                        list[i] = element.into();
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            None => Ok(false),
        }
    }

    /// Removes elements equal to `element` from a list.
    ///
    /// - count > 0: Remove up to `count` matches, from head to tail.
    /// - count < 0: Remove up to `|count|` matches, from tail to head.
    /// - count = 0: Remove all matches.
    ///
    /// # Returns
    /// The number of removed elements.
    pub fn lrem(&mut self, key: &str, count: i64, element: &str) -> StoreResult<usize> {
        let list = match self.lookup_mut(key)? {
            Some(value) => value.as_list_mut()?,
            None => return Ok(0),
        };

        let limit = if count == 0 {
            usize::MAX
        } else {
            usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX)
        };
        let mut removed = 0usize;

        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == element {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == element {
                    list.remove(i);
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    // ========================================================================
    // SET COMMANDS
    // ========================================================================

    /// Adds members to a set, creating it if needed.
    ///
    /// Returns how many members were not already present.
    pub fn sadd<M: Into<String>>(
        &mut self,
        key: &str,
        members: impl IntoIterator<Item = M>,
    ) -> StoreResult<usize> {
        let set = self.get_or_create(key, ValueKind::Set)?.as_set_mut()?;
        let mut added = 0;
        for member in members {
            if set.insert(member.into()) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes members from a set, returning how many were present.
    pub fn srem<M: AsRef<str>>(
        &mut self,
        key: &str,
        members: impl IntoIterator<Item = M>,
    ) -> StoreResult<usize> {
        match self.lookup_mut(key)? {
            Some(value) => {
                let set = value.as_set_mut()?;
                Ok(members
                    .into_iter()
                    .filter(|member| {
                        let member: &str = member.as_ref();
                        set.remove(member)
                    })
                    .count())
            }
            None => Ok(0),
        }
    }

    pub fn smembers(&mut self, key: &str) -> StoreResult<HashSet<String>> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_set()?.clone()),
            None => Ok(HashSet::new()),
        }
    }

    pub fn sismember(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_set()?.contains(member)),
            None => Ok(false),
        }
    }

    pub fn scard(&mut self, key: &str) -> StoreResult<usize> {
        match self.lookup(key)? {
            Some(value) => Ok(value.as_set()?.len()),
            None => Ok(0),
        }
    }

    /// Removes and returns an arbitrary member of a set.
    pub fn spop(&mut self, key: &str) -> StoreResult<Option<String>> {
        let set = match self.lookup_mut(key)? {
            Some(value) => value.as_set_mut()?,
            None => return Ok(None),
        };

        let member = set.iter().next().cloned();
        if let Some(member) = &member {
            set.remove(member);
        }
        Ok(member)
    }

    /// Moves `member` from the set at `source` to the set at `destination`,
    /// creating the destination if needed.
    ///
    /// Returns `false` if the source is missing or doesn't contain `member`.
    /// Both keys are type-checked before anything is modified.
    pub fn smove(&mut self, source: &str, destination: &str, member: &str) -> StoreResult<bool> {
        let present = match self.lookup(source)? {
            Some(value) => value.as_set()?.contains(member),
            None => false,
        };
        if !present {
            return Ok(false);
        }

        if let Some(value) = self.lookup(destination)? {
            value.as_set()?;
        }
        if source == destination {
            return Ok(true);
        }

        if let Some(value) = self.lookup_mut(source)? {
            value.as_set_mut()?.remove(member);
        }
        self.get_or_create(destination, ValueKind::Set)?
            .as_set_mut()?
            .insert(member.to_string());

        Ok(true)
    }
}

/// Longest TTL kept as given; longer ones are clamped to it.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Deadline `ttl` from now, saturating at the latest representable instant
/// not beyond `MAX_TTL`.
fn deadline_after(ttl: Duration) -> Instant {
    let now = Instant::now();
    let mut ttl = ttl.min(MAX_TTL);
    loop {
        if let Some(deadline) = now.checked_add(ttl) {
            return deadline;
        }
        ttl /= 2;
    }
}

/// Resolves a possibly negative index against a list of length `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    if (0..len).contains(&index) {
        Some(index as usize)
    } else {
        None
    }
}

/// Converts an inclusive `start..=stop` range with negative-index support
/// into `(offset, count)`, or None if the clamped range is empty.
fn clamp_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;

    let start = if start < 0 { len.saturating_add(start) } else { start }.max(0);
    let stop = if stop < 0 { len.saturating_add(stop) } else { stop }.min(len - 1);

    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, (stop - start + 1) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn keyspace() -> Keyspace {
        Keyspace::new(8)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_set_and_get() {
        let mut ks = keyspace();

        ks.set("key", "value");
        assert_eq!(ks.get("key").unwrap(), Some("value".to_string()));
        assert_eq!(ks.get("missing").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites_any_kind() {
        let mut ks = keyspace();

        ks.rpush("key", ["a"]).unwrap();
        ks.set("key", "plain");
        assert_eq!(ks.key_type("key").unwrap(), KeyType::String);
        assert_eq!(ks.len(), 1);
        // The list's slot went back to the pool
        assert_eq!(ks.stats().pool.in_use, 1);
    }

    #[test]
    fn test_set_clears_expiry() {
        let mut ks = keyspace();

        ks.set_with_ttl("key", "v", Duration::from_secs(100));
        assert!(ks.ttl("key") > 0);
        ks.set("key", "v2");
        assert_eq!(ks.ttl("key"), -1);
    }

    #[test]
    fn test_get_wrong_type() {
        let mut ks = keyspace();

        ks.hset("h", "f", "v").unwrap();
        assert!(ks.get("h").unwrap_err().is_wrong_type());
    }

    #[test]
    fn test_del_and_exists() {
        let mut ks = keyspace();

        ks.set("a", "1");
        ks.set("b", "2");
        assert_eq!(ks.exists(["a", "b", "c", "a"]), 3);
        assert_eq!(ks.del(["a", "b", "c"]), 2);
        assert_eq!(ks.exists(["a", "b"]), 0);
        assert_eq!(ks.del(["a"]), 0);
        assert!(ks.is_empty());
    }

    #[test]
    fn test_expired_keys_are_absent() {
        let mut ks = keyspace();

        ks.set_with_ttl("gone", "v", Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));

        assert!(!ks.key_exists("gone"));
        assert_eq!(ks.len(), 0);
        assert_eq!(ks.stats().expired_lazy, 1);

        ks.set_with_ttl("gone", "v", Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ks.del(["gone"]), 0);
        assert_eq!(ks.ttl("gone"), -2);
    }

    #[test]
    fn test_incr_decr() {
        let mut ks = keyspace();

        assert_eq!(ks.incr("up").unwrap(), 1);
        assert_eq!(ks.decr("down").unwrap(), -1);

        ks.set("num", "10");
        assert_eq!(ks.incr("num").unwrap(), 11);
        assert_eq!(ks.incr("num").unwrap(), 12);
        assert_eq!(ks.get("num").unwrap(), Some("12".to_string()));

        assert_eq!(ks.incr_by("num", 8).unwrap(), 20);
        assert_eq!(ks.decr_by("num", 25).unwrap(), -5);
    }

    #[test]
    fn test_incr_errors() {
        let mut ks = keyspace();

        ks.set("text", "hello");
        assert_eq!(ks.incr("text"), Err(StoreError::NotAnInteger));
        assert_eq!(ks.get("text").unwrap(), Some("hello".to_string()));

        ks.set("max", i64::MAX.to_string());
        assert_eq!(ks.incr("max"), Err(StoreError::IntegerOverflow));
        assert_eq!(ks.decr_by("max", i64::MIN), Err(StoreError::IntegerOverflow));

        ks.sadd("set", ["m"]).unwrap();
        assert!(ks.incr("set").unwrap_err().is_wrong_type());
    }

    #[test]
    fn test_incr_keeps_expiry() {
        let mut ks = keyspace();

        ks.set_with_ttl("counter", "1", Duration::from_secs(100));
        ks.incr("counter").unwrap();
        assert!(ks.ttl("counter") > 0);
    }

    #[test]
    fn test_keys_pattern() {
        let mut ks = keyspace();

        ks.set("abc", "1");
        ks.set("a", "2");
        ks.set("bac", "3");
        ks.set("xabc", "4");

        let mut matched = ks.keys("a*");
        matched.sort();
        assert_eq!(matched, strings(&["a", "abc"]));

        assert_eq!(ks.keys("*").len(), 4);
        assert_eq!(ks.keys("?ac"), strings(&["bac"]));
    }

    #[test]
    fn test_keys_evicts_expired() {
        let mut ks = keyspace();

        ks.set_with_ttl("temp", "v", Duration::from_millis(10));
        ks.set("keep", "v");
        thread::sleep(Duration::from_millis(30));

        assert_eq!(ks.keys("*"), strings(&["keep"]));
        assert_eq!(ks.len(), 1);
        assert_eq!(ks.stats().expired_swept, 1);
    }

    #[test]
    fn test_mset_mget() {
        let mut ks = keyspace();

        ks.mset([("k1", "v1"), ("k2", "v2")]);
        ks.rpush("list", ["x"]).unwrap();
        assert_eq!(
            ks.mget(["k1", "k2", "k3", "list"]),
            vec![Some("v1".to_string()), Some("v2".to_string()), None, None]
        );
    }

    #[test]
    fn test_key_type() {
        let mut ks = keyspace();

        ks.set("s", "v");
        ks.rpush("l", ["v"]).unwrap();
        ks.hset("h", "f", "v").unwrap();
        ks.sadd("z", ["v"]).unwrap();

        assert_eq!(ks.key_type("s").unwrap(), KeyType::String);
        assert_eq!(ks.key_type("l").unwrap(), KeyType::List);
        assert_eq!(ks.key_type("h").unwrap(), KeyType::Hash);
        assert_eq!(ks.key_type("z").unwrap(), KeyType::Set);
        assert_eq!(ks.key_type("none").unwrap(), KeyType::None);
    }

    #[test]
    fn test_dump_reflects_contents() {
        let mut ks = keyspace();

        ks.hset("h", "f", "v").unwrap();
        let dump = ks.dump("h").unwrap();
        assert_eq!(dump.key_type, KeyType::Hash);
        assert_eq!(dump.ttl, -1);
        let expected: HashMap<String, String> =
            [("f".to_string(), "v".to_string())].into_iter().collect();
        assert_eq!(dump.value, Some(ValueData::Hash(expected)));

        ks.lpush("l", ["a", "b"]).unwrap();
        ks.expire("l", 60);
        let dump = ks.dump("l").unwrap();
        assert_eq!(dump.key_type, KeyType::List);
        assert!(dump.ttl > 0 && dump.ttl <= 60);
        assert_eq!(
            dump.value,
            Some(ValueData::List(strings(&["b", "a"]).into()))
        );

        let missing = ks.dump("nope").unwrap();
        assert_eq!(
            missing,
            KeyDump {
                key_type: KeyType::None,
                ttl: -2,
                value: None,
            }
        );
    }

    #[test]
    fn test_snapshot() {
        let mut ks = keyspace();

        ks.set("user:1", "a");
        ks.sadd("user:2", ["x"]).unwrap();
        ks.expire("user:2", 30);
        ks.set("other", "b");

        let snapshot = ks.snapshot("user:*").unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot["user:1"],
            KeyMeta {
                key_type: KeyType::String,
                ttl: -1,
            }
        );
        assert_eq!(snapshot["user:2"].key_type, KeyType::Set);
        assert!(snapshot["user:2"].ttl > 0);
    }

    #[test]
    fn test_expire_ttl_persist() {
        let mut ks = keyspace();

        assert_eq!(ks.ttl("missing"), -2);
        assert!(!ks.expire("missing", 10));
        assert!(!ks.persist("missing"));

        ks.set("key", "value");
        assert_eq!(ks.ttl("key"), -1);
        assert!(!ks.persist("key"));

        assert!(ks.expire("key", 60));
        let ttl = ks.ttl("key");
        assert!(ttl > 0 && ttl <= 60);
        let pttl = ks.pttl("key");
        assert!(pttl > 0 && pttl <= 60_000);

        assert!(ks.persist("key"));
        assert_eq!(ks.ttl("key"), -1);
        assert_eq!(ks.pttl("key"), -1);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let mut ks = keyspace();

        ks.set("key", "value");
        assert!(ks.expire("key", 10));
        assert!(ks.expire("key", i64::MAX));
        assert!(ks.ttl("key") > 10);
        assert!(ks.pttl("key") > 10_000);

        assert!(ks.pexpire("key", i64::MAX));
        assert!(ks.ttl("key") > 0);

        ks.set_with_ttl("other", "value", Duration::MAX);
        assert!(ks.ttl("other") > 0);
        assert_eq!(ks.get("other").unwrap(), Some("value".to_string()));
    }

    #[test]
    fn test_expire_zero_evicts() {
        let mut ks = keyspace();

        ks.set("key", "value");
        assert!(ks.expire("key", 0));
        assert_eq!(ks.get("key").unwrap(), None);
        assert_eq!(ks.ttl("key"), -2);

        ks.set("neg", "value");
        assert!(ks.expire("neg", -5));
        assert!(!ks.key_exists("neg"));
    }

    #[test]
    fn test_ttl_rounds_up() {
        let mut ks = keyspace();

        ks.set("key", "value");
        assert!(ks.pexpire("key", 1500));
        assert_eq!(ks.ttl("key"), 2);

        assert!(ks.pexpire("key", 200));
        assert_eq!(ks.ttl("key"), 1);
    }

    #[test]
    fn test_remove_expired() {
        let mut ks = keyspace();

        ks.set_with_ttl("key1", "value1", Duration::from_millis(10));
        ks.set_with_ttl("key2", "value2", Duration::from_millis(10));
        ks.set("key3", "value3");

        let removed = ks.remove_expired(Instant::now() + Duration::from_millis(50));
        assert_eq!(removed, 2);
        assert_eq!(ks.len(), 1);
        assert!(ks.key_exists("key3"));
        assert_eq!(ks.stats().pool.in_use, 1);
    }

    #[test]
    fn test_flush_releases_values() {
        let mut ks = Keyspace::new(2);

        ks.set("a", "1");
        ks.set("b", "2");
        ks.set("c", "3");
        assert_eq!(ks.stats().pool.in_use, 2);
        assert_eq!(ks.stats().pool.overflow, 1);

        ks.flush();
        assert!(ks.is_empty());
        assert_eq!(ks.stats().pool.in_use, 0);
        assert_eq!(ks.stats().pool.overflow, 0);
    }

    #[test]
    fn test_overflow_values_behave_like_pooled() {
        let mut ks = Keyspace::new(0);

        ks.rpush("l", ["a", "b", "c"]).unwrap();
        ks.lrem("l", 1, "b").unwrap();
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), strings(&["a", "c"]));
        assert_eq!(ks.del(["l"]), 1);
        assert_eq!(ks.stats().pool.overflow, 0);
    }

    // ========================================================================
    // Hash Command Tests
    // ========================================================================

    #[test]
    fn test_hset_hget() {
        let mut ks = keyspace();

        assert!(ks.hset("h", "f", "1").unwrap());
        assert!(!ks.hset("h", "f", "2").unwrap());
        assert_eq!(ks.hget("h", "f").unwrap(), Some("2".to_string()));
        assert_eq!(ks.hget("h", "nope").unwrap(), None);
        assert_eq!(ks.hget("nope", "f").unwrap(), None);
        assert_eq!(ks.hget_or("h", "nope", "dflt").unwrap(), "dflt");
        assert_eq!(ks.hget_or("h", "f", "dflt").unwrap(), "2");
    }

    #[test]
    fn test_hset_wrong_type() {
        let mut ks = keyspace();

        ks.set("s", "v");
        assert!(ks.hset("s", "f", "v").unwrap_err().is_wrong_type());
        assert_eq!(ks.get("s").unwrap(), Some("v".to_string()));
        assert!(ks.hget("s", "f").unwrap_err().is_wrong_type());
        assert!(ks.hlen("s").unwrap_err().is_wrong_type());
    }

    #[test]
    fn test_hash_views() {
        let mut ks = keyspace();

        ks.hset("h", "a", "1").unwrap();
        ks.hset("h", "b", "2").unwrap();

        let mut keys = ks.hkeys("h").unwrap();
        keys.sort();
        assert_eq!(keys, strings(&["a", "b"]));

        let mut vals = ks.hvals("h").unwrap();
        vals.sort();
        assert_eq!(vals, strings(&["1", "2"]));

        assert_eq!(ks.hlen("h").unwrap(), 2);
        assert_eq!(ks.hgetall("h").unwrap().get("b"), Some(&"2".to_string()));
        assert!(ks.hexists("h", "a").unwrap());
        assert!(!ks.hexists("h", "z").unwrap());
        assert!(ks.hgetall("missing").unwrap().is_empty());
    }

    #[test]
    fn test_hdel() {
        let mut ks = keyspace();

        ks.hset("h", "a", "1").unwrap();
        ks.hset("h", "b", "2").unwrap();
        ks.hset("h", "c", "3").unwrap();

        assert_eq!(ks.hdel("h", ["a"]).unwrap(), 1);
        assert_eq!(ks.hdel("h", ["b", "c", "zz"]).unwrap(), 2);
        assert_eq!(ks.hdel("missing", ["a"]).unwrap(), 0);

        // Emptied containers keep their key
        assert_eq!(ks.key_type("h").unwrap(), KeyType::Hash);
        assert_eq!(ks.hlen("h").unwrap(), 0);
    }

    // ========================================================================
    // List Command Tests
    // ========================================================================

    #[test]
    fn test_lpush_rpush() {
        let mut ks = keyspace();

        assert_eq!(ks.lpush("l", ["a", "b", "c"]).unwrap(), 3);
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), strings(&["c", "b", "a"]));

        assert_eq!(ks.rpush("r", ["a", "b", "c"]).unwrap(), 3);
        assert_eq!(ks.lrange("r", 0, -1).unwrap(), strings(&["a", "b", "c"]));

        // Single values and existing lists
        assert_eq!(ks.lpush("r", ["z"]).unwrap(), 4);
        assert_eq!(ks.rpush("r", std::iter::once("end")).unwrap(), 5);
        assert_eq!(
            ks.lrange("r", 0, -1).unwrap(),
            strings(&["z", "a", "b", "c", "end"])
        );
    }

    #[test]
    fn test_push_wrong_type() {
        let mut ks = keyspace();

        ks.sadd("s", ["m"]).unwrap();
        assert!(ks.lpush("s", ["x"]).unwrap_err().is_wrong_type());
        assert!(ks.rpush("s", ["x"]).unwrap_err().is_wrong_type());
        assert!(ks.lrange("s", 0, -1).unwrap_err().is_wrong_type());
        assert!(ks.lrem("s", 0, "m").unwrap_err().is_wrong_type());
        assert_eq!(ks.scard("s").unwrap(), 1);
    }

    #[test]
    fn test_lpop_rpop() {
        let mut ks = keyspace();

        assert_eq!(ks.lpop("l").unwrap(), None);
        assert_eq!(ks.rpop("l").unwrap(), None);

        ks.rpush("l", ["a", "b", "c"]).unwrap();
        assert_eq!(ks.lpop("l").unwrap(), Some("a".to_string()));
        assert_eq!(ks.rpop("l").unwrap(), Some("c".to_string()));
        assert_eq!(ks.llen("l").unwrap(), 1);
        assert_eq!(ks.lpop("l").unwrap(), Some("b".to_string()));
        assert_eq!(ks.lpop("l").unwrap(), None);

        // The emptied list is still a list
        assert_eq!(ks.key_type("l").unwrap(), KeyType::List);
    }

    #[test]
    fn test_lindex() {
        let mut ks = keyspace();

        ks.rpush("l", ["a", "b", "c"]).unwrap();
        assert_eq!(ks.lindex("l", 0).unwrap(), Some("a".to_string()));
        assert_eq!(ks.lindex("l", -1).unwrap(), Some("c".to_string()));
        assert_eq!(ks.lindex("l", -3).unwrap(), Some("a".to_string()));
        assert_eq!(ks.lindex("l", 3).unwrap(), None);
        assert_eq!(ks.lindex("l", -4).unwrap(), None);
        assert_eq!(ks.lindex("missing", 0).unwrap(), None);
    }

    #[test]
    fn test_lrange() {
        let mut ks = keyspace();

        ks.rpush("l", ["a", "b", "c", "d", "e"]).unwrap();

        assert_eq!(ks.lrange("l", 1, 3).unwrap(), strings(&["b", "c", "d"]));
        assert_eq!(ks.lrange("l", -3, -1).unwrap(), strings(&["c", "d", "e"]));
        assert_eq!(ks.lrange("l", 0, 100).unwrap().len(), 5);
        assert_eq!(ks.lrange("l", -100, 1).unwrap(), strings(&["a", "b"]));
        assert!(ks.lrange("l", 3, 1).unwrap().is_empty());
        assert!(ks.lrange("l", 5, 10).unwrap().is_empty());
        assert!(ks.lrange("l", 0, -6).unwrap().is_empty());
        assert!(ks.lrange("missing", 0, -1).unwrap().is_empty());
        assert_eq!(
            ks.lrange("l", i64::MIN, i64::MAX).unwrap().len(),
            5
        );
    }

    #[test]
    fn test_lset() {
        let mut ks = keyspace();

        ks.rpush("l", ["a", "b", "c"]).unwrap();
        assert!(ks.lset("l", 1, "B").unwrap());
        assert!(ks.lset("l", -1, "C").unwrap());
        assert!(!ks.lset("l", 10, "X").unwrap());
        assert!(!ks.lset("l", -4, "X").unwrap());
        assert!(!ks.lset("missing", 0, "X").unwrap());
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), strings(&["a", "B", "C"]));
    }

    #[test]
    fn test_lrem() {
        let mut ks = keyspace();

        ks.rpush("l", ["a", "b", "a", "c", "a", "d"]).unwrap();
        assert_eq!(ks.lrem("l", 2, "a").unwrap(), 2);
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), strings(&["b", "c", "a", "d"]));

        ks.del(["l"]);
        ks.rpush("l", ["x", "b", "x", "c", "x"]).unwrap();
        assert_eq!(ks.lrem("l", -1, "x").unwrap(), 1);
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), strings(&["x", "b", "x", "c"]));
        assert_eq!(ks.lrem("l", -5, "x").unwrap(), 2);
        assert_eq!(ks.lrange("l", 0, -1).unwrap(), strings(&["b", "c"]));

        ks.del(["l"]);
        ks.rpush("l", ["a", "a", "a"]).unwrap();
        assert_eq!(ks.lrem("l", 0, "a").unwrap(), 3);
        assert_eq!(ks.lrem("l", 0, "a").unwrap(), 0);
        assert_eq!(ks.lrem("missing", 0, "a").unwrap(), 0);
    }

    // ========================================================================
    // Set Command Tests
    // ========================================================================

    #[test]
    fn test_sadd_srem() {
        let mut ks = keyspace();

        assert_eq!(ks.sadd("s", ["a", "b", "a"]).unwrap(), 2);
        assert_eq!(ks.sadd("s", ["a"]).unwrap(), 0);
        assert_eq!(ks.scard("s").unwrap(), 2);

        assert_eq!(ks.srem("s", ["a", "zz"]).unwrap(), 1);
        assert_eq!(ks.srem("s", ["a"]).unwrap(), 0);
        assert_eq!(ks.srem("missing", ["a"]).unwrap(), 0);

        assert!(ks.sismember("s", "b").unwrap());
        assert!(!ks.sismember("s", "a").unwrap());
        let expected: HashSet<String> = ["b".to_string()].into_iter().collect();
        assert_eq!(ks.smembers("s").unwrap(), expected);
    }

    #[test]
    fn test_spop() {
        let mut ks = keyspace();

        assert_eq!(ks.spop("s").unwrap(), None);

        ks.sadd("s", ["a", "b"]).unwrap();
        let popped = ks.spop("s").unwrap().unwrap();
        assert!(popped == "a" || popped == "b");
        assert!(!ks.sismember("s", &popped).unwrap());
        assert_eq!(ks.scard("s").unwrap(), 1);
    }

    #[test]
    fn test_smove() {
        let mut ks = keyspace();

        ks.sadd("src", ["a", "b"]).unwrap();

        assert!(ks.smove("src", "dst", "a").unwrap());
        assert!(!ks.sismember("src", "a").unwrap());
        assert!(ks.sismember("dst", "a").unwrap());

        assert!(!ks.smove("src", "dst", "zz").unwrap());
        assert!(!ks.smove("missing", "dst", "a").unwrap());

        assert!(ks.smove("src", "src", "b").unwrap());
        assert!(ks.sismember("src", "b").unwrap());
    }

    #[test]
    fn test_smove_wrong_type_leaves_source() {
        let mut ks = keyspace();

        ks.sadd("src", ["a"]).unwrap();
        ks.set("dst", "string");

        assert!(ks.smove("src", "dst", "a").unwrap_err().is_wrong_type());
        assert!(ks.sismember("src", "a").unwrap());
        assert_eq!(ks.get("dst").unwrap(), Some("string".to_string()));

        ks.set("bad", "string");
        assert!(ks.smove("bad", "src", "a").unwrap_err().is_wrong_type());
    }

    #[test]
    fn test_clamp_range() {
        assert_eq!(clamp_range(0, -1, 3), Some((0, 3)));
        assert_eq!(clamp_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(clamp_range(2, 1, 3), None);
        assert_eq!(clamp_range(0, -1, 0), None);
        assert_eq!(resolve_index(-1, 0), None);
        assert_eq!(resolve_index(-1, 2), Some(1));
    }
}
