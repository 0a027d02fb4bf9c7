//! Stored Values
//!
//! A [`Value`] is one of four payload kinds plus an optional expiry deadline.
//! The kind is fixed when the value is created; the typed accessors return
//! [`StoreError::WrongType`] instead of reinterpreting a payload of another kind.

use crate::error::{StoreError, StoreResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

/// The kind of payload a value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    List,
    Hash,
    Set,
}

impl ValueKind {
    /// Returns the upper-case name reported by `TYPE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "STRING",
            ValueKind::List => "LIST",
            ValueKind::Hash => "HASH",
            ValueKind::Set => "SET",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `TYPE` reports for a key: a value kind, or `NONE` when the key is
/// missing or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    String,
    List,
    Hash,
    Set,
    None,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "STRING",
            KeyType::List => "LIST",
            KeyType::Hash => "HASH",
            KeyType::Set => "SET",
            KeyType::None => "NONE",
        }
    }
}

impl From<ValueKind> for KeyType {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::String => KeyType::String,
            ValueKind::List => KeyType::List,
            ValueKind::Hash => KeyType::Hash,
            ValueKind::Set => KeyType::Set,
        }
    }
}

impl From<Option<ValueKind>> for KeyType {
    fn from(kind: Option<ValueKind>) -> Self {
        kind.map(KeyType::from).unwrap_or(KeyType::None)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    Str(String),
    /// Deque for O(1) push/pop on both ends
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

impl ValueData {
    /// Creates an empty payload of the given kind (an empty string for
    /// [`ValueKind::String`]).
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::String => ValueData::Str(String::new()),
            ValueKind::List => ValueData::List(VecDeque::new()),
            ValueKind::Hash => ValueData::Hash(HashMap::new()),
            ValueKind::Set => ValueData::Set(HashSet::new()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ValueData::Str(_) => ValueKind::String,
            ValueData::List(_) => ValueKind::List,
            ValueData::Hash(_) => ValueKind::Hash,
            ValueData::Set(_) => ValueKind::Set,
        }
    }
}

/// A stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    data: ValueData,
    /// When this value expires (None = never expires)
    expires_at: Option<Instant>,
}

impl Value {
    /// Creates a value that never expires.
    pub fn new(data: ValueData) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.data.kind()
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    pub fn into_data(self) -> ValueData {
        self.data
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn set_expires_at(&mut self, deadline: Option<Instant>) {
        self.expires_at = deadline;
    }

    /// Checks if this value has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Remaining time to live as of `now`, or None if no expiry is set.
    pub fn ttl_at(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|exp| exp.saturating_duration_since(now))
    }

    fn mismatch(&self, expected: ValueKind) -> StoreError {
        StoreError::WrongType {
            expected,
            actual: self.kind(),
        }
    }

    pub fn as_str(&self) -> StoreResult<&str> {
        match &self.data {
            ValueData::Str(s) => Ok(s),
            _ => Err(self.mismatch(ValueKind::String)),
        }
    }

    pub fn as_str_mut(&mut self) -> StoreResult<&mut String> {
        let actual = self.kind();
        match &mut self.data {
            ValueData::Str(s) => Ok(s),
            _ => Err(StoreError::WrongType {
                expected: ValueKind::String,
                actual,
            }),
        }
    }

    pub fn as_list(&self) -> StoreResult<&VecDeque<String>> {
        match &self.data {
            ValueData::List(list) => Ok(list),
            _ => Err(self.mismatch(ValueKind::List)),
        }
    }

    pub fn as_list_mut(&mut self) -> StoreResult<&mut VecDeque<String>> {
        let actual = self.kind();
        match &mut self.data {
            ValueData::List(list) => Ok(list),
            _ => Err(StoreError::WrongType {
                expected: ValueKind::List,
                actual,
            }),
        }
    }

    pub fn as_hash(&self) -> StoreResult<&HashMap<String, String>> {
        match &self.data {
            ValueData::Hash(hash) => Ok(hash),
            _ => Err(self.mismatch(ValueKind::Hash)),
        }
    }

    pub fn as_hash_mut(&mut self) -> StoreResult<&mut HashMap<String, String>> {
        let actual = self.kind();
        match &mut self.data {
            ValueData::Hash(hash) => Ok(hash),
            _ => Err(StoreError::WrongType {
                expected: ValueKind::Hash,
                actual,
            }),
        }
    }

    pub fn as_set(&self) -> StoreResult<&HashSet<String>> {
        match &self.data {
            ValueData::Set(set) => Ok(set),
            _ => Err(self.mismatch(ValueKind::Set)),
        }
    }

    pub fn as_set_mut(&mut self) -> StoreResult<&mut HashSet<String>> {
        let actual = self.kind();
        match &mut self.data {
            ValueData::Set(set) => Ok(set),
            _ => Err(StoreError::WrongType {
                expected: ValueKind::Set,
                actual,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_value_never_expires() {
        let value = Value::new(ValueData::Str("v".to_string()));
        assert_eq!(value.kind(), ValueKind::String);
        assert!(value.expires_at().is_none());
        assert!(!value.is_expired_at(Instant::now()));
        assert_eq!(value.ttl_at(Instant::now()), None);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let mut value = Value::new(ValueData::empty(ValueKind::Set));
        value.set_expires_at(Some(now + Duration::from_secs(5)));

        assert!(!value.is_expired_at(now));
        assert!(value.is_expired_at(now + Duration::from_secs(5)));
        assert_eq!(value.ttl_at(now), Some(Duration::from_secs(5)));
        assert_eq!(
            value.ttl_at(now + Duration::from_secs(10)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_typed_accessors() {
        let mut value = Value::new(ValueData::empty(ValueKind::List));
        value.as_list_mut().unwrap().push_back("a".to_string());
        assert_eq!(value.as_list().unwrap().len(), 1);

        let err = value.as_hash().unwrap_err();
        assert_eq!(
            err,
            StoreError::WrongType {
                expected: ValueKind::Hash,
                actual: ValueKind::List,
            }
        );
        assert!(value.as_str().is_err());
        assert!(value.as_set_mut().is_err());
    }

    #[test]
    fn test_key_type_names() {
        assert_eq!(KeyType::from(Some(ValueKind::Hash)).to_string(), "HASH");
        assert_eq!(KeyType::from(None).to_string(), "NONE");
        assert_eq!(ValueKind::String.to_string(), "STRING");
    }
}
