//! Storage Engine Module
//!
//! This module provides the core storage functionality for keystash:
//! the value model, the value pool, the single-threaded keyspace, the
//! locked engine wrapper, and the background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────┐
//!   │ StorageEngine (one parking_lot::Mutex)    │
//!   │   ┌─────────────────────────────────────┐ │
//!   │   │ Keyspace                            │ │
//!   │   │   HashMap<String, ValueHandle>      │ │
//!   │   │   ValuePool (slots + overflow)      │ │
//!   │   └─────────────────────────────────────┘ │
//!   └───────────────────────────────────────────┘
//!                        ▲
//!                        │
//!          ┌─────────────┴─────────────┐
//!          │       ExpirySweeper       │
//!          │  (background std thread)  │
//!          └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Typed values**: strings, lists, hashes and sets, fixed per key
//! - **Pooled allocation**: generation-checked slots with heap overflow
//! - **Lazy expiry**: expired keys are evicted on every access
//! - **Active expiry**: the sweeper evicts keys nobody touches
//!
//! ## Example
//!
//! ```
//! use keystash::storage::{start_expiry_sweeper, StorageEngine};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let engine = Arc::new(StorageEngine::new());
//! let sweeper = start_expiry_sweeper(Arc::clone(&engine));
//!
//! engine.set("name", "Ariz");
//! assert_eq!(engine.get("name").unwrap(), Some("Ariz".to_string()));
//!
//! engine.set_with_ttl("session", "token123", Duration::from_secs(3600));
//! drop(sweeper);
//! ```

pub mod engine;
pub mod expiry;
pub mod keyspace;
pub mod pool;
pub mod value;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageStats};
pub use expiry::{start_expiry_sweeper, ExpirySweeper};
pub use keyspace::{KeyDump, KeyMeta, Keyspace, KeyspaceStats};
pub use pool::{PoolError, PoolStats, SlotHandle, ValueHandle, ValuePool};
pub use value::{KeyType, Value, ValueData, ValueKind};
