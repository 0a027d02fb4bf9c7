//! # keystash - An Embeddable Multi-Type Key-Value Store
//!
//! keystash is an in-process, Redis-like data engine. A host process issues
//! commands synchronously; a background thread evicts expired keys without
//! stalling foreground access.
//!
//! ## Features
//!
//! - **Typed values**: strings, lists, hashes and sets, with per-key type safety
//! - **TTL Support**: keys can expire, checked on every access and swept periodically
//! - **Pooled allocation**: value slots are reused through a generation-checked pool
//! - **Glob patterns**: shared by key scans and pattern subscriptions
//! - **Pub/Sub routing**: the store tells the host who to notify; the host delivers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            keystash                              │
//! │                                                                  │
//! │   host code / shell ──> CommandHandler ──> StorageEngine         │
//! │                                             │ one Mutex          │
//! │                          ┌──────────────────┴─────────────────┐  │
//! │                          │ Keyspace            PubSubRegistry │  │
//! │                          │  map + ValuePool      GlobPattern  │  │
//! │                          └──────────────────▲─────────────────┘  │
//! │                                             │                    │
//! │                                      ExpirySweeper thread        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use keystash::{start_expiry_sweeper, StorageEngine, SubscriberId};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let engine = Arc::new(StorageEngine::new());
//! let mut sweeper = start_expiry_sweeper(Arc::clone(&engine));
//!
//! engine.set("name", "Ariz");
//! engine.set_with_ttl("session", "token", Duration::from_secs(30));
//! engine.rpush("queue", ["job-1", "job-2"]).unwrap();
//! engine.hset("user:1", "email", "ariz@example.com").unwrap();
//!
//! let listener = SubscriberId::from_raw(7);
//! engine.psubscribe("jobs.*", listener);
//! let deliveries = engine.publish("jobs.done");
//! assert_eq!(deliveries[0].subscriber, listener);
//!
//! sweeper.stop();
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: value model, pool, keyspace, locked engine and sweeper
//! - [`pattern`]: glob to anchored regex translation
//! - [`pubsub`]: channel and pattern subscription registry
//! - [`protocol`]: shell line tokenizer and reply rendering
//! - [`commands`]: shell command dispatch over the engine
//! - [`config`], [`error`]: configuration and error types
//!
//! ## Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: every command compares the key's deadline with the current time
//! 2. **Active**: a background thread periodically evicts all expired keys
//!
//! Both paths run under the engine lock, so they never observe each other
//! half-way.

pub mod commands;
pub mod config;
pub mod error;
pub mod pattern;
pub mod protocol;
pub mod pubsub;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::{StoreConfig, DEFAULT_POOL_CAPACITY, DEFAULT_SWEEP_INTERVAL};
pub use error::{StoreError, StoreResult};
pub use pattern::GlobPattern;
pub use protocol::{parse_line, ParseError, Reply};
pub use pubsub::{Delivery, PubSubRegistry, SubscriberId};
pub use storage::{
    start_expiry_sweeper, ExpirySweeper, KeyType, Keyspace, StorageEngine, StorageStats,
    ValueData, ValueKind,
};

/// Version of keystash
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
