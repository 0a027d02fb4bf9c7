//! Publish/Subscribe Registry Module
//!
//! Bookkeeping for channel and pattern subscriptions. The registry only
//! answers the question "who should hear about a message on this channel";
//! delivering the message is the host's job.
//!
//! ## Example
//!
//! ```
//! use keystash::pubsub::{PubSubRegistry, SubscriberId};
//!
//! let mut registry = PubSubRegistry::new();
//! let alice = SubscriberId::from_raw(1);
//! let bob = SubscriberId::from_raw(2);
//!
//! registry.subscribe("news", alice);
//! registry.psubscribe("n*", bob);
//!
//! let deliveries = registry.resolve("news");
//! assert_eq!(deliveries.len(), 2);
//! ```

pub mod registry;

pub use registry::{Delivery, PubSubRegistry, SubscriberId};
