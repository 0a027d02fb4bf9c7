//! Shell Command Layer
//!
//! Maps command names (case-insensitive) to [`StorageEngine`] operations and
//! turns their results into [`Reply`] values. Argument counts and integer
//! arguments are validated here; type errors come back from the engine.
//!
//! Pub/sub commands register the handler's own subscriber id. Messages that
//! `PUBLISH` routes to a handler wait in its inbox until the host drains them
//! with [`CommandHandler::drain_messages`].
//!
//! ```
//! use keystash::commands::CommandHandler;
//! use keystash::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
//! let reply = handler.execute(vec!["RPUSH".into(), "jobs".into(), "a".into()]);
//! assert_eq!(reply.as_integer(), Some(1));
//! ```
//!
//! [`StorageEngine`]: crate::storage::StorageEngine
//! [`Reply`]: crate::protocol::Reply

pub mod handler;

pub use handler::{CommandHandler, Message};
