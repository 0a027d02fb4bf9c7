//! Channel and pattern subscription tables.
//!
//! Subscribers are opaque [`SubscriberId`]s. The registry never owns or
//! outlives anything behind an id; the host must unsubscribe an id before
//! the entity it names goes away.
//!
//! Duplicate registrations are kept. Each `unsubscribe` call removes one of
//! them, the earliest first.

use crate::pattern::GlobPattern;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Opaque identity of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// One subscriber to notify for a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub subscriber: SubscriberId,
    /// The pattern that matched, or None for an exact channel subscription
    pub pattern: Option<String>,
}

#[derive(Debug)]
struct PatternSubscription {
    matcher: GlobPattern,
    subscribers: Vec<SubscriberId>,
}

/// Channel → subscribers and pattern → subscribers tables.
#[derive(Debug, Default)]
pub struct PubSubRegistry {
    channels: HashMap<String, Vec<SubscriberId>>,
    patterns: HashMap<String, PatternSubscription>,
}

/// Removes the earliest occurrence of `subscriber`. Returns true if found.
fn remove_first(subscribers: &mut Vec<SubscriberId>, subscriber: SubscriberId) -> bool {
    match subscribers.iter().position(|s| *s == subscriber) {
        Some(pos) => {
            subscribers.remove(pos);
            true
        }
        None => false,
    }
}

impl PubSubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber` on an exact channel.
    pub fn subscribe(&mut self, channel: &str, subscriber: SubscriberId) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(subscriber);
        trace!(channel, %subscriber, "Subscribed");
    }

    /// Removes one registration of `subscriber` from `channel`.
    ///
    /// Returns false if the subscriber was not registered there.
    pub fn unsubscribe(&mut self, channel: &str, subscriber: SubscriberId) -> bool {
        let Some(subscribers) = self.channels.get_mut(channel) else {
            return false;
        };

        let removed = remove_first(subscribers, subscriber);
        if subscribers.is_empty() {
            self.channels.remove(channel);
        }
        removed
    }

    /// Registers `subscriber` on a glob pattern.
    pub fn psubscribe(&mut self, pattern: &str, subscriber: SubscriberId) {
        self.patterns
            .entry(pattern.to_string())
            .or_insert_with(|| PatternSubscription {
                matcher: GlobPattern::new(pattern),
                subscribers: Vec::new(),
            })
            .subscribers
            .push(subscriber);
        trace!(pattern, %subscriber, "Pattern subscribed");
    }

    /// Removes one registration of `subscriber` from `pattern`.
    pub fn punsubscribe(&mut self, pattern: &str, subscriber: SubscriberId) -> bool {
        let Some(entry) = self.patterns.get_mut(pattern) else {
            return false;
        };

        let removed = remove_first(&mut entry.subscribers, subscriber);
        if entry.subscribers.is_empty() {
            self.patterns.remove(pattern);
        }
        removed
    }

    /// Exact-channel subscribers in registration order.
    pub fn get_subscribers(&self, channel: &str) -> Vec<SubscriberId> {
        self.channels.get(channel).cloned().unwrap_or_default()
    }

    /// Every pattern with its subscribers in registration order.
    pub fn get_all_pattern_subscriptions(&self) -> HashMap<String, Vec<SubscriberId>> {
        self.patterns
            .iter()
            .map(|(pattern, entry)| (pattern.clone(), entry.subscribers.clone()))
            .collect()
    }

    /// Everyone who should receive a message published on `channel`.
    ///
    /// Exact subscribers come first, followed by pattern subscribers. A
    /// subscriber registered several times (or through several patterns)
    /// appears once per registration.
    pub fn resolve(&self, channel: &str) -> Vec<Delivery> {
        let mut deliveries: Vec<Delivery> = self
            .channels
            .get(channel)
            .into_iter()
            .flatten()
            .map(|&subscriber| Delivery {
                subscriber,
                pattern: None,
            })
            .collect();

        for (pattern, entry) in &self.patterns {
            if entry.matcher.matches(channel) {
                deliveries.extend(entry.subscribers.iter().map(|&subscriber| Delivery {
                    subscriber,
                    pattern: Some(pattern.clone()),
                }));
            }
        }

        deliveries
    }

    /// Number of channels with at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of patterns with at least one subscriber.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Drops every registration of `subscriber`, on channels and patterns.
    ///
    /// Returns how many registrations were removed.
    pub fn remove_subscriber(&mut self, subscriber: SubscriberId) -> usize {
        let mut removed = 0;

        self.channels.retain(|_, subscribers| {
            let before = subscribers.len();
            subscribers.retain(|s| *s != subscriber);
            removed += before - subscribers.len();
            !subscribers.is_empty()
        });
        self.patterns.retain(|_, entry| {
            let before = entry.subscribers.len();
            entry.subscribers.retain(|s| *s != subscriber);
            removed += before - entry.subscribers.len();
            !entry.subscribers.is_empty()
        });

        removed
    }
}
