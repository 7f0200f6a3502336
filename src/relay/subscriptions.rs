/// Topic subscription set - the fixed list of topics subscribed on every
/// fresh upstream connection
use std::collections::HashSet;

use super::types::TopicSubscription;
use super::upstream::UpstreamLink;
use crate::config::TopicConfig;
use crate::logger::{self, LogTag};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicSubscriptionSet {
    subscriptions: Vec<TopicSubscription>,
}

impl TopicSubscriptionSet {
    /// Build the set; a repeated topic keeps its first message kind
    pub fn new(subscriptions: impl IntoIterator<Item = TopicSubscription>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();

        for subscription in subscriptions {
            if seen.insert(subscription.topic().to_string()) {
                unique.push(subscription);
            } else {
                logger::warning(
                    LogTag::Relay,
                    &format!("Duplicate topic {} ignored", subscription),
                );
            }
        }

        Self {
            subscriptions: unique,
        }
    }

    pub fn from_config(topics: &[TopicConfig]) -> Self {
        Self::new(topics.iter().map(TopicSubscription::from))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicSubscription> {
        self.subscriptions.iter()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Subscribe every topic on the link's current connection
    ///
    /// Returns how many subscriptions were accepted.
    pub fn apply(&self, link: &mut UpstreamLink) -> usize {
        let mut applied = 0;

        for subscription in &self.subscriptions {
            match link.subscribe(subscription) {
                Ok(()) => {
                    applied += 1;
                    logger::debug(
                        LogTag::Relay,
                        &format!(
                            "Subscribed to {} on connection #{}",
                            subscription,
                            link.generation()
                        ),
                    );
                }
                Err(e) => {
                    logger::error(
                        LogTag::Relay,
                        &format!("Failed to subscribe to {}: {}", subscription, e),
                    );
                }
            }
        }

        applied
    }
}
