// src/registry.rs

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{error::Result, topic::Topic};

/// Name → topic map shared by every agent, graph builder and query of one graph.
///
/// This is a plain value, not a process-wide singleton: construct one per
/// independent graph and hand it around as `Arc<TopicRegistry>`.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
}

impl TopicRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get-or-create. Concurrent callers always get the same instance for a name.
    pub fn topic(&self, name: &str) -> Result<Arc<Topic>> {
        if let Some(topic) = self.topics.read().get(name) {
            return Ok(topic.clone());
        }

        let mut topics = self.topics.write();
        // Another writer may have won the race between the two locks.
        if let Some(topic) = topics.get(name) {
            return Ok(topic.clone());
        }
        let topic = Arc::new(Topic::new(name)?);
        topics.insert(name.to_string(), topic.clone());
        debug!(topic = %name, "created topic");
        Ok(topic)
    }

    /// Lookup without creating.
    pub fn find(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.read().get(name).cloned()
    }

    /// Snapshot of every registered topic, sorted by name.
    pub fn topics(&self) -> Vec<Arc<Topic>> {
        let mut topics: Vec<Arc<Topic>> = self.topics.read().values().cloned().collect();
        topics.sort_by(|a, b| a.name().cmp(b.name()));
        topics
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }

    /// Drop every topic in one step.
    ///
    /// Agents are not closed. Anything still holding an old `Topic` keeps a
    /// detached instance; the next `topic(name)` creates a fresh, empty one.
    pub fn clear(&self) {
        let dropped = {
            let mut topics = self.topics.write();
            let n = topics.len();
            topics.clear();
            n
        };
        info!(dropped, "cleared topic registry");
    }
}
