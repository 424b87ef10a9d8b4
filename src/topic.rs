// src/topic.rs

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    agent::Agent,
    error::{EngineError, Result},
    message::Message,
};

/// A named channel: the last published message plus the agents wired to it.
///
/// Membership is keyed by agent name. Subscribing under a name that is already
/// present keeps the membership unchanged and rebinds delivery to the new handle;
/// the async decorator relies on this to take over its inner agent's slots.
/// Publishers are bookkeeping for graph edges only and never receive messages.
pub struct Topic {
    name: String,
    subscribers: DashMap<String, Arc<dyn Agent>>,
    publishers: DashMap<String, Arc<dyn Agent>>,
    last_message: RwLock<Option<Message>>,
    display_id: RwLock<Option<String>>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(EngineError::InvalidTopicName(name));
        }
        Ok(Self {
            name,
            subscribers: DashMap::new(),
            publishers: DashMap::new(),
            last_message: RwLock::new(None),
            display_id: RwLock::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        trace!(topic = %self.name, agent = %name, "subscribe");
        self.subscribers.insert(name, agent);
    }

    pub fn unsubscribe(&self, agent_name: &str) {
        if self.subscribers.remove(agent_name).is_some() {
            trace!(topic = %self.name, agent = %agent_name, "unsubscribe");
        }
    }

    pub fn add_publisher(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        trace!(topic = %self.name, agent = %name, "add publisher");
        self.publishers.insert(name, agent);
    }

    pub fn remove_publisher(&self, agent_name: &str) {
        if self.publishers.remove(agent_name).is_some() {
            trace!(topic = %self.name, agent = %agent_name, "remove publisher");
        }
    }

    /// Store `message` as the last message, then call every current subscriber
    /// on this thread.
    ///
    /// Delivery order across subscribers is unspecified. A subscriber that
    /// publishes to another topic recurses inside this call, and nothing here
    /// bounds that depth: a cyclic wiring recurses until the stack runs out,
    /// which is what the graph cycle check guards against.
    pub fn publish(&self, message: Message) {
        *self.last_message.write() = Some(message.clone());

        // Snapshot first so callbacks may (un)subscribe without holding a shard lock.
        let targets: Vec<Arc<dyn Agent>> = self
            .subscribers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        debug!(topic = %self.name, value = %message.text(), subscribers = targets.len(), "publish");

        for agent in targets {
            agent.callback(&self.name, &message);
        }
    }

    pub fn last_message(&self) -> Option<Message> {
        self.last_message.read().clone()
    }

    pub fn subscribers(&self) -> Vec<Arc<dyn Agent>> {
        self.subscribers.iter().map(|e| e.value().clone()).collect()
    }

    pub fn publishers(&self) -> Vec<Arc<dyn Agent>> {
        self.publishers.iter().map(|e| e.value().clone()).collect()
    }

    /// Subscriber names, sorted.
    pub fn subscriber_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subscribers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Publisher names, sorted.
    pub fn publisher_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.publishers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_subscribed(&self, agent_name: &str) -> bool {
        self.subscribers.contains_key(agent_name)
    }

    pub fn display_id(&self) -> Option<String> {
        self.display_id.read().clone()
    }

    /// Set by the graph builder, never by the topic itself.
    pub(crate) fn set_display_id(&self, id: String) {
        *self.display_id.write() = Some(id);
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_names())
            .field("publishers", &self.publisher_names())
            .field("last_message", &self.last_message.read().as_ref().map(|m| m.text().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records every callback it receives.
    struct Recorder {
        name: String,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl Recorder {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Agent for Recorder {
        fn name(&self) -> &str {
            &self.name
        }
        fn reset(&self) {
            self.seen.lock().clear();
        }
        fn callback(&self, topic: &str, msg: &Message) {
            self.seen.lock().push((topic.to_string(), msg.text().to_string()));
        }
        fn close(&self) {}
        fn inputs(&self) -> &[String] {
            &[]
        }
        fn outputs(&self) -> &[String] {
            &[]
        }
    }

    #[test]
    fn test_empty_name_is_rejected() {
        assert!(matches!(Topic::new(""), Err(EngineError::InvalidTopicName(_))));
        // Only the empty name is invalid; whitespace is a legal name.
        assert_eq!(Topic::new(" ").unwrap().name(), " ");
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let topic = Topic::new("A").unwrap();
        let rec = Recorder::new("r");
        topic.subscribe(rec.clone());
        topic.subscribe(rec.clone());
        assert_eq!(topic.subscriber_names(), vec!["r".to_string()]);

        topic.publish(Message::from_text("1"));
        assert_eq!(rec.seen.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_absent_is_noop() {
        let topic = Topic::new("A").unwrap();
        topic.unsubscribe("nobody");
        topic.remove_publisher("nobody");
        assert!(topic.subscriber_names().is_empty());
    }

    #[test]
    fn test_publish_without_subscribers_updates_last_message() {
        let topic = Topic::new("A").unwrap();
        assert!(topic.last_message().is_none());
        topic.publish(Message::from_text("hello"));
        assert_eq!(topic.last_message().unwrap().text(), "hello");
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let topic = Topic::new("A").unwrap();
        let first = Recorder::new("first");
        let second = Recorder::new("second");
        topic.subscribe(first.clone());
        topic.subscribe(second.clone());

        topic.publish(Message::from_text("9"));

        assert_eq!(*first.seen.lock(), vec![("A".to_string(), "9".to_string())]);
        assert_eq!(*second.seen.lock(), vec![("A".to_string(), "9".to_string())]);
    }

    #[test]
    fn test_publishers_do_not_receive_messages() {
        let topic = Topic::new("A").unwrap();
        let rec = Recorder::new("p");
        topic.add_publisher(rec.clone());
        topic.publish(Message::from_text("1"));
        assert!(rec.seen.lock().is_empty());
        assert_eq!(topic.publisher_names(), vec!["p".to_string()]);

        topic.remove_publisher("p");
        assert!(topic.publisher_names().is_empty());
    }

    #[test]
    fn test_unsubscribed_agent_stops_receiving() {
        let topic = Topic::new("A").unwrap();
        let rec = Recorder::new("r");
        topic.subscribe(rec.clone());
        topic.unsubscribe("r");
        topic.publish(Message::from_text("1"));
        assert!(rec.seen.lock().is_empty());
    }
}
