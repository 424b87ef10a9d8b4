// tests/engine_test.rs
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use topicgraph::agent::{Agent, AgentFactory, ArithmeticOp, BinOpAgent, ParallelAgent, UnaryAgent, UnaryOp};
use topicgraph::graph::Graph;
use topicgraph::message::Message;
use topicgraph::registry::TopicRegistry;

/// Remembers every message delivered to it.
struct Recorder {
    name: String,
    seen: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            seen: Mutex::new(vec![]),
        })
    }

    fn values(&self) -> Vec<f64> {
        self.seen
            .lock()
            .iter()
            .map(|(_, text)| Message::from_text(text.as_str()).numeric())
            .collect()
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

fn topics(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_number_round_trip() {
    for text in ["0", "5", "-2.5", "1e3", "3.14159", "  42  "] {
        let parsed = Message::from_text(text).numeric();
        let round = Message::from_number(parsed);
        assert!((round.numeric() - parsed).abs() < 1e-12, "{text}");
    }
    assert_eq!(Message::from_number(5.0).text(), "5.0");
}

#[test]
fn test_subscribe_is_idempotent_and_publish_without_subscribers() {
    let registry = TopicRegistry::new();
    let topic = registry.topic("T").unwrap();
    topic.publish(Message::from_text("1"));
    assert_eq!(topic.last_message().unwrap().text(), "1");

    let rec = Recorder::new("rec");
    topic.subscribe(rec.clone());
    topic.subscribe(rec.clone());
    assert_eq!(topic.subscriber_names(), vec!["rec".to_string()]);

    topic.publish(Message::from_text("2"));
    assert_eq!(rec.values(), vec![2.0]);
}

#[test]
fn test_add_publishes_once_both_inputs_arrive() {
    let registry = TopicRegistry::new();
    let add = BinOpAgent::arithmetic(registry.clone(), "add", ArithmeticOp::Add, &topics(&["A", "B"]), &topics(&["C"]))
        .unwrap();
    let rec = Recorder::new("rec");
    registry.topic("C").unwrap().subscribe(rec.clone());

    for _ in 0..2 {
        registry.topic("A").unwrap().publish(Message::from_text("3"));
        assert!(rec.values().is_empty());
        registry.topic("B").unwrap().publish(Message::from_text("4"));
        assert_eq!(rec.values(), vec![7.0]);

        add.reset();
        rec.reset();
    }
}

#[test]
fn test_chain_propagates_synchronously() {
    let registry = TopicRegistry::new();
    let factory = AgentFactory::builtin();
    let _mul = factory
        .create("MultiplyAgent", registry.clone(), "mul", &topics(&["A", "B"]), &topics(&["C"]))
        .unwrap();
    let _sqrt = factory
        .create("sqrt", registry.clone(), "sqrt", &topics(&["C"]), &topics(&["D"]))
        .unwrap();

    registry.topic("A").unwrap().publish(Message::from_text("2"));
    registry.topic("B").unwrap().publish(Message::from_text("8"));
    // No waiting: the whole chain ran inside the last publish.
    assert_eq!(registry.topic("D").unwrap().last_message().unwrap().numeric(), 4.0);
}

#[test]
fn test_increment_and_sqrt_properties() {
    let registry = TopicRegistry::new();
    let _inc = UnaryAgent::new(registry.clone(), "inc", UnaryOp::Increment, &topics(&["I"]), &topics(&["IO"])).unwrap();
    let _sqrt =
        UnaryAgent::new(registry.clone(), "sqrt", UnaryOp::SquareRoot, &topics(&["S"]), &topics(&["SO"])).unwrap();

    registry.topic("I").unwrap().publish(Message::from_text("not-a-number"));
    assert!(registry.topic("IO").unwrap().last_message().is_none());
    registry.topic("I").unwrap().publish(Message::from_text("5"));
    assert_eq!(registry.topic("IO").unwrap().last_message().unwrap().numeric(), 6.0);

    registry.topic("S").unwrap().publish(Message::from_text("-1"));
    assert!(registry.topic("SO").unwrap().last_message().is_none());
    registry.topic("S").unwrap().publish(Message::from_text("9"));
    assert_eq!(registry.topic("SO").unwrap().last_message().unwrap().numeric(), 3.0);
}

#[test]
fn test_cycle_versus_linear_chain() {
    let looped = TopicRegistry::new();
    let _a = UnaryAgent::new(looped.clone(), "a", UnaryOp::Increment, &topics(&["T"]), &topics(&["T"])).unwrap();
    assert!(Graph::from_registry(&looped).has_cycle());

    let chain = TopicRegistry::new();
    let _a = UnaryAgent::new(chain.clone(), "a", UnaryOp::Increment, &topics(&["T1"]), &topics(&["T2"])).unwrap();
    let _b = UnaryAgent::new(chain.clone(), "b", UnaryOp::Increment, &topics(&["T2"]), &topics(&["T3"])).unwrap();
    assert!(!Graph::from_registry(&chain).has_cycle());
}

#[test]
fn test_clear_yields_fresh_topics() {
    let registry = TopicRegistry::new();
    let _inc = UnaryAgent::new(registry.clone(), "inc", UnaryOp::Increment, &topics(&["x"]), &topics(&["y"])).unwrap();
    assert!(!registry.topic("x").unwrap().subscriber_names().is_empty());

    registry.clear();
    let x = registry.topic("x").unwrap();
    assert!(x.subscriber_names().is_empty());
    assert!(x.publisher_names().is_empty());
    assert!(x.last_message().is_none());
}

#[test]
fn test_independent_registries_do_not_share_topics() {
    let first = TopicRegistry::new();
    let second = TopicRegistry::new();
    first.topic("T").unwrap().publish(Message::from_text("1"));
    assert!(second.find("T").is_none());
    assert!(second.topic("T").unwrap().last_message().is_none());
}

#[test]
fn test_parallel_agent_blocks_then_stops() {
    let registry = TopicRegistry::new();
    let rec = Recorder::new("slow");
    let (gate_tx, gate_rx) = crossbeam::channel::unbounded::<()>();

    // Wraps the recorder behind a gate so the worker can be held.
    struct Slow {
        inner: Arc<Recorder>,
        gate: crossbeam::channel::Receiver<()>,
    }
    impl Agent for Slow {
        fn name(&self) -> &str {
            self.inner.name()
        }
        fn reset(&self) {}
        fn callback(&self, topic: &str, msg: &Message) {
            let _ = self.gate.recv();
            self.inner.callback(topic, msg);
        }
        fn close(&self) {}
        fn inputs(&self) -> &[String] {
            &[]
        }
        fn outputs(&self) -> &[String] {
            &[]
        }
    }

    let slow = Arc::new(Slow {
        inner: rec.clone(),
        gate: gate_rx,
    });
    let parallel = ParallelAgent::new(slow, 1).unwrap();
    registry.topic("T").unwrap().subscribe(parallel.clone());

    let producer = {
        let registry = registry.clone();
        thread::spawn(move || {
            for i in 0..4 {
                registry.topic("T").unwrap().publish(Message::from_text(i.to_string()));
            }
        })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while parallel.queued() < 1 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(50));
    assert!(!producer.is_finished(), "producer should block on the full queue");

    for _ in 0..4 {
        gate_tx.send(()).unwrap();
    }
    producer.join().unwrap();
    while rec.values().len() < 4 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(rec.values(), vec![0.0, 1.0, 2.0, 3.0]);

    parallel.close();
    registry.topic("T").unwrap().publish(Message::from_text("9"));
    gate_tx.send(()).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(rec.values().len(), 4);
}
