use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender, bounded, select};
use crossbeam_utils::atomic::AtomicCell;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    agent::Agent,
    error::{EngineError, Result},
    message::Message,
    registry::TopicRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Stopped,
}

struct Envelope {
    topic: String,
    message: Message,
}

/// Decouples a wrapped agent from its publishers.
///
/// `callback` only enqueues; one dedicated worker thread feeds the wrapped
/// agent in FIFO order. A full queue blocks the caller. `close` stops the
/// worker: a callback already running finishes, anything still queued is
/// dropped.
pub struct ParallelAgent {
    inner: Arc<dyn Agent>,
    capacity: usize,
    sender: Sender<Envelope>,
    stop: Mutex<Option<Sender<()>>>,
    state: Arc<AtomicCell<WorkerState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ParallelAgent {
    /// Wrap `inner` and start its worker. Publishers still deliver to `inner`
    /// directly until the wrapper is wired in; see [`ParallelAgent::attach`].
    pub fn new(inner: Arc<dyn Agent>, capacity: usize) -> Result<Arc<Self>> {
        if capacity == 0 {
            return Err(EngineError::invalid_configuration(
                inner.name(),
                "queue capacity must be at least 1",
            ));
        }

        let (sender, receiver) = bounded::<Envelope>(capacity);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let state = Arc::new(AtomicCell::new(WorkerState::Running));

        let worker = {
            let inner = inner.clone();
            let state = state.clone();
            thread::Builder::new()
                .name(format!("parallel-{}", inner.name()))
                .spawn(move || worker_loop(inner, receiver, stop_rx, state))?
        };
        debug!(agent = %inner.name(), capacity, "parallel worker started");

        Ok(Arc::new(Self {
            inner,
            capacity,
            sender,
            stop: Mutex::new(Some(stop_tx)),
            state,
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Wrap `inner` and take over its topic slots, so publishers on its inputs
    /// enqueue instead of calling it directly.
    pub fn attach(registry: &TopicRegistry, inner: Arc<dyn Agent>, capacity: usize) -> Result<Arc<Self>> {
        let wrapper = Self::new(inner, capacity)?;
        // Same name as the wrapped agent, so this rebinds the existing slots.
        if let Err(e) = super::attach(registry, wrapper.clone()) {
            wrapper.close();
            return Err(e);
        }
        Ok(wrapper)
    }

    pub fn inner(&self) -> &Arc<dyn Agent> {
        &self.inner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages waiting for the worker.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    pub fn state(&self) -> WorkerState {
        self.state.load()
    }

    fn signal_stop(&self) {
        self.state.store(WorkerState::Stopped);
        // Dropping the only stop sender disconnects the channel and wakes the worker.
        self.stop.lock().take();
    }
}

fn worker_loop(
    agent: Arc<dyn Agent>,
    queue: Receiver<Envelope>,
    stop: Receiver<()>,
    state: Arc<AtomicCell<WorkerState>>,
) {
    loop {
        select! {
            recv(queue) -> envelope => match envelope {
                Ok(envelope) => {
                    if state.load() == WorkerState::Stopped {
                        break;
                    }
                    agent.callback(&envelope.topic, &envelope.message);
                }
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
    // `queue` drops here; producers blocked on a full queue get an error and return.
    debug!(agent = %agent.name(), dropped = queue.len(), "parallel worker stopped");
}

impl Agent for ParallelAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    /// Runs on the caller's thread; it is not ordered against queued callbacks.
    fn reset(&self) {
        self.inner.reset();
    }

    fn callback(&self, topic: &str, msg: &Message) {
        if self.state.load() == WorkerState::Stopped {
            trace!(agent = %self.name(), topic = %topic, "worker stopped, dropping message");
            return;
        }
        let envelope = Envelope {
            topic: topic.to_string(),
            message: msg.clone(),
        };
        // Blocks while the queue is full.
        if self.sender.send(envelope).is_err() {
            trace!(agent = %self.name(), topic = %topic, "worker gone, dropping message");
        }
    }

    fn close(&self) {
        self.signal_stop();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            // A callback on the worker itself may close its own wrapper; it cannot join itself.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(agent = %self.name(), "parallel worker panicked");
            }
        }
        self.inner.close();
    }

    fn inputs(&self) -> &[String] {
        self.inner.inputs()
    }

    fn outputs(&self) -> &[String] {
        self.inner.outputs()
    }
}

impl Drop for ParallelAgent {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

impl std::fmt::Debug for ParallelAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelAgent")
            .field("name", &self.name())
            .field("capacity", &self.capacity)
            .field("queued", &self.queued())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crossbeam::channel::{Receiver, Sender, unbounded};

    /// Blocks inside every callback until the test hands it a token.
    struct Gated {
        name: String,
        gate: Receiver<()>,
        seen: Sender<String>,
        resets: AtomicCell<usize>,
    }

    impl Agent for Gated {
        fn name(&self) -> &str {
            &self.name
        }
        fn reset(&self) {
            self.resets.fetch_add(1);
        }
        fn callback(&self, _topic: &str, msg: &Message) {
            let _ = self.gate.recv();
            let _ = self.seen.send(msg.text().to_string());
        }
        fn close(&self) {}
        fn inputs(&self) -> &[String] {
            &[]
        }
        fn outputs(&self) -> &[String] {
            &[]
        }
    }

    fn gated() -> (Arc<Gated>, Sender<()>, Receiver<String>) {
        let (gate_tx, gate_rx) = unbounded();
        let (seen_tx, seen_rx) = unbounded();
        let agent = Arc::new(Gated {
            name: "gated".into(),
            gate: gate_rx,
            seen: seen_tx,
            resets: AtomicCell::new(0),
        });
        (agent, gate_tx, seen_rx)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let (agent, _gate, _seen) = gated();
        assert!(ParallelAgent::new(agent, 0).is_err());
    }

    #[test]
    fn test_delivers_in_fifo_order() {
        let (agent, gate, seen) = gated();
        let parallel = ParallelAgent::new(agent, 8).unwrap();
        for i in 0..5 {
            gate.send(()).unwrap();
            parallel.callback("T", &Message::from_text(i.to_string()));
        }
        let got: Vec<String> = (0..5)
            .map(|_| seen.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, vec!["0", "1", "2", "3", "4"]);
        parallel.close();
    }

    #[test]
    fn test_full_queue_blocks_producer() {
        let (agent, gate, seen) = gated();
        let parallel = ParallelAgent::new(agent, 2).unwrap();

        let producer = {
            let parallel = parallel.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    parallel.callback("T", &Message::from_text(i.to_string()));
                }
            })
        };

        // One message is held by the worker, two fill the queue, the producer waits.
        wait_until(|| parallel.queued() == 2);
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());

        for _ in 0..5 {
            gate.send(()).unwrap();
        }
        producer.join().unwrap();
        let got: Vec<String> = (0..5)
            .map(|_| seen.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, vec!["0", "1", "2", "3", "4"]);
        parallel.close();
    }

    #[test]
    fn test_close_discards_queued_messages() {
        let (agent, gate, seen) = gated();
        let parallel = ParallelAgent::new(agent, 8).unwrap();
        for i in 0..4 {
            parallel.callback("T", &Message::from_text(i.to_string()));
        }
        wait_until(|| parallel.queued() == 3);

        let closer = {
            let parallel = parallel.clone();
            thread::spawn(move || parallel.close())
        };
        wait_until(|| parallel.state() == WorkerState::Stopped);
        // Let the in-flight callback finish, and offer tokens for the rest.
        for _ in 0..4 {
            gate.send(()).unwrap();
        }
        closer.join().unwrap();

        assert_eq!(seen.recv_timeout(Duration::from_secs(5)).unwrap(), "0");
        assert!(seen.recv_timeout(Duration::from_millis(100)).is_err());

        parallel.callback("T", &Message::from_text("late"));
        assert!(seen.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_name_and_reset_delegate() {
        let (agent, _gate, _seen) = gated();
        let parallel = ParallelAgent::new(agent.clone(), 1).unwrap();
        assert_eq!(parallel.name(), "gated");
        parallel.reset();
        assert_eq!(agent.resets.load(), 1);
        parallel.close();
        parallel.close();
    }

    #[test]
    fn test_attach_rebinds_subscription() {
        use crate::agent::{UnaryAgent, UnaryOp};

        let registry = TopicRegistry::new();
        let inc = UnaryAgent::new(registry.clone(), "inc", UnaryOp::Increment, &["IN".into()], &["OUT".into()])
            .unwrap();
        let parallel = ParallelAgent::attach(&registry, inc, 4).unwrap();

        let input = registry.topic("IN").unwrap();
        assert_eq!(input.subscriber_names(), vec!["inc".to_string()]);
        let bound = input.subscribers().pop().unwrap();
        assert_eq!(Arc::as_ptr(&bound) as *const (), Arc::as_ptr(&parallel) as *const ());

        input.publish(Message::from_text("1"));
        let out = registry.topic("OUT").unwrap();
        wait_until(|| out.last_message().is_some());
        assert_eq!(out.last_message().unwrap().numeric(), 2.0);

        parallel.close();
        assert!(input.subscriber_names().is_empty());
        assert!(out.publisher_names().is_empty());
    }
}
