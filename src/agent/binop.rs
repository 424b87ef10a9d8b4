use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    agent::{Agent, attach, detach, publish_value, validate_wiring},
    error::Result,
    message::Message,
    registry::TopicRegistry,
};

/// Caller-supplied operator over the (first, second) slot values.
pub type BinaryFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// When a binary operator publishes after storing an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPolicy {
    /// Only once both inputs have been received.
    BothReceived,
    /// Once both inputs have been received, or whenever the second slot holds
    /// zero. The second clause can fire on the first input alone, because a
    /// fresh or reset second slot defaults to zero.
    BothReceivedOrSecondZero,
}

/// The fixed two-input arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl ArithmeticOp {
    pub fn apply(self, first: f64, second: f64) -> f64 {
        match self {
            ArithmeticOp::Add => first + second,
            ArithmeticOp::Subtract => first - second,
            ArithmeticOp::Multiply => first * second,
            ArithmeticOp::Divide => first / second,
            // operand order is reversed: second mod first
            ArithmeticOp::Modulo => second % first,
            ArithmeticOp::Power => first.powf(second),
        }
    }

    pub fn policy(self) -> PublishPolicy {
        match self {
            ArithmeticOp::Divide | ArithmeticOp::Modulo => PublishPolicy::BothReceivedOrSecondZero,
            _ => PublishPolicy::BothReceived,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Subtract => "subtract",
            ArithmeticOp::Multiply => "multiply",
            ArithmeticOp::Divide => "divide",
            ArithmeticOp::Modulo => "modulo",
            ArithmeticOp::Power => "power",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slots {
    first: f64,
    second: f64,
    first_received: bool,
    second_received: bool,
}

impl Slots {
    /// A unary operator has no second input, so its second slot counts as received.
    fn initial(unary: bool) -> Self {
        Slots {
            first: 0.0,
            second: 0.0,
            first_received: false,
            second_received: unary,
        }
    }
}

/// A binary operator over two input topics, or over one input fed to both
/// operands when only a single input topic is configured.
pub struct BinOpAgent {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    op: BinaryFn,
    policy: PublishPolicy,
    registry: Arc<TopicRegistry>,
    slots: Mutex<Slots>,
}

impl BinOpAgent {
    /// One of the fixed arithmetic operators. Needs two subscribed topics; only
    /// the first two inputs and the first output are used.
    pub fn arithmetic(
        registry: Arc<TopicRegistry>,
        name: &str,
        op: ArithmeticOp,
        inputs: &[String],
        outputs: &[String],
    ) -> Result<Arc<Self>> {
        validate_wiring(name, inputs, outputs, 2)?;
        Self::build(
            registry,
            name,
            &inputs[..2],
            &outputs[..1],
            Arc::new(move |a: f64, b: f64| op.apply(a, b)),
            op.policy(),
        )
    }

    /// A caller-supplied operator. With a single input topic it publishes
    /// `f(v, v)` for every numeric value `v`; with two it waits for both.
    pub fn generic(
        registry: Arc<TopicRegistry>,
        name: &str,
        inputs: &[String],
        outputs: &[String],
        op: BinaryFn,
    ) -> Result<Arc<Self>> {
        validate_wiring(name, inputs, outputs, 1)?;
        let used = inputs.len().min(2);
        Self::build(
            registry,
            name,
            &inputs[..used],
            &outputs[..1],
            op,
            PublishPolicy::BothReceived,
        )
    }

    fn build(
        registry: Arc<TopicRegistry>,
        name: &str,
        inputs: &[String],
        outputs: &[String],
        op: BinaryFn,
        policy: PublishPolicy,
    ) -> Result<Arc<Self>> {
        let agent = Arc::new(Self {
            name: name.to_string(),
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            op,
            policy,
            registry: registry.clone(),
            slots: Mutex::new(Slots::initial(inputs.len() == 1)),
        });
        attach(&registry, agent.clone())?;
        debug!(agent = %name, inputs = ?agent.inputs, outputs = ?agent.outputs, "binary agent wired");
        Ok(agent)
    }

    pub fn is_unary(&self) -> bool {
        self.inputs.len() == 1
    }

    pub fn policy(&self) -> PublishPolicy {
        self.policy
    }

    /// Store `value` in the slot fed by `topic` and return the result to
    /// publish, if the policy says so.
    fn absorb(&self, topic: &str, value: f64) -> Option<f64> {
        let mut slots = self.slots.lock();
        if topic == self.inputs[0] {
            slots.first = value;
            slots.first_received = true;
        } else if self.inputs.get(1).is_some_and(|second| second == topic) {
            slots.second = value;
            slots.second_received = true;
        } else {
            return None;
        }

        let both = slots.first_received && slots.second_received;
        let fire = match self.policy {
            PublishPolicy::BothReceived => both,
            PublishPolicy::BothReceivedOrSecondZero => both || slots.second == 0.0,
        };
        if !fire {
            return None;
        }
        let result = if self.is_unary() {
            (self.op)(slots.first, slots.first)
        } else {
            (self.op)(slots.first, slots.second)
        };
        Some(result)
    }
}

impl Agent for BinOpAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) {
        *self.slots.lock() = Slots::initial(self.is_unary());
    }

    fn callback(&self, topic: &str, msg: &Message) {
        if !msg.is_numeric() {
            trace!(agent = %self.name, topic = %topic, "ignoring non-numeric message");
            return;
        }
        // The slot lock is released before publishing so a cyclic wiring that
        // re-enters this agent cannot deadlock on it.
        if let Some(result) = self.absorb(topic, msg.numeric()) {
            publish_value(&self.registry, &self.name, &self.outputs[0], result);
        }
    }

    fn close(&self) {
        detach(&self.registry, &self.name, &self.inputs, &self.outputs);
        debug!(agent = %self.name, "binary agent closed");
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }
}

impl fmt::Debug for BinOpAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinOpAgent")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("policy", &self.policy)
            .field("slots", &*self.slots.lock())
            .finish()
    }
}
