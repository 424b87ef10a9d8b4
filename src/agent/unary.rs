use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    agent::{Agent, attach, detach, publish_value, validate_wiring},
    error::{EngineError, Result},
    message::Message,
    registry::TopicRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Increment,
    Decrement,
    SquareRoot,
}

impl UnaryOp {
    /// `None` means the input is outside the operator's domain and is dropped.
    pub fn apply(self, value: f64) -> Option<f64> {
        match self {
            UnaryOp::Increment => Some(value + 1.0),
            UnaryOp::Decrement => Some(value - 1.0),
            UnaryOp::SquareRoot if value < 0.0 => None,
            UnaryOp::SquareRoot => Some(value.sqrt()),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UnaryOp::Increment => "increment",
            UnaryOp::Decrement => "decrement",
            UnaryOp::SquareRoot => "sqrt",
        }
    }
}

/// Single input, single output; publishes on every numeric message in the
/// operator's domain.
#[derive(Debug)]
pub struct UnaryAgent {
    name: String,
    op: UnaryOp,
    inputs: Vec<String>,
    outputs: Vec<String>,
    registry: Arc<TopicRegistry>,
    last_input: Mutex<f64>,
}

impl UnaryAgent {
    pub fn new(
        registry: Arc<TopicRegistry>,
        name: &str,
        op: UnaryOp,
        inputs: &[String],
        outputs: &[String],
    ) -> Result<Arc<Self>> {
        validate_wiring(name, inputs, outputs, 1)?;
        if inputs.len() > 1 || outputs.len() > 1 {
            return Err(EngineError::invalid_configuration(
                name,
                format!("{} takes exactly one subscribed and one published topic", op.label()),
            ));
        }

        let agent = Arc::new(Self {
            name: name.to_string(),
            op,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            registry: registry.clone(),
            last_input: Mutex::new(0.0),
        });
        attach(&registry, agent.clone())?;
        debug!(agent = %name, op = op.label(), "unary agent wired");
        Ok(agent)
    }

    pub fn op(&self) -> UnaryOp {
        self.op
    }

    /// Last accepted input value.
    pub fn last_input(&self) -> f64 {
        *self.last_input.lock()
    }
}

impl Agent for UnaryAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) {
        *self.last_input.lock() = 0.0;
    }

    fn callback(&self, topic: &str, msg: &Message) {
        if topic != self.inputs[0] {
            return;
        }
        let value = msg.numeric();
        if value.is_nan() {
            trace!(agent = %self.name, "ignoring non-numeric message");
            return;
        }
        let Some(result) = self.op.apply(value) else {
            trace!(agent = %self.name, value, "input outside domain");
            return;
        };
        *self.last_input.lock() = value;
        publish_value(&self.registry, &self.name, &self.outputs[0], result);
    }

    fn close(&self) {
        detach(&self.registry, &self.name, &self.inputs, &self.outputs);
        debug!(agent = %self.name, "unary agent closed");
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }
}
