//! Agents: computation nodes wired between topics.
//!
//! Every concrete agent registers itself with the registry while it is being
//! constructed (subscriber on its inputs, publisher on its output) and undoes
//! that in [`Agent::close`]. Agents hold topic *names* and re-resolve them
//! through the registry, so a registry `clear()` leaves old agents inert rather
//! than dangling.

pub mod binop;
pub mod factory;
pub mod parallel;
pub mod unary;

use std::sync::Arc;

use tracing::warn;

use crate::{
    error::{EngineError, Result},
    message::Message,
    registry::TopicRegistry,
};

pub use binop::{ArithmeticOp, BinOpAgent, BinaryFn, PublishPolicy};
pub use factory::{AgentConstructor, AgentFactory};
pub use parallel::ParallelAgent;
pub use unary::{UnaryAgent, UnaryOp};

/// The capability set every computation node offers.
///
/// An agent's identity is its name. The core does not enforce uniqueness;
/// two agents sharing a name share one membership slot in every topic.
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Return to the freshly constructed state.
    fn reset(&self);

    /// Deliver `msg`, published on `topic`. Runs on the publisher's thread
    /// unless the agent is wrapped in a [`ParallelAgent`].
    fn callback(&self, topic: &str, msg: &Message);

    /// Unsubscribe from every input and stop publishing to every output.
    fn close(&self);

    /// Topics this agent subscribes to.
    fn inputs(&self) -> &[String];

    /// Topics this agent publishes to.
    fn outputs(&self) -> &[String];
}

impl std::fmt::Debug for dyn Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name())
            .field("inputs", &self.inputs())
            .field("outputs", &self.outputs())
            .finish()
    }
}

/// Check the name and topic counts shared by every operator constructor.
pub(crate) fn validate_wiring(
    name: &str,
    inputs: &[String],
    outputs: &[String],
    min_inputs: usize,
) -> Result<()> {
    if name.is_empty() {
        return Err(EngineError::invalid_configuration(name, "agent name cannot be empty"));
    }
    if inputs.len() < min_inputs {
        return Err(EngineError::invalid_configuration(
            name,
            format!("needs at least {min_inputs} subscribed topic(s), got {}", inputs.len()),
        ));
    }
    if outputs.is_empty() {
        return Err(EngineError::invalid_configuration(
            name,
            "needs at least one published topic",
        ));
    }
    if let Some(blank) = inputs.iter().chain(outputs).find(|t| t.is_empty()) {
        return Err(EngineError::invalid_configuration(
            name,
            format!("topic name {blank:?} is empty"),
        ));
    }
    Ok(())
}

/// Register `agent` as subscriber of its inputs and publisher of its outputs.
pub(crate) fn attach(registry: &TopicRegistry, agent: Arc<dyn Agent>) -> Result<()> {
    for input in agent.inputs() {
        registry.topic(input)?.subscribe(agent.clone());
    }
    for output in agent.outputs() {
        registry.topic(output)?.add_publisher(agent.clone());
    }
    Ok(())
}

/// Undo [`attach`]. Topics that no longer exist (e.g. after a registry clear)
/// are left alone rather than recreated.
pub(crate) fn detach(registry: &TopicRegistry, name: &str, inputs: &[String], outputs: &[String]) {
    for input in inputs {
        if let Some(topic) = registry.find(input) {
            topic.unsubscribe(name);
        }
    }
    for output in outputs {
        if let Some(topic) = registry.find(output) {
            topic.remove_publisher(name);
        }
    }
}

/// Publish a computed value, building the message from the number.
pub(crate) fn publish_value(registry: &TopicRegistry, agent: &str, topic: &str, value: f64) {
    match registry.topic(topic) {
        Ok(topic) => topic.publish(Message::from_number(value)),
        Err(e) => warn!(agent = %agent, error = %e, "could not resolve output topic"),
    }
}
