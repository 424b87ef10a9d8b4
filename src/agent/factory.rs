use std::{collections::HashMap, sync::Arc};

use crate::{
    agent::{Agent, ArithmeticOp, BinOpAgent, UnaryAgent, UnaryOp},
    error::{EngineError, Result},
    registry::TopicRegistry,
};

/// Builds and wires one agent from (registry, name, subscribed topics, published topics).
pub type AgentConstructor =
    fn(Arc<TopicRegistry>, &str, &[String], &[String]) -> Result<Arc<dyn Agent>>;

/// Type identifier → constructor table.
///
/// Identifiers may be package-qualified (`graph.PlusAgent`); only the segment
/// after the last `.` is looked up. Canonical names match exactly, aliases
/// ignore case.
#[derive(Clone, Default)]
pub struct AgentFactory {
    constructors: HashMap<String, AgentConstructor>,
    aliases: HashMap<String, String>,
}

impl AgentFactory {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed operator set.
    pub fn builtin() -> Self {
        let mut factory = Self::new();
        factory.register("PlusAgent", &["add", "plus"], plus);
        factory.register("SubtractAgent", &["sub", "subtract"], subtract);
        factory.register("MultiplyAgent", &["mul", "multiply"], multiply);
        factory.register("DivideAgent", &["div", "divide"], divide);
        factory.register("ModAgent", &["mod", "modulo"], modulo);
        factory.register("PowAgent", &["pow", "power"], power);
        factory.register("IncAgent", &["inc", "increment"], increment);
        factory.register("DecreaseAgent", &["dec", "decrement"], decrement);
        factory.register("SqrtAgent", &["sqrt"], sqrt);
        factory
    }

    pub fn register(&mut self, type_id: &str, aliases: &[&str], constructor: AgentConstructor) {
        self.constructors.insert(type_id.to_string(), constructor);
        for alias in aliases {
            self.aliases.insert(alias.to_lowercase(), type_id.to_string());
        }
    }

    /// Canonical type name for `type_id`, if known.
    pub fn resolve(&self, type_id: &str) -> Option<&str> {
        let short = type_id.trim().rsplit('.').next().unwrap_or_default();
        if let Some((name, _)) = self.constructors.get_key_value(short) {
            return Some(name.as_str());
        }
        self.aliases.get(&short.to_lowercase()).map(String::as_str)
    }

    pub fn create(
        &self,
        type_id: &str,
        registry: Arc<TopicRegistry>,
        name: &str,
        inputs: &[String],
        outputs: &[String],
    ) -> Result<Arc<dyn Agent>> {
        let constructor = self
            .resolve(type_id)
            .and_then(|canonical| self.constructors.get(canonical))
            .ok_or_else(|| EngineError::UnknownAgentType(type_id.to_string()))?;
        constructor(registry, name, inputs, outputs)
    }

    /// Canonical type names, sorted.
    pub fn type_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.constructors.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("types", &self.type_ids())
            .finish()
    }
}

fn arithmetic(
    op: ArithmeticOp,
    registry: Arc<TopicRegistry>,
    name: &str,
    inputs: &[String],
    outputs: &[String],
) -> Result<Arc<dyn Agent>> {
    let agent: Arc<dyn Agent> = BinOpAgent::arithmetic(registry, name, op, inputs, outputs)?;
    Ok(agent)
}

fn unary(
    op: UnaryOp,
    registry: Arc<TopicRegistry>,
    name: &str,
    inputs: &[String],
    outputs: &[String],
) -> Result<Arc<dyn Agent>> {
    let agent: Arc<dyn Agent> = UnaryAgent::new(registry, name, op, inputs, outputs)?;
    Ok(agent)
}

fn plus(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    arithmetic(ArithmeticOp::Add, r, n, i, o)
}

fn subtract(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    arithmetic(ArithmeticOp::Subtract, r, n, i, o)
}

fn multiply(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    arithmetic(ArithmeticOp::Multiply, r, n, i, o)
}

fn divide(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    arithmetic(ArithmeticOp::Divide, r, n, i, o)
}

fn modulo(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    arithmetic(ArithmeticOp::Modulo, r, n, i, o)
}

fn power(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    arithmetic(ArithmeticOp::Power, r, n, i, o)
}

fn increment(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    unary(UnaryOp::Increment, r, n, i, o)
}

fn decrement(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    unary(UnaryOp::Decrement, r, n, i, o)
}

fn sqrt(r: Arc<TopicRegistry>, n: &str, i: &[String], o: &[String]) -> Result<Arc<dyn Agent>> {
    unary(UnaryOp::SquareRoot, r, n, i, o)
}
