//! A reactive dataflow engine: named topics carry messages, agents subscribe
//! to topics, compute, and publish to other topics.

pub mod agent;
pub mod config;
pub mod error;
pub mod graph;
pub mod loader;
pub mod logger;
pub mod message;
pub mod registry;
pub mod runtime;
pub mod schema;
pub mod topic;
pub mod watcher;

pub use error::{EngineError, Result};
