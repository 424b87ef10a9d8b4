use std::{fmt, fs, path::Path, str::FromStr, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    agent::{Agent, AgentFactory, ParallelAgent},
    error::{EngineError, Result},
    registry::TopicRegistry,
};

/// One agent's three records from a configuration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub type_id: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// 1-based line of the type record.
    pub line: usize,
}

/// What to do when one agent of a batch fails to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Close everything built so far and return the error.
    #[default]
    AllOrNothing,
    /// Log the failure and keep going.
    SkipInvalid,
}

impl FromStr for LoadPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "all-or-nothing" => Ok(LoadPolicy::AllOrNothing),
            "skip-invalid" => Ok(LoadPolicy::SkipInvalid),
            other => Err(format!("unknown load policy `{other}`")),
        }
    }
}

impl fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadPolicy::AllOrNothing => "all-or-nothing",
            LoadPolicy::SkipInvalid => "skip-invalid",
        })
    }
}

/// Parse configuration text.
///
/// Every agent is three records: type identifier, comma-separated subscribed
/// topics, comma-separated published topics. Blank lines and lines starting
/// with `#` are not records.
pub fn parse_config(text: &str) -> Result<Vec<AgentSpec>> {
    let records: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect();

    if records.len() % 3 != 0 {
        return Err(EngineError::MalformedConfiguration(format!(
            "{} records is not a multiple of three",
            records.len()
        )));
    }

    Ok(records
        .chunks_exact(3)
        .map(|chunk| AgentSpec {
            type_id: chunk[0].1.to_string(),
            inputs: topic_list(chunk[1].1),
            outputs: topic_list(chunk[2].1),
            line: chunk[0].0,
        })
        .collect())
}

pub fn read_config(path: &Path) -> Result<Vec<AgentSpec>> {
    let text = fs::read_to_string(path)?;
    parse_config(&text)
}

fn topic_list(record: &str) -> Vec<String> {
    record
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAgent {
    pub line: usize,
    pub type_id: String,
    pub reason: String,
}

/// The agents one configuration produced, in file order.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    agents: Vec<Arc<dyn Agent>>,
    skipped: Vec<SkippedAgent>,
}

impl LoadedConfig {
    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    /// Agents left out under [`LoadPolicy::SkipInvalid`].
    pub fn skipped(&self) -> &[SkippedAgent] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Close and forget every agent.
    pub fn close_all(&mut self) {
        for agent in self.agents.drain(..) {
            agent.close();
        }
        self.skipped.clear();
    }
}

/// Construct and wire every agent in `specs` against `registry`.
///
/// Agents are named `<Type>#<n>`, `n` being the 1-based position in `specs`.
/// With a `queue_capacity`, each agent is wrapped in a [`ParallelAgent`] that
/// takes over its topic slots.
pub fn build(
    registry: &Arc<TopicRegistry>,
    factory: &AgentFactory,
    specs: &[AgentSpec],
    policy: LoadPolicy,
    queue_capacity: Option<usize>,
) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig::default();

    for (index, spec) in specs.iter().enumerate() {
        let canonical = factory.resolve(&spec.type_id).unwrap_or(&spec.type_id);
        let name = format!("{canonical}#{}", index + 1);

        match build_one(registry, factory, spec, &name, queue_capacity) {
            Ok(agent) => {
                debug!(agent = %name, line = spec.line, "agent loaded");
                loaded.agents.push(agent);
            }
            Err(e) => match policy {
                LoadPolicy::AllOrNothing => {
                    warn!(agent = %name, line = spec.line, error = %e, "load aborted");
                    loaded.close_all();
                    return Err(e);
                }
                LoadPolicy::SkipInvalid => {
                    warn!(agent = %name, line = spec.line, error = %e, "skipping agent");
                    loaded.skipped.push(SkippedAgent {
                        line: spec.line,
                        type_id: spec.type_id.clone(),
                        reason: e.to_string(),
                    });
                }
            },
        }
    }

    info!(
        agents = loaded.agents.len(),
        skipped = loaded.skipped.len(),
        "configuration built"
    );
    Ok(loaded)
}

fn build_one(
    registry: &Arc<TopicRegistry>,
    factory: &AgentFactory,
    spec: &AgentSpec,
    name: &str,
    queue_capacity: Option<usize>,
) -> Result<Arc<dyn Agent>> {
    let agent = factory.create(&spec.type_id, registry.clone(), name, &spec.inputs, &spec.outputs)?;
    let Some(capacity) = queue_capacity else {
        return Ok(agent);
    };
    match ParallelAgent::attach(registry, agent.clone(), capacity) {
        Ok(parallel) => Ok(parallel as Arc<dyn Agent>),
        Err(e) => {
            agent.close();
            Err(e)
        }
    }
}
