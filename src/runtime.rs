use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use crossbeam_utils::atomic::AtomicCell;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::{
    agent::AgentFactory,
    config::EngineSettings,
    error::{EngineError, Result},
    graph::{Graph, TopicValue, topic_values},
    loader::{self, AgentSpec, LoadedConfig},
    message::Message,
    registry::TopicRegistry,
    watcher::WatchedType,
};

/// Outcome of a successful (re)load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub agents: Vec<String>,
    pub skipped: usize,
}

/// One live graph: its registry, the agents of the current configuration,
/// and the operations the CLI drives.
///
/// Only an acyclic configuration ever replaces the live one.
pub struct Runtime {
    registry: Arc<TopicRegistry>,
    factory: AgentFactory,
    settings: EngineSettings,
    config_path: Mutex<Option<PathBuf>>,
    current: Mutex<LoadedConfig>,
    rejected: AtomicCell<usize>,
}

impl Runtime {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_factory(settings, AgentFactory::builtin())
    }

    pub fn with_factory(settings: EngineSettings, factory: AgentFactory) -> Self {
        Self {
            registry: TopicRegistry::new(),
            factory,
            settings,
            config_path: Mutex::new(None),
            current: Mutex::new(LoadedConfig::default()),
            rejected: AtomicCell::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_path.lock().clone()
    }

    /// Load attempts that failed and left the live graph in place.
    pub fn rejected_loads(&self) -> usize {
        self.rejected.load()
    }

    /// Build `specs` in a scratch registry and snapshot the wiring.
    ///
    /// Nothing live is touched; cycles are not rejected here.
    pub fn preview(&self, specs: &[AgentSpec]) -> Result<Graph> {
        let scratch = TopicRegistry::new();
        let mut built = loader::build(&scratch, &self.factory, specs, self.settings.load_policy, None)?;
        let graph = Graph::from_registry(&scratch);
        built.close_all();
        Ok(graph)
    }

    /// [`Runtime::preview`], rejecting cyclic wiring.
    pub fn validate(&self, specs: &[AgentSpec]) -> Result<Graph> {
        let graph = self.preview(specs)?;
        if let Some(cycle) = graph.find_cycle() {
            return Err(EngineError::CycleDetected(cycle));
        }
        Ok(graph)
    }

    /// Read, validate and swap in the configuration at `path`.
    pub fn load(&self, path: &Path) -> Result<LoadReport> {
        let report = self.track(loader::read_config(path).and_then(|specs| self.swap_in(&specs)))?;
        *self.config_path.lock() = Some(path.to_path_buf());
        Ok(report)
    }

    /// Validate `specs`, then close the current agents, clear the registry
    /// and build the new configuration.
    pub fn load_specs(&self, specs: &[AgentSpec]) -> Result<LoadReport> {
        self.track(self.swap_in(specs))
    }

    fn track(&self, result: Result<LoadReport>) -> Result<LoadReport> {
        if result.is_err() {
            self.rejected.fetch_add(1);
        }
        result
    }

    fn swap_in(&self, specs: &[AgentSpec]) -> Result<LoadReport> {
        if let Err(e) = self.validate(specs) {
            warn!(error = %e, "configuration rejected, keeping current graph");
            return Err(e);
        }

        let mut current = self.current.lock();
        current.close_all();
        self.registry.clear();
        *current = loader::build(
            &self.registry,
            &self.factory,
            specs,
            self.settings.load_policy,
            self.settings.queue_capacity,
        )?;
        // Stamps display ids on the fresh topics.
        Graph::from_registry(&self.registry);

        let report = LoadReport {
            agents: current.agent_names(),
            skipped: current.skipped().len(),
        };
        info!(agents = report.agents.len(), skipped = report.skipped, "configuration loaded");
        Ok(report)
    }

    /// Load the last configuration file again.
    pub fn reload(&self) -> Result<LoadReport> {
        let Some(path) = self.config_path() else {
            return Err(EngineError::InvalidArgument("no configuration file loaded".to_string()));
        };
        self.load(&path)
    }

    /// Publish `text` to an existing topic.
    ///
    /// Returns `Ok(false)` if no topic has that name; injection never creates topics.
    pub fn inject(&self, topic: &str, text: Option<&str>) -> Result<bool> {
        let message = Message::try_from_text(text)?;
        match self.registry.find(topic) {
            Some(topic) => {
                topic.publish(message);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn graph(&self) -> Graph {
        Graph::from_registry(&self.registry)
    }

    pub fn values(&self) -> Vec<TopicValue> {
        topic_values(&self.registry)
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.current.lock().agent_names()
    }

    /// Close every live agent. Topics and their last values stay queryable.
    pub fn shutdown(&self) {
        self.current.lock().close_all();
        info!("runtime shut down");
    }
}

impl Drop for Runtime {
    // Agents hold the registry that holds them; closing them breaks the cycle
    // and joins parallel workers.
    fn drop(&mut self) {
        self.current.get_mut().close_all();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config_path", &self.config_path())
            .field("agents", &self.agent_names())
            .field("topics", &self.registry.len())
            .finish()
    }
}

#[async_trait]
impl WatchedType for Runtime {
    fn is_relevant(&self, path: &Path) -> bool {
        match self.config_path.lock().as_deref() {
            Some(config) => config.file_name().is_some() && config.file_name() == path.file_name(),
            None => false,
        }
    }

    async fn on_create_or_modify(&self, _path: &Path) -> anyhow::Result<()> {
        // Reloading joins parallel workers.
        match tokio::task::block_in_place(|| self.reload()) {
            Ok(report) => {
                info!(agents = report.agents.len(), "configuration reloaded");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "reload failed, keeping current graph");
                Err(e.into())
            }
        }
    }

    async fn on_remove(&self, path: &Path) -> anyhow::Result<()> {
        warn!(path = %path.display(), "configuration file removed, keeping current graph");
        Ok(())
    }
}
