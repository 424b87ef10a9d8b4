use async_trait::async_trait;
use dashmap::DashMap;
use std::{env, path::PathBuf};
use tracing::{info, warn};

use crate::loader::LoadPolicy;

pub const LOG_LEVEL_KEY: &str = "TOPICGRAPH_LOG_LEVEL";
pub const LOG_DIR_KEY: &str = "TOPICGRAPH_LOG_DIR";
pub const QUEUE_CAPACITY_KEY: &str = "TOPICGRAPH_QUEUE_CAPACITY";
pub const LOAD_POLICY_KEY: &str = "TOPICGRAPH_LOAD_POLICY";

/// Key/value source for engine settings.
#[async_trait]
pub trait ConfigManagerType: Send + Sync {
    async fn as_vec(&self) -> Vec<(String, String)> {
        let mut config = vec![];
        for key in self.keys().await {
            if let Some(value) = self.get(&key).await {
                config.push((key, value));
            }
        }
        config
    }
    async fn keys(&self) -> Vec<String>;
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn del(&self, key: &str);
    fn debug_box(&self) -> String;
}

pub struct ConfigManager(pub Box<dyn ConfigManagerType>);

impl ConfigManager {
    pub fn into_inner(self) -> Box<dyn ConfigManagerType> {
        self.0
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Process environment, optionally seeded from a `.env` file.
///
/// `set`/`del` only affect this manager's view; the process environment and
/// the file are never written.
#[derive(Debug, Default)]
pub struct EnvConfigManager {
    env_file: Option<PathBuf>,
    overrides: DashMap<String, Option<String>>,
}

impl EnvConfigManager {
    pub fn new(env_file: Option<PathBuf>) -> Box<Self> {
        if let Some(path) = &env_file {
            match dotenvy::from_path(path) {
                Ok(()) => info!("Loaded .env from {}", path.display()),
                Err(e) => warn!("could not load .env from {}: {e}", path.display()),
            }
        }
        Box::new(Self {
            env_file,
            overrides: DashMap::new(),
        })
    }
}

#[async_trait]
impl ConfigManagerType for EnvConfigManager {
    async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = env::vars()
            .map(|(k, _)| k)
            .filter(|k| !self.overrides.contains_key(k))
            .collect();
        keys.extend(
            self.overrides
                .iter()
                .filter(|entry| entry.value().is_some())
                .map(|entry| entry.key().clone()),
        );
        keys
    }

    async fn get(&self, key: &str) -> Option<String> {
        match self.overrides.get(key) {
            Some(entry) => entry.value().clone(),
            None => env::var(key).ok(),
        }
    }

    async fn set(&self, key: &str, value: &str) {
        self.overrides.insert(key.to_string(), Some(value.to_string()));
    }

    async fn del(&self, key: &str) {
        self.overrides.insert(key.to_string(), None);
    }

    fn debug_box(&self) -> String {
        match &self.env_file {
            Some(path) => format!("EnvConfigManager({})", path.display()),
            None => "EnvConfigManager".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MapConfigManager {
    map: DashMap<String, String>,
}

impl MapConfigManager {
    pub fn new() -> Box<Self> {
        Box::new(Self {
            map: DashMap::new(),
        })
    }
}

#[async_trait]
impl ConfigManagerType for MapConfigManager {
    async fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.clone())
    }

    async fn set(&self, key: &str, value: &str) {
        self.map.insert(key.to_string(), value.to_string());
    }

    async fn del(&self, key: &str) {
        self.map.remove(key);
    }

    fn debug_box(&self) -> String {
        format!("MapConfigManager({} entries)", self.map.len())
    }
}

/// Runtime knobs read from a [`ConfigManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    /// When set, every loaded agent is wrapped in a `ParallelAgent` with this queue size.
    pub queue_capacity: Option<usize>,
    pub load_policy: LoadPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            queue_capacity: None,
            load_policy: LoadPolicy::default(),
        }
    }
}

impl EngineSettings {
    /// Unparseable values fall back to their defaults.
    pub async fn from_config(config: &ConfigManager) -> Self {
        let mut settings = Self::default();

        if let Some(level) = non_empty(config.0.get(LOG_LEVEL_KEY).await) {
            settings.log_level = level;
        }

        settings.log_dir = non_empty(config.0.get(LOG_DIR_KEY).await).map(PathBuf::from);

        if let Some(raw) = non_empty(config.0.get(QUEUE_CAPACITY_KEY).await) {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => settings.queue_capacity = Some(n),
                _ => warn!(key = QUEUE_CAPACITY_KEY, value = %raw, "expected a positive integer, ignoring"),
            }
        }

        if let Some(raw) = non_empty(config.0.get(LOAD_POLICY_KEY).await) {
            match raw.parse::<LoadPolicy>() {
                Ok(policy) => settings.load_policy = policy,
                Err(e) => warn!(key = LOAD_POLICY_KEY, value = %raw, "{e}, using {}", settings.load_policy),
            }
        }

        settings
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
