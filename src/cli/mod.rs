use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod graph;
pub mod run;
pub mod schema;
pub mod validate;

use graph::GraphArgs;
use run::RunArgs;
use schema::SchemaArgs;
use validate::ValidateArgs;

use topicgraph::config::{ConfigManager, EngineSettings, EnvConfigManager};

#[derive(Parser, Debug)]
#[command(
    name = "topicgraph",
    about = "Topic/agent dataflow graphs from a configuration file",
    version
)]
pub struct Cli {
    /// Optional .env file with TOPICGRAPH_* settings
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a configuration and drive it from stdin
    Run(RunArgs),

    /// Check a configuration without running it
    Validate(ValidateArgs),

    /// Print a configuration's wiring as JSON
    Graph(GraphArgs),

    /// Emit JSON‐Schema for the graph and value documents
    Schema(SchemaArgs),
}

pub struct CliContext {
    pub config_manager: ConfigManager,
    pub settings: EngineSettings,
}

impl CliContext {
    pub async fn new(env_file: Option<PathBuf>) -> Self {
        let config_manager = ConfigManager(EnvConfigManager::new(env_file));
        let settings = EngineSettings::from_config(&config_manager).await;
        Self {
            config_manager,
            settings,
        }
    }
}

pub async fn execute(context: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run::execute(args, context).await,
        Commands::Validate(args) => validate::execute(args, context).await,
        Commands::Graph(args) => graph::execute(args, context).await,
        Commands::Schema(args) => schema::execute(args, context).await,
    }
}
