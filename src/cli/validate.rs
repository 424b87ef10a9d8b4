use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Args;

use super::CliContext;
use topicgraph::{loader::read_config, logger::init_tracing, runtime::Runtime};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file to check
    pub file: PathBuf,
}

pub async fn execute(args: ValidateArgs, context: &CliContext) -> anyhow::Result<()> {
    init_tracing(&context.settings.log_level, None);

    if !args.file.exists() {
        bail!("File does not exist: {}", args.file.display());
    }
    let specs = read_config(&args.file)
        .with_context(|| format!("Failed to read configuration: {}", args.file.display()))?;

    let runtime = Runtime::new(context.settings.clone());
    let graph = runtime
        .validate(&specs)
        .with_context(|| format!("Invalid configuration: {}", args.file.display()))?;

    println!(
        "✅ Configuration is valid: {} agents, {} vertices, {} edges.",
        graph.agent_count(),
        graph.vertex_count(),
        graph.edge_count()
    );
    Ok(())
}
