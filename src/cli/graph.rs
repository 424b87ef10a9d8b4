use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use super::CliContext;
use topicgraph::{loader::read_config, logger::init_tracing, runtime::Runtime};

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Configuration file to render
    pub file: PathBuf,
}

pub async fn execute(args: GraphArgs, context: &CliContext) -> anyhow::Result<()> {
    init_tracing(&context.settings.log_level, None);

    let specs = read_config(&args.file)
        .with_context(|| format!("Failed to read configuration: {}", args.file.display()))?;
    let graph = Runtime::new(context.settings.clone()).preview(&specs)?;

    println!("{}", serde_json::to_string_pretty(&graph.export())?);
    if let Some(cycle) = graph.find_cycle() {
        eprintln!("⚠️  wiring contains a cycle: {}", cycle.join(" -> "));
    }
    Ok(())
}
