use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Args;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
    task::spawn_blocking,
};
use tracing::{debug, error, info};

use super::CliContext;
use topicgraph::{
    logger::init_tracing,
    runtime::Runtime,
    watcher::{DEFAULT_POLL_INTERVAL, FileWatcher},
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file: three lines per agent (type, subscribed topics, published topics)
    #[arg(long, short)]
    pub config: PathBuf,

    /// Reload the configuration whenever the file changes
    #[arg(long)]
    pub watch: bool,

    /// Run every agent behind a queue of this size on its own thread
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Optional log level override (e.g. error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,
}

const HELP: &str = "commands: <topic> <text> | values | graph | reload | help";

pub async fn execute(args: RunArgs, context: &CliContext) -> anyhow::Result<()> {
    let mut settings = context.settings.clone();
    if let Some(level) = args.log_level {
        settings.log_level = level;
    }
    if args.queue_capacity.is_some() {
        settings.queue_capacity = args.queue_capacity.filter(|n| *n > 0);
    }
    init_tracing(&settings.log_level, settings.log_dir.as_deref());
    debug!(config = ?context.config_manager, ?settings, "settings resolved");

    let runtime = Arc::new(Runtime::new(settings));
    let report = runtime
        .load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    info!(agents = report.agents.len(), "topicgraph running");
    println!("{}", serde_json::to_string_pretty(&runtime.graph().export())?);
    println!("{HELP}; Ctrl‐C or EOF to exit");

    let watcher = if args.watch {
        Some(FileWatcher::new(args.config.clone(), runtime.clone(), DEFAULT_POLL_INTERVAL)?)
    } else {
        None
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Err(e) = handle_line(&runtime, line.trim()).await {
                        error!("{e:#}");
                        eprintln!("❌ {e:#}");
                    }
                }
                None => break,
            },
            _ = signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    info!("topicgraph shutting down");
    if let Some(watcher) = watcher {
        watcher.shutdown();
    }
    // Closing parallel agents joins their worker threads.
    let rt = runtime.clone();
    spawn_blocking(move || rt.shutdown()).await?;
    Ok(())
}

async fn handle_line(runtime: &Arc<Runtime>, line: &str) -> anyhow::Result<()> {
    match line {
        "" => {}
        "help" => println!("{HELP}"),
        "values" => {
            for row in runtime.values() {
                println!(
                    "{:<6} {:<24} {}",
                    row.display_id.as_deref().unwrap_or("-"),
                    row.topic,
                    row.value.as_deref().unwrap_or("")
                );
            }
        }
        "graph" => println!("{}", serde_json::to_string_pretty(&runtime.graph().export())?),
        "reload" => {
            let rt = runtime.clone();
            let report = spawn_blocking(move || rt.reload()).await??;
            println!("✅ Reloaded: {}", report.agents.join(", "));
        }
        _ => {
            let (topic, text) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let (topic, text) = (topic.to_string(), text.trim().to_string());
            let rt = runtime.clone();
            // A full agent queue blocks the publisher.
            let published = spawn_blocking(move || rt.inject(&topic, Some(text.as_str()))).await??;
            if !published {
                println!("no such topic; try `values` for the list");
            }
        }
    }
    Ok(())
}
