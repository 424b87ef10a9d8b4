mod cli;

use clap::Parser;
use cli::{Cli, CliContext, execute};

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let context = CliContext::new(cli.env_file.clone()).await;
    execute(&context, cli.command).await
}
