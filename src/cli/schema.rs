use std::path::PathBuf;

use clap::Args;

use super::CliContext;
use topicgraph::schema::{schemas, write_schema};

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Write `<name>.schema.json` files here instead of printing
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

pub async fn execute(args: SchemaArgs, _context: &CliContext) -> anyhow::Result<()> {
    match args.out_dir {
        Some(out_dir) => {
            for path in write_schema(&out_dir)? {
                println!("Schema written to {}", path.display());
            }
        }
        None => {
            let all: serde_json::Map<String, serde_json::Value> = schemas()?
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect();
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
    }
    Ok(())
}
