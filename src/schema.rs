// src/schema.rs

use std::{fs, path::{Path, PathBuf}};

use anyhow::Error;
use schemars::schema_for;
use serde_json::Value;

use crate::graph::{TopicValue, VertexView};

/// JSON Schemas of the documents the CLI prints, keyed by file stem.
pub fn schemas() -> Result<Vec<(&'static str, Value)>, Error> {
    Ok(vec![
        ("graph", serde_json::to_value(schema_for!(Vec<VertexView>))?),
        ("values", serde_json::to_value(schema_for!(Vec<TopicValue>))?),
    ])
}

/// Write one `<name>.schema.json` per document into `out_dir`.
pub fn write_schema(out_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    fs::create_dir_all(out_dir)?;
    let mut written = vec![];
    for (name, schema) in schemas()? {
        let path = out_dir.join(format!("{name}.schema.json"));
        fs::write(&path, serde_json::to_string_pretty(&schema)?)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_graph_schema_names_export_fields() {
        let schemas = schemas().unwrap();
        let graph = &schemas.iter().find(|(name, _)| *name == "graph").unwrap().1;
        let text = graph.to_string();
        assert!(text.contains("displayName"));
        assert!(text.contains("outgoingEdgeIds"));
    }

    #[test]
    fn test_write_schema() {
        let tmp = TempDir::new().unwrap();
        let written = write_schema(tmp.path()).unwrap();
        assert_eq!(written.len(), 2);
        for path in written {
            let json: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
            assert!(json.is_object());
        }
    }
}
