//! Export subcommand: dumps the database as JSON.

use anyhow::{Result, bail};
use clap::Args;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;

use crate::db::Database;
use crate::db::export::EXPORT_TABLES;

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Comma-separated list of tables to export
    ///
    /// Available tables: project, tag, task, task_tag
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub tables: Option<Vec<String>>,

    /// Single-line JSON instead of pretty printed
    #[arg(long)]
    pub compact: bool,
}

impl ExportArgs {
    /// Requested tables, checked against the exportable ones.
    pub fn tables_to_export(&self) -> Result<Vec<&'static str>> {
        let Some(requested) = &self.tables else {
            return Ok(EXPORT_TABLES.iter().map(|(table, _)| *table).collect());
        };

        let mut tables = Vec::with_capacity(requested.len());
        for name in requested {
            match EXPORT_TABLES.iter().find(|(table, _)| table == name) {
                Some((table, _)) => tables.push(*table),
                None => bail!(
                    "Unknown table {}, available tables: {}",
                    name,
                    EXPORT_TABLES
                        .iter()
                        .map(|(table, _)| *table)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }
        }
        Ok(tables)
    }

    /// Serialize the selected tables of `export`.
    pub fn render(&self, export: &Value) -> Result<String> {
        let mut selected = Map::new();
        for table in self.tables_to_export()? {
            selected.insert(
                table.to_string(),
                export.get(table).cloned().unwrap_or(Value::Array(Vec::new())),
            );
        }
        let selected = Value::Object(selected);
        Ok(if self.compact {
            serde_json::to_string(&selected)?
        } else {
            serde_json::to_string_pretty(&selected)?
        })
    }
}

pub fn run_export(db: &Database, args: &ExportArgs) -> Result<()> {
    let json = args.render(&db.export_json()?)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))?;
            info!("Exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
