//! JSON dump of the database.
//!
//! Each table is read with deterministic ordering so successive exports of
//! the same data are identical.

use super::Database;
use anyhow::Result;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};
use tracing::debug;

/// Exported tables and the ordering used for each.
pub const EXPORT_TABLES: &[(&str, &str)] = &[
    ("project", "id"),
    ("tag", "id"),
    ("task", "id"),
    ("task_tag", "task_id, tag_id"),
];

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

fn export_table(conn: &Connection, table: &str, order_by: &str) -> Result<Vec<Value>> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY {}", table, order_by))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = stmt.query([])?;
    let mut exported = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::new();
        for (index, column) in columns.iter().enumerate() {
            object.insert(column.clone(), column_value(row.get_ref(index)?));
        }
        exported.push(Value::Object(object));
    }
    Ok(exported)
}

impl Database {
    /// Every table as `{"table": [{column: value, ...}, ...]}`.
    pub fn export_json(&self) -> Result<Value> {
        self.with_conn(|conn| {
            let mut export = Map::new();
            for (table, order_by) in EXPORT_TABLES {
                let rows = export_table(conn, table, order_by)?;
                debug!(table = *table, rows = rows.len(), "exported table");
                export.insert(table.to_string(), Value::Array(rows));
            }
            Ok(Value::Object(export))
        })
    }
}
