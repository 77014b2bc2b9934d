//! Task, project and tag reports as plain-text tables or JSON.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::Config;
use crate::db::Database;
use crate::error::{TaskError, TaskResult};
use crate::fulid;
use crate::model::entity::{STATE_FROZEN, STATE_OPEN};
use crate::model::task::{RecurrenceType, Task};

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(TaskError::invalid_value(
                "format",
                format!("Unknown report format {}, use text or json", other),
            )),
        }
    }
}

/// A task attribute shown as a report column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Description,
    Agile,
    Project,
    Tags,
    Due,
    Recurrence,
    RecurrenceType,
    Estimate,
    Willpower,
    Fun,
    Value,
    Priority,
    Parent,
}

impl Column {
    pub fn label(&self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Description => "Description",
            Column::Agile => "Agile",
            Column::Project => "Project",
            Column::Tags => "Tags",
            Column::Due => "Due",
            Column::Recurrence => "Recur",
            Column::RecurrenceType => "RecurType",
            Column::Estimate => "Est",
            Column::Willpower => "WP",
            Column::Fun => "Fun",
            Column::Value => "Val",
            Column::Priority => "Pri",
            Column::Parent => "Parent",
        }
    }

    /// Key used in JSON output.
    pub fn key(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Description => "description",
            Column::Agile => "agile",
            Column::Project => "project_id",
            Column::Tags => "tag_ids",
            Column::Due => "due",
            Column::Recurrence => "recurrence",
            Column::RecurrenceType => "recurrence_type",
            Column::Estimate => "estimate",
            Column::Willpower => "willpower",
            Column::Fun => "fun",
            Column::Value => "value",
            Column::Priority => "priority",
            Column::Parent => "parent_id",
        }
    }

    fn cell(&self, task: &Task, ctx: &CellContext<'_>) -> Option<String> {
        match self {
            Column::Id => Some(ctx.short_id(&task.id)),
            Column::Description => task.description.clone(),
            Column::Agile => task.agile().map(str::to_string),
            Column::Project => task.project_id.clone(),
            Column::Tags => (!task.tag_ids.is_empty()).then(|| task.tag_ids.join(", ")),
            Column::Due => task.due.map(|due| ctx.date(due)),
            Column::Recurrence => task.recurrence().map(|r| r.rule.clone()),
            Column::RecurrenceType => task.recurrence().map(|r| r.kind.to_string()),
            Column::Estimate => task.estimate.map(|v| v.to_string()),
            Column::Willpower => task.willpower.map(|v| v.to_string()),
            Column::Fun => task.fun.map(|v| v.to_string()),
            Column::Value => task.value.map(|v| v.to_string()),
            Column::Priority => task.priority.map(|v| v.to_string()),
            Column::Parent => task.parent_id.as_ref().map(|id| ctx.short_id(id)),
        }
    }
}

pub const OPEN_COLUMNS: &[Column] = &[
    Column::Id,
    Column::Description,
    Column::Agile,
    Column::Project,
    Column::Tags,
    Column::Due,
    Column::Estimate,
    Column::Willpower,
    Column::Fun,
    Column::Value,
    Column::Priority,
    Column::Parent,
];

pub const RECURRENT_COLUMNS: &[Column] = &[
    Column::Id,
    Column::Description,
    Column::Recurrence,
    Column::Due,
    Column::Project,
    Column::Tags,
    Column::Priority,
];

pub const FROZEN_COLUMNS: &[Column] = &[
    Column::Id,
    Column::Description,
    Column::Recurrence,
    Column::RecurrenceType,
    Column::Due,
    Column::Project,
    Column::Tags,
    Column::Priority,
];

struct CellContext<'a> {
    sulids: HashMap<String, String>,
    date_format: &'a str,
}

impl CellContext<'_> {
    fn short_id(&self, id: &str) -> String {
        self.sulids
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn date(&self, date: NaiveDateTime) -> String {
        date.format(self.date_format).to_string()
    }
}

/// A table ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub headers: Vec<&'static str>,
    /// JSON keys, parallel to `headers`.
    pub keys: Vec<&'static str>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self, format: OutputFormat) -> TaskResult<String> {
        match format {
            OutputFormat::Text => Ok(self.to_text()),
            OutputFormat::Json => Ok(format!(
                "{}\n",
                serde_json::to_string_pretty(&self.to_json())?
            )),
        }
    }

    /// Rows as JSON objects; empty cells become `null`.
    pub fn to_json(&self) -> Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                for (key, cell) in self.keys.iter().zip(row) {
                    let value = cell.clone().map(Value::String).unwrap_or(Value::Null);
                    object.insert(key.to_string(), value);
                }
                Value::Object(object)
            })
            .collect();
        Value::Array(rows)
    }

    /// Left-aligned columns separated by two spaces, with a dashed rule
    /// under the headers.
    pub fn to_text(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                let len = cell.as_deref().map_or(0, |c| c.chars().count());
                *width = (*width).max(len);
            }
        }

        let line = |cells: Vec<&str>| -> String {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect();
            padded.join("  ").trim_end().to_string()
        };

        let mut out = String::new();
        out.push_str(&line(self.headers.clone()));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&line(rule.iter().map(String::as_str).collect()));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&line(row.iter().map(|c| c.as_deref().unwrap_or("")).collect()));
            out.push('\n');
        }
        out
    }
}

/// Build a task table: newest first, ids shortened to sulids unique among
/// `id_universe`, columns that are empty for every task dropped.
pub fn task_report(
    tasks: &[Task],
    columns: &[Column],
    id_universe: &[String],
    date_format: &str,
) -> Report {
    let ctx = CellContext {
        sulids: fulid::sulids(id_universe),
        date_format,
    };

    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by(|a, b| b.id.cmp(&a.id));

    let cells: Vec<Vec<Option<String>>> = sorted
        .iter()
        .map(|task| columns.iter().map(|c| c.cell(task, &ctx)).collect())
        .collect();

    let kept: Vec<usize> = (0..columns.len())
        .filter(|&i| cells.iter().any(|row| row[i].is_some()))
        .collect();

    Report {
        headers: kept.iter().map(|&i| columns[i].label()).collect(),
        keys: kept.iter().map(|&i| columns[i].key()).collect(),
        rows: cells
            .into_iter()
            .map(|row| kept.iter().map(|&i| row[i].clone()).collect())
            .collect(),
    }
}

fn ids(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|t| t.id.clone()).collect()
}

/// Open tasks that are not recurrent parents.
pub fn open_report(db: &Database, config: &Config) -> TaskResult<Report> {
    let open = db.list_tasks(STATE_OPEN)?;
    let universe = ids(&open);
    let tasks: Vec<Task> = open.into_iter().filter(|t| !t.is_recurrent()).collect();
    Ok(task_report(
        &tasks,
        OPEN_COLUMNS,
        &universe,
        &config.report.date_format,
    ))
}

/// Open recurrent parents of one kind.
pub fn recurrent_report(
    db: &Database,
    config: &Config,
    kind: RecurrenceType,
) -> TaskResult<Report> {
    let open = db.list_tasks(STATE_OPEN)?;
    let universe = ids(&open);
    let tasks: Vec<Task> = open
        .into_iter()
        .filter(|t| t.recurrence().is_some_and(|r| r.kind == kind))
        .collect();
    Ok(task_report(
        &tasks,
        RECURRENT_COLUMNS,
        &universe,
        &config.report.date_format,
    ))
}

pub fn frozen_report(db: &Database, config: &Config) -> TaskResult<Report> {
    let frozen = db.list_tasks(STATE_FROZEN)?;
    let universe = ids(&frozen);
    Ok(task_report(
        &frozen,
        FROZEN_COLUMNS,
        &universe,
        &config.report.date_format,
    ))
}

fn count_report(entries: Vec<(String, usize, Option<String>)>) -> Report {
    Report {
        headers: vec!["Name", "Tasks", "Description"],
        keys: vec!["id", "open_tasks", "description"],
        rows: entries
            .into_iter()
            .map(|(id, count, description)| {
                vec![Some(id), Some(count.to_string()), description]
            })
            .collect(),
    }
}

/// Projects with open tasks, plus a `None` row for open tasks without one.
pub fn projects_report(db: &Database) -> TaskResult<Report> {
    let mut entries = Vec::new();

    let without_project = db.count_open_tasks_without_project()?;
    if without_project > 0 {
        entries.push((
            "None".to_string(),
            without_project,
            Some("Tasks without project".to_string()),
        ));
    }

    let mut projects = db.list_projects()?;
    projects.reverse();
    entries.extend(
        projects
            .into_iter()
            .filter(|p| p.open_tasks > 0)
            .map(|p| (p.entity.id, p.open_tasks, p.entity.description)),
    );
    Ok(count_report(entries))
}

/// Tags with open tasks.
pub fn tags_report(db: &Database) -> TaskResult<Report> {
    let mut tags = db.list_tags()?;
    tags.reverse();
    let entries = tags
        .into_iter()
        .filter(|t| t.open_tasks > 0)
        .map(|t| (t.entity.id, t.open_tasks, t.entity.description))
        .collect();
    Ok(count_report(entries))
}
