//! Task persistence, lookup and search.

use super::{Database, from_ms, from_ms_opt, to_ms};
use crate::config::FulidConfig;
use crate::error::TaskError;
use crate::fulid::{self, Fulid};
use crate::model::date;
use crate::model::task::{Recurrence, RecurrenceType, Task, TaskAttributes, TaskKind};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::debug;

const TASK_COLUMNS: &str = "id, type, description, state, created, closed, agile, body, due, \
     wait, estimate, fun, priority, value, willpower, project_id, parent_id, recurrence, \
     recurrence_type";

/// Fields accepted by [`Database::search_tasks`] and [`Database::msearch_tasks`].
pub const SEARCHABLE_FIELDS: &[&str] = &[
    "id",
    "type",
    "description",
    "state",
    "agile",
    "body",
    "due",
    "wait",
    "estimate",
    "fun",
    "priority",
    "value",
    "willpower",
    "project_id",
    "parent_id",
    "recurrence",
    "recurrence_type",
    "tag_ids",
];

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let id: String = row.get("id")?;
    let task_type: String = row.get("type")?;
    let recurrence: Option<String> = row.get("recurrence")?;
    let recurrence_type: Option<String> = row.get("recurrence_type")?;

    let kind = match (task_type.as_str(), recurrence_type) {
        ("recurrent_task", Some(recurrence_type)) => {
            let kind: RecurrenceType = recurrence_type.parse().map_err(|e: TaskError| {
                rusqlite::Error::FromSqlConversionFailure(18, Type::Text, Box::new(e))
            })?;
            TaskKind::Recurrent(Recurrence {
                rule: recurrence.unwrap_or_default(),
                kind,
            })
        }
        ("recurrent_task", None) => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                18,
                Type::Null,
                Box::new(TaskError::task_attribute(
                    "recurrence_type",
                    format!("Recurrent task {} has no recurrence_type", id),
                )),
            ));
        }
        _ => TaskKind::Simple,
    };

    let attributes = TaskAttributes {
        description: row.get("description")?,
        agile: row.get("agile")?,
        body: row.get("body")?,
        closed: from_ms_opt(row.get("closed")?)?,
        created: Some(from_ms(row.get("created")?)?),
        due: from_ms_opt(row.get("due")?)?,
        estimate: row.get("estimate")?,
        fun: row.get("fun")?,
        parent_id: row.get("parent_id")?,
        priority: row.get("priority")?,
        project_id: row.get("project_id")?,
        state: Some(row.get("state")?),
        tag_ids: Vec::new(),
        value: row.get("value")?,
        wait: from_ms_opt(row.get("wait")?)?,
        willpower: row.get("willpower")?,
        recurrence: None,
        recurrence_type: None,
    };

    Ok(Task::from_attributes(id, attributes, kind))
}

fn load_tag_ids(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT tag_id FROM task_tag WHERE task_id = ?1 ORDER BY tag_id")?;
    let tags = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(tags)
}

/// Fill tags, and for recurrent tasks the children in ascending id order.
fn hydrate(conn: &Connection, task: &mut Task) -> Result<()> {
    task.tag_ids = load_tag_ids(conn, &task.id)?;

    if task.is_recurrent() {
        let sql = format!("SELECT {} FROM task WHERE parent_id = ?1 ORDER BY id", TASK_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut children = stmt
            .query_map(params![task.id], parse_task_row)?
            .collect::<rusqlite::Result<Vec<Task>>>()?;
        for child in &mut children {
            child.tag_ids = load_tag_ids(conn, &child.id)?;
        }
        task.children = children;
    }
    Ok(())
}

fn query_tasks(conn: &Connection, sql: &str, values: &[String]) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let mut tasks = stmt
        .query_map(params_from_iter(values.iter()), parse_task_row)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;
    for task in &mut tasks {
        hydrate(conn, task)?;
    }
    Ok(tasks)
}

fn upsert_task(conn: &Connection, task: &Task) -> Result<()> {
    let now = to_ms(date::now());

    if let Some(project_id) = &task.project_id {
        conn.execute(
            "INSERT OR IGNORE INTO project (id, description, state, created) VALUES (?1, '', 'open', ?2)",
            params![project_id, now],
        )?;
    }

    let (recurrence, recurrence_type) = match task.recurrence() {
        Some(recurrence) => (Some(recurrence.rule.as_str()), Some(recurrence.kind.as_str())),
        None => (None, None),
    };

    conn.execute(
        "INSERT INTO task (id, type, description, state, created, closed, agile, body, due,
             wait, estimate, fun, priority, value, willpower, project_id, parent_id,
             recurrence, recurrence_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
         ON CONFLICT(id) DO UPDATE SET
             type = excluded.type,
             description = excluded.description,
             state = excluded.state,
             created = excluded.created,
             closed = excluded.closed,
             agile = excluded.agile,
             body = excluded.body,
             due = excluded.due,
             wait = excluded.wait,
             estimate = excluded.estimate,
             fun = excluded.fun,
             priority = excluded.priority,
             value = excluded.value,
             willpower = excluded.willpower,
             project_id = excluded.project_id,
             parent_id = excluded.parent_id,
             recurrence = excluded.recurrence,
             recurrence_type = excluded.recurrence_type",
        params![
            task.id,
            task.kind.type_name(),
            task.description,
            task.state,
            to_ms(task.created),
            task.closed.map(to_ms),
            task.agile(),
            task.body,
            task.due.map(to_ms),
            task.wait.map(to_ms),
            task.estimate,
            task.fun,
            task.priority,
            task.value,
            task.willpower,
            task.project_id,
            task.parent_id,
            recurrence,
            recurrence_type,
        ],
    )?;

    conn.execute("DELETE FROM task_tag WHERE task_id = ?1", params![task.id])?;
    for tag_id in &task.tag_ids {
        conn.execute(
            "INSERT OR IGNORE INTO tag (id, description, state, created) VALUES (?1, '', 'open', ?2)",
            params![tag_id, now],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO task_tag (task_id, tag_id) VALUES (?1, ?2)",
            params![task.id, tag_id],
        )?;
    }
    Ok(())
}

/// SQL condition for one search field. The value is bound as a suffix match.
fn search_condition(field: &str) -> Result<String> {
    if !SEARCHABLE_FIELDS.contains(&field) {
        return Err(TaskError::invalid_value(
            "filter",
            format!(
                "Can't search tasks by {}, valid fields are: {}",
                field,
                SEARCHABLE_FIELDS.join(", ")
            ),
        )
        .into());
    }
    Ok(match field {
        "tag_ids" => "EXISTS (SELECT 1 FROM task_tag tt WHERE tt.task_id = task.id \
                      AND tt.tag_id LIKE ?)"
            .to_string(),
        column => format!("task.{} LIKE ?", column),
    })
}

impl Database {
    /// Insert or update a task together with its tag links.
    ///
    /// Projects and tags the task references are created when missing.
    pub fn save_task(&self, task: &Task) -> Result<()> {
        self.save_tasks(&[task])
    }

    /// Save several tasks in one transaction, in order.
    pub fn save_tasks(&self, tasks: &[&Task]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for task in tasks {
                upsert_task(&tx, task)?;
                debug!(task = %task.id, state = %task.state, "saved task");
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Get a task by its full id, with tags and children loaded.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM task WHERE id = ?1", TASK_COLUMNS);
            let task = conn
                .query_row(&sql, params![task_id], parse_task_row)
                .optional()?;
            match task {
                Some(mut task) => {
                    hydrate(conn, &mut task)?;
                    Ok(Some(task))
                }
                None => Ok(None),
            }
        })
    }

    /// Get a task by full id or by the sulid of an open task.
    pub fn require_task(&self, id: &str) -> Result<Task> {
        self.require_task_in(id, crate::model::entity::STATE_OPEN)
    }

    /// Get a task by full id or by its sulid among tasks in `state`.
    pub fn require_task_in(&self, id: &str, state: &str) -> Result<Task> {
        let task_id = self.short_id_to_id(id, state)?;
        self.get_task(&task_id)?
            .ok_or_else(|| TaskError::entity_not_found("Task", &task_id).into())
    }

    /// Tasks whose `field` ends with `value`.
    pub fn search_tasks(&self, field: &str, value: &str) -> Result<Vec<Task>> {
        self.msearch_tasks(&[(field, value)])
    }

    /// Tasks matching every `(field, value)` condition, ordered by id.
    pub fn msearch_tasks<F, V>(&self, fields: &[(F, V)]) -> Result<Vec<Task>>
    where
        F: AsRef<str>,
        V: AsRef<str>,
    {
        let mut conditions = Vec::with_capacity(fields.len());
        let mut values = Vec::with_capacity(fields.len());
        for (field, value) in fields {
            conditions.push(search_condition(field.as_ref())?);
            values.push(format!("%{}", value.as_ref()));
        }

        let mut sql = format!("SELECT {} FROM task", TASK_COLUMNS);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        self.with_conn(|conn| query_tasks(conn, &sql, &values))
    }

    /// Tasks in `state`, ordered by id.
    pub fn list_tasks(&self, state: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM task WHERE state = ?1 ORDER BY id", TASK_COLUMNS);
            query_tasks(conn, &sql, &[state.to_string()])
        })
    }

    pub fn all_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM task ORDER BY id", TASK_COLUMNS);
            query_tasks(conn, &sql, &[])
        })
    }

    fn task_ids(&self, state: Option<&str>) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let ids = match state {
                Some(state) => {
                    let mut stmt = conn.prepare("SELECT id FROM task WHERE state = ?1 ORDER BY id")?;
                    stmt.query_map(params![state], |row| row.get(0))?
                        .collect::<rusqlite::Result<Vec<String>>>()?
                }
                None => {
                    let mut stmt = conn.prepare("SELECT id FROM task ORDER BY id")?;
                    stmt.query_map([], |row| row.get(0))?
                        .collect::<rusqlite::Result<Vec<String>>>()?
                }
            };
            Ok(ids)
        })
    }

    /// Id for the next task.
    ///
    /// The counter continues from the newest open task; the timestamp never
    /// goes behind the newest task of any state.
    pub fn next_task_id(&self, config: &FulidConfig) -> Result<String> {
        let generator = Fulid::from_config(config)?;
        let last_open = self.task_ids(Some(crate::model::entity::STATE_OPEN))?.pop();
        let newest = self.task_ids(None)?.pop();

        let mut now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        if let Some(newest) = &newest {
            let newest_ms = fulid::timestamp(newest)?.timestamp_millis().max(0) as u64;
            now_ms = now_ms.max(newest_ms + 1);
        }

        debug!(last = ?last_open, "last open task id");
        Ok(generator.next_at(last_open.as_deref(), now_ms)?)
    }

    /// Expand a sulid among the tasks in `state`.
    ///
    /// Strings of ten characters or more are taken as full ids.
    pub fn short_id_to_id(&self, short_id: &str, state: &str) -> Result<String> {
        if short_id.len() >= 10 {
            return Ok(short_id.to_string());
        }

        let ids = self.task_ids(Some(state))?;
        if ids.is_empty() {
            return Err(TaskError::entity_not_found("Task", short_id)
                .with_field("id")
                .with_message(format!("There are no {} tasks", state))
                .into());
        }

        fulid::sulid_to_fulid(short_id, &ids).ok_or_else(|| {
            TaskError::entity_not_found("Task", short_id)
                .with_message(format!(
                    "There is no {} task with short_id {}",
                    state, short_id
                ))
                .into()
        })
    }
}
