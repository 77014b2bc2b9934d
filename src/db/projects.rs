//! Projects and tags.

use super::{Database, from_ms, from_ms_opt, to_ms};
use crate::model::entity::{Project, STATE_OPEN, Tag};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

/// An entity with the number of open tasks that reference it.
#[derive(Debug, Clone, Serialize)]
pub struct WithOpenTasks<T> {
    #[serde(flatten)]
    pub entity: T,
    pub open_tasks: usize,
}

fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        description: row.get("description")?,
        state: row.get("state")?,
        created: from_ms(row.get("created")?)?,
        closed: from_ms_opt(row.get("closed")?)?,
    })
}

fn parse_tag_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        description: row.get("description")?,
        state: row.get("state")?,
        created: from_ms(row.get("created")?)?,
        closed: from_ms_opt(row.get("closed")?)?,
    })
}

type EntityRow<'a> = (&'a str, Option<&'a str>, &'a str, i64, Option<i64>);

fn upsert(conn: &Connection, table: &str, values: EntityRow<'_>) -> Result<()> {
    let (id, description, state, created, closed) = values;
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, description, state, created, closed)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 description = excluded.description,
                 state = excluded.state,
                 closed = excluded.closed"
        ),
        params![id, description, state, created, closed],
    )?;
    Ok(())
}

impl Database {
    pub fn save_project(&self, project: &Project) -> Result<()> {
        self.with_conn(|conn| {
            upsert(
                conn,
                "project",
                (
                    project.id.as_str(),
                    project.description.as_deref(),
                    project.state.as_str(),
                    to_ms(project.created),
                    project.closed.map(to_ms),
                ),
            )
        })
    }

    pub fn save_tag(&self, tag: &Tag) -> Result<()> {
        self.with_conn(|conn| {
            upsert(
                conn,
                "tag",
                (
                    tag.id.as_str(),
                    tag.description.as_deref(),
                    tag.state.as_str(),
                    to_ms(tag.created),
                    tag.closed.map(to_ms),
                ),
            )
        })
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            let project = conn
                .query_row(
                    "SELECT id, description, state, created, closed FROM project WHERE id = ?1",
                    params![id],
                    parse_project_row,
                )
                .optional()?;
            Ok(project)
        })
    }

    pub fn get_tag(&self, id: &str) -> Result<Option<Tag>> {
        self.with_conn(|conn| {
            let tag = conn
                .query_row(
                    "SELECT id, description, state, created, closed FROM tag WHERE id = ?1",
                    params![id],
                    parse_tag_row,
                )
                .optional()?;
            Ok(tag)
        })
    }

    /// All projects with their open task counts, ordered by id.
    pub fn list_projects(&self) -> Result<Vec<WithOpenTasks<Project>>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.description, p.state, p.created, p.closed,
                        (SELECT COUNT(*) FROM task t WHERE t.project_id = p.id AND t.state = ?1)
                            AS open_tasks
                 FROM project p ORDER BY p.id",
            )?;
            let projects = stmt
                .query_map(params![STATE_OPEN], |row| {
                    Ok(WithOpenTasks {
                        entity: parse_project_row(row)?,
                        open_tasks: row.get::<_, i64>("open_tasks")? as usize,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    /// All tags with their open task counts, ordered by id.
    pub fn list_tags(&self) -> Result<Vec<WithOpenTasks<Tag>>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.description, g.state, g.created, g.closed,
                        (SELECT COUNT(*) FROM task_tag tt JOIN task t ON t.id = tt.task_id
                         WHERE tt.tag_id = g.id AND t.state = ?1) AS open_tasks
                 FROM tag g ORDER BY g.id",
            )?;
            let tags = stmt
                .query_map(params![STATE_OPEN], |row| {
                    Ok(WithOpenTasks {
                        entity: parse_tag_row(row)?,
                        open_tasks: row.get::<_, i64>("open_tasks")? as usize,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tags)
        })
    }

    /// Open tasks that belong to no project.
    pub fn count_open_tasks_without_project(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM task WHERE project_id IS NULL AND state = ?1",
                params![STATE_OPEN],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}
