//! Task entity: simple tasks and recurrent parents.
//!
//! A recurrent task keeps a recurrence rule in the date expression grammar
//! (see [`super::date`]) and breeds simple child tasks, one per occurrence.
//! Only the [`TaskKind::Recurrent`] variant carries recurrence data.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::date;
use super::entity::{Entity, STATE_OPEN, entity_identity};
use crate::error::{TaskError, TaskResult};

/// Agile states accepted when the configuration does not override them.
pub const DEFAULT_AGILE_STATES: &[&str] = &["backlog", "complete", "doing", "review", "todo"];

/// How the next occurrence of a recurrent task is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    /// From the parent's own schedule, skipping missed occurrences.
    Recurring,
    /// From the moment the previous occurrence was closed.
    Repeating,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Recurring => "recurring",
            RecurrenceType::Repeating => "repeating",
        }
    }
}

impl FromStr for RecurrenceType {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recurring" => Ok(RecurrenceType::Recurring),
            "repeating" => Ok(RecurrenceType::Repeating),
            _ => Err(TaskError::task_attribute(
                "recurrence_type",
                "recurrence_type must be either recurring or repeating",
            )),
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence data of a recurrent parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Time between occurrences, e.g. `1mo` or `1rmo`.
    #[serde(rename = "recurrence")]
    pub rule: String,
    #[serde(rename = "recurrence_type")]
    pub kind: RecurrenceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskKind {
    #[serde(rename = "task")]
    Simple,
    #[serde(rename = "recurrent_task")]
    Recurrent(Recurrence),
}

impl TaskKind {
    /// Name stored in the `type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskKind::Simple => "task",
            TaskKind::Recurrent(_) => "recurrent_task",
        }
    }
}

/// Loose attribute set used to build a task.
///
/// Produced by the argument parser and by child spawning; every field is
/// optional and validated when the task is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskAttributes {
    pub description: Option<String>,
    pub agile: Option<String>,
    pub body: Option<String>,
    pub closed: Option<NaiveDateTime>,
    pub created: Option<NaiveDateTime>,
    pub due: Option<NaiveDateTime>,
    pub estimate: Option<f64>,
    pub fun: Option<i32>,
    pub parent_id: Option<String>,
    pub priority: Option<i32>,
    pub project_id: Option<String>,
    pub state: Option<String>,
    pub tag_ids: Vec<String>,
    pub value: Option<i32>,
    pub wait: Option<NaiveDateTime>,
    pub willpower: Option<i32>,
    pub recurrence: Option<String>,
    pub recurrence_type: Option<String>,
}

/// A task, simple or recurrent.
///
/// `children` is filled by the database layer and appended to when a
/// recurrent parent breeds. The parent of a child is only known through
/// `parent_id`; callers load it when they need it.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    pub description: Option<String>,
    pub state: String,
    pub created: NaiveDateTime,
    pub closed: Option<NaiveDateTime>,
    agile: Option<String>,
    pub body: Option<String>,
    pub due: Option<NaiveDateTime>,
    pub wait: Option<NaiveDateTime>,
    pub estimate: Option<f64>,
    pub fun: Option<i32>,
    pub priority: Option<i32>,
    pub value: Option<i32>,
    pub willpower: Option<i32>,
    pub project_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Task>,
    #[serde(flatten)]
    pub kind: TaskKind,
}

/// Fail unless `agile` is unset or one of `allowed`.
pub fn check_agile<S: AsRef<str>>(agile: Option<&str>, allowed: &[S]) -> TaskResult<()> {
    match agile {
        Some(state) if !allowed.iter().any(|a| a.as_ref() == state) => {
            let allowed: Vec<&str> = allowed.iter().map(|a| a.as_ref()).collect();
            Err(TaskError::invalid_value(
                "agile",
                format!(
                    "Agile state {} is not in the allowed agile states: {}",
                    state,
                    allowed.join(", ")
                ),
            ))
        }
        _ => Ok(()),
    }
}

impl Task {
    /// Build a task, validating agile against the default states.
    ///
    /// A `recurrence_type` in the attributes makes it a recurrent task.
    pub fn new(id: impl Into<String>, attributes: TaskAttributes) -> TaskResult<Self> {
        Self::with_agile_states(id, attributes, DEFAULT_AGILE_STATES)
    }

    /// Build a task, validating agile against `allowed`.
    pub fn with_agile_states<S: AsRef<str>>(
        id: impl Into<String>,
        attributes: TaskAttributes,
        allowed: &[S],
    ) -> TaskResult<Self> {
        check_agile(attributes.agile.as_deref(), allowed)?;

        let kind = match attributes.recurrence_type.as_deref() {
            None => TaskKind::Simple,
            Some(recurrence_type) => {
                if attributes.due.is_none() {
                    return Err(TaskError::task_attribute(
                        "due",
                        format!("You need to specify a due date for {} tasks", recurrence_type),
                    ));
                }
                TaskKind::Recurrent(Recurrence {
                    rule: attributes.recurrence.clone().unwrap_or_default(),
                    kind: recurrence_type.parse()?,
                })
            }
        };

        Ok(Self::from_attributes(id, attributes, kind))
    }

    pub(crate) fn from_attributes(
        id: impl Into<String>,
        attributes: TaskAttributes,
        kind: TaskKind,
    ) -> Self {
        Self {
            id: id.into(),
            description: attributes.description,
            state: attributes.state.unwrap_or_else(|| STATE_OPEN.to_string()),
            created: attributes.created.unwrap_or_else(date::now),
            closed: attributes.closed,
            agile: attributes.agile,
            body: attributes.body,
            due: attributes.due,
            wait: attributes.wait,
            estimate: attributes.estimate,
            fun: attributes.fun,
            priority: attributes.priority,
            value: attributes.value,
            willpower: attributes.willpower,
            project_id: attributes.project_id,
            tag_ids: attributes.tag_ids,
            parent_id: attributes.parent_id,
            children: Vec::new(),
            kind,
        }
    }

    pub fn agile(&self) -> Option<&str> {
        self.agile.as_deref()
    }

    /// Assign the agile state, checked against the default states.
    pub fn set_agile(&mut self, agile: Option<String>) -> TaskResult<()> {
        self.set_agile_within(agile, DEFAULT_AGILE_STATES)
    }

    pub fn set_agile_within<S: AsRef<str>>(
        &mut self,
        agile: Option<String>,
        allowed: &[S],
    ) -> TaskResult<()> {
        check_agile(agile.as_deref(), allowed)?;
        self.agile = agile;
        Ok(())
    }

    pub fn recurrence(&self) -> Option<&Recurrence> {
        match &self.kind {
            TaskKind::Recurrent(recurrence) => Some(recurrence),
            TaskKind::Simple => None,
        }
    }

    pub fn is_recurrent(&self) -> bool {
        matches!(self.kind, TaskKind::Recurrent(_))
    }

    /// Change how a recurrent task schedules its children.
    pub fn set_recurrence_type(&mut self, recurrence_type: &str) -> TaskResult<()> {
        let kind: RecurrenceType = recurrence_type.parse()?;
        match &mut self.kind {
            TaskKind::Recurrent(recurrence) => {
                recurrence.kind = kind;
                Ok(())
            }
            TaskKind::Simple => Err(TaskError::task_attribute(
                "recurrence_type",
                format!("Task {} is not a recurrent task", self.id),
            )),
        }
    }

    /// Children that are still open.
    pub fn open_children(&self) -> impl Iterator<Item = &Task> {
        self.children.iter().filter(|child| child.is_open())
    }
}

entity_identity!(Task);

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn state(&self) -> &str {
        &self.state
    }

    fn closed(&self) -> Option<NaiveDateTime> {
        self.closed
    }

    /// Closing a recurrent parent closes all of its children the same way.
    fn close(&mut self, state: &str, close_date: NaiveDateTime) {
        self.closed = Some(close_date);
        self.state = state.to_string();

        if self.is_recurrent() {
            for child in &mut self.children {
                child.close(state, close_date);
            }
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Task {}>", self.id)
    }
}
