//! Parser for the `key:value` task arguments given on the command line.
//!
//! ```text
//! rudo add Water the plants due:tomorrow rec:1w pro:house +garden
//! ```
//!
//! Words that don't match a known key become the description when adding,
//! or task ids when filtering.

use chrono::NaiveDateTime;
use std::collections::BTreeSet;

use crate::db::to_ms;
use crate::error::{TaskError, TaskResult};
use crate::model::date;
use crate::model::task::{RecurrenceType, TaskAttributes};

/// What the unmatched words mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Words build the description.
    Add,
    /// Words are task ids or sulids.
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Agile,
    Body,
    Due,
    Estimate,
    Fun,
    Priority,
    Project,
    Recurring,
    Repeating,
    State,
    Value,
    Willpower,
}

const KEYS: &[(&str, Attribute)] = &[
    ("ag", Attribute::Agile),
    ("agile", Attribute::Agile),
    ("body", Attribute::Body),
    ("due", Attribute::Due),
    ("est", Attribute::Estimate),
    ("estimate", Attribute::Estimate),
    ("fun", Attribute::Fun),
    ("pri", Attribute::Priority),
    ("priority", Attribute::Priority),
    ("pro", Attribute::Project),
    ("project", Attribute::Project),
    ("rec", Attribute::Recurring),
    ("recurring", Attribute::Recurring),
    ("rep", Attribute::Repeating),
    ("repeating", Attribute::Repeating),
    ("state", Attribute::State),
    ("vl", Attribute::Value),
    ("value", Attribute::Value),
    ("wp", Attribute::Willpower),
    ("willpower", Attribute::Willpower),
];

impl Attribute {
    fn field(self) -> &'static str {
        match self {
            Attribute::Agile => "agile",
            Attribute::Body => "body",
            Attribute::Due => "due",
            Attribute::Estimate => "estimate",
            Attribute::Fun => "fun",
            Attribute::Priority => "priority",
            Attribute::Project => "project_id",
            Attribute::Recurring | Attribute::Repeating => "recurrence",
            Attribute::State => "state",
            Attribute::Value => "value",
            Attribute::Willpower => "willpower",
        }
    }
}

/// Parsed task arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskArguments {
    /// Attributes that were given a value. `tag_ids` holds `+tag` words.
    pub attributes: TaskAttributes,
    /// `-tag` words.
    pub tags_removed: Vec<String>,
    /// Unmatched words in [`ParseMode::Filter`].
    pub task_ids: Vec<String>,
    /// Fields given with an empty value, like `due:`.
    pub cleared: BTreeSet<&'static str>,
}

impl TaskArguments {
    /// `(field, value)` conditions for a task search.
    pub fn search_fields(&self) -> Vec<(&'static str, String)> {
        let a = &self.attributes;
        let mut fields = Vec::new();

        let mut push = |field: &'static str, value: Option<String>| {
            if let Some(value) = value {
                fields.push((field, value));
            }
        };
        push("agile", a.agile.clone());
        push("body", a.body.clone());
        push("due", a.due.map(|d| to_ms(d).to_string()));
        push("estimate", a.estimate.map(|e| e.to_string()));
        push("fun", a.fun.map(|v| v.to_string()));
        push("priority", a.priority.map(|v| v.to_string()));
        push("project_id", a.project_id.clone());
        push("recurrence", a.recurrence.clone());
        push("recurrence_type", a.recurrence_type.clone());
        push("state", a.state.clone());
        push("value", a.value.map(|v| v.to_string()));
        push("willpower", a.willpower.map(|v| v.to_string()));

        for tag in &a.tag_ids {
            fields.push(("tag_ids", tag.clone()));
        }
        fields
    }

    /// Whether any attribute condition was given.
    pub fn has_filters(&self) -> bool {
        !self.search_fields().is_empty()
    }
}

/// Parse `args` evaluating dates against the current time.
pub fn parse_task_arguments<S: AsRef<str>>(
    args: &[S],
    mode: ParseMode,
) -> TaskResult<TaskArguments> {
    parse_task_arguments_at(args, mode, date::now())
}

/// Parse `args`, evaluating `due:` expressions against `now`.
pub fn parse_task_arguments_at<S: AsRef<str>>(
    args: &[S],
    mode: ParseMode,
    now: NaiveDateTime,
) -> TaskResult<TaskArguments> {
    let mut parsed = TaskArguments::default();
    let mut words = Vec::new();

    for arg in args {
        let arg = arg.as_ref();
        if arg.is_empty() {
            continue;
        }

        if let Some(tag) = arg.strip_prefix('+') {
            parsed.attributes.tag_ids.push(tag_name(tag)?);
            continue;
        }
        if let Some(tag) = arg.strip_prefix('-') {
            parsed.tags_removed.push(tag_name(tag)?);
            continue;
        }

        let keyed = arg.split_once(':').and_then(|(key, value)| {
            KEYS.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, attribute)| (*attribute, value))
        });
        match keyed {
            Some((attribute, value)) => set_attribute(&mut parsed, attribute, value, now)?,
            None => words.push(arg.to_string()),
        }
    }

    match mode {
        ParseMode::Add => {
            if !words.is_empty() {
                parsed.attributes.description = Some(words.join(" "));
            }
        }
        ParseMode::Filter => parsed.task_ids = words,
    }
    Ok(parsed)
}

fn tag_name(tag: &str) -> TaskResult<String> {
    if tag.is_empty() {
        return Err(TaskError::invalid_value("tag_ids", "Empty tag value"));
    }
    Ok(tag.to_string())
}

fn parse_number<T: std::str::FromStr>(attribute: Attribute, value: &str) -> TaskResult<T> {
    value.parse().map_err(|_| {
        TaskError::invalid_value(
            attribute.field(),
            format!("{} is not a valid number for {}", value, attribute.field()),
        )
    })
}

fn set_attribute(
    parsed: &mut TaskArguments,
    attribute: Attribute,
    value: &str,
    now: NaiveDateTime,
) -> TaskResult<()> {
    if value.is_empty() {
        parsed.cleared.insert(attribute.field());
        return Ok(());
    }

    let a = &mut parsed.attributes;
    match attribute {
        Attribute::Agile => a.agile = Some(value.to_string()),
        Attribute::Body => a.body = Some(value.to_string()),
        Attribute::Due => a.due = Some(date::evaluate(value, now)?),
        Attribute::Estimate => a.estimate = Some(parse_number(attribute, value)?),
        Attribute::Fun => a.fun = Some(parse_number(attribute, value)?),
        Attribute::Priority => a.priority = Some(parse_number(attribute, value)?),
        Attribute::Project => a.project_id = Some(value.to_string()),
        Attribute::Recurring | Attribute::Repeating => {
            let kind = if attribute == Attribute::Recurring {
                RecurrenceType::Recurring
            } else {
                RecurrenceType::Repeating
            };
            a.recurrence = Some(value.to_string());
            a.recurrence_type = Some(kind.as_str().to_string());
        }
        Attribute::State => a.state = Some(value.to_string()),
        Attribute::Value => a.value = Some(parse_number(attribute, value)?),
        Attribute::Willpower => a.willpower = Some(parse_number(attribute, value)?),
    }
    Ok(())
}
