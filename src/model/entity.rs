//! Common entity behavior and the plain entities: projects and tags.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::date;

pub const STATE_OPEN: &str = "open";
pub const STATE_COMPLETED: &str = "completed";
pub const STATE_DELETED: &str = "deleted";
pub const STATE_FROZEN: &str = "frozen";

/// States an entity can be in when no configuration overrides them.
pub const DEFAULT_STATES: &[&str] = &[STATE_OPEN, STATE_COMPLETED, STATE_DELETED, STATE_FROZEN];

/// Shared surface of every stored entity.
///
/// Entities are identified, compared and ordered by `id` alone; ids sort by
/// creation time.
pub trait Entity {
    fn id(&self) -> &str;
    fn description(&self) -> Option<&str>;
    fn state(&self) -> &str;
    fn closed(&self) -> Option<NaiveDateTime>;

    /// Set `closed` and `state`. The state is not validated.
    fn close(&mut self, state: &str, close_date: NaiveDateTime);

    fn close_now(&mut self, state: &str) {
        self.close(state, date::now());
    }

    fn is_open(&self) -> bool {
        self.state() == STATE_OPEN
    }
}

/// Implements id based equality, ordering and hashing.
macro_rules! entity_identity {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $ty {}

        impl PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $ty {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.id.cmp(&other.id)
            }
        }

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }
    };
}

pub(crate) use entity_identity;

/// Hierarchical grouping of tasks. The id is the project name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub description: Option<String>,
    pub state: String,
    pub created: NaiveDateTime,
    pub closed: Option<NaiveDateTime>,
}

/// Free-form label attached to tasks. The id is the tag name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub description: Option<String>,
    pub state: String,
    pub created: NaiveDateTime,
    pub closed: Option<NaiveDateTime>,
}

impl Project {
    pub fn new(id: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: id.into(),
            description,
            state: STATE_OPEN.to_string(),
            created: date::now(),
            closed: None,
        }
    }
}

impl Tag {
    pub fn new(id: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: id.into(),
            description,
            state: STATE_OPEN.to_string(),
            created: date::now(),
            closed: None,
        }
    }
}

entity_identity!(Project);
entity_identity!(Tag);

impl Entity for Project {
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

    fn close(&mut self, state: &str, close_date: NaiveDateTime) {
        self.closed = Some(close_date);
        self.state = state.to_string();
    }
}

impl Entity for Tag {
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

    fn close(&mut self, state: &str, close_date: NaiveDateTime) {
        self.closed = Some(close_date);
        self.state = state.to_string();
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Project {}>", self.id)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Tag {}>", self.id)
    }
}
