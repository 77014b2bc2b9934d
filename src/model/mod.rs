//! Domain model: entities, date expressions and the recurrence engine.

pub mod date;
pub mod entity;
pub mod recurrence;
pub mod spawn;
pub mod task;

pub use entity::{Entity, Project, Tag};
pub use task::{Recurrence, RecurrenceType, Task, TaskAttributes, TaskKind};
