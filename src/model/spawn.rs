//! Breeding of child tasks from a recurrent parent.

use chrono::NaiveDateTime;
use tracing::debug;

use super::date;
use super::recurrence::next_due_at;
use super::task::{Task, TaskAttributes, TaskKind};
use crate::error::{TaskError, TaskResult};

impl TaskAttributes {
    /// Attributes a child inherits from `parent`.
    ///
    /// Everything is copied except identity (`id`, `created`), hierarchy
    /// (`children`, the parent's own `parent_id`) and recurrence data, which
    /// only lives in the parent's [`TaskKind`].
    pub fn inherited_from(parent: &Task) -> Self {
        Self {
            description: parent.description.clone(),
            agile: parent.agile().map(str::to_string),
            body: parent.body.clone(),
            closed: parent.closed,
            created: None,
            due: parent.due,
            estimate: parent.estimate,
            fun: parent.fun,
            parent_id: Some(parent.id.clone()),
            priority: parent.priority,
            project_id: parent.project_id.clone(),
            state: Some(parent.state.clone()),
            tag_ids: parent.tag_ids.clone(),
            value: parent.value,
            wait: parent.wait,
            willpower: parent.willpower,
            recurrence: None,
            recurrence_type: None,
        }
    }
}

impl Task {
    /// Create the next child of this recurrent task with id `child_id`.
    ///
    /// The child is appended to `children` and a copy is returned for the
    /// caller to persist.
    pub fn breed_children(&mut self, child_id: impl Into<String>) -> TaskResult<Task> {
        self.breed_children_at(child_id, date::now())
    }

    /// Like [`Task::breed_children`], with an explicit current time.
    pub fn breed_children_at(
        &mut self,
        child_id: impl Into<String>,
        now: NaiveDateTime,
    ) -> TaskResult<Task> {
        let child_id = child_id.into();
        if child_id == self.id {
            return Err(TaskError::invalid_value(
                "id",
                format!("Child task can't reuse the id {} of its parent", self.id),
            ));
        }

        let due = next_due_at(self, now)?;
        let mut attributes = TaskAttributes::inherited_from(self);
        attributes.due = Some(due);

        let child = Task::from_attributes(child_id, attributes, TaskKind::Simple);
        debug!(parent = %self.id, child = %child.id, due = %due, "bred child task");

        self.children.push(child.clone());
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::entity::{Entity, STATE_COMPLETED};
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn parent(kind: &str) -> Task {
        Task::new(
            "01parent",
            TaskAttributes {
                description: Some("Clean the house".to_string()),
                agile: Some("todo".to_string()),
                body: Some("Kitchen first".to_string()),
                due: Some(at(1800, 8, 2)),
                estimate: Some(2.5),
                priority: Some(3),
                project_id: Some("house".to_string()),
                tag_ids: vec!["chore".to_string(), "weekend".to_string()],
                recurrence: Some("1mo".to_string()),
                recurrence_type: Some(kind.to_string()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn recurring_child_due_skips_to_next_future_occurrence() {
        let mut task = parent("recurring");
        let child = task.breed_children_at("01child", at(2017, 5, 21)).unwrap();
        assert_eq!(child.due, Some(at(2017, 6, 2)));
    }

    #[test]
    fn repeating_child_due_follows_last_close() {
        let mut task = parent("repeating");
        let first = task.breed_children_at("01child1", at(2020, 1, 1)).unwrap();
        assert_eq!(first.due, Some(at(1800, 8, 2)));

        task.children[0].close(STATE_COMPLETED, at(2020, 8, 2));
        let second = task.breed_children_at("01child2", at(2020, 1, 1)).unwrap();
        assert_eq!(second.due, Some(at(2020, 9, 2)));
    }

    #[test]
    fn child_is_simple_and_linked_to_parent() {
        let mut task = parent("recurring");
        let child = task.breed_children_at("01child", at(2017, 5, 21)).unwrap();

        assert_eq!(child.kind, TaskKind::Simple);
        assert!(child.recurrence().is_none());
        assert_eq!(child.parent_id.as_deref(), Some("01parent"));
        assert_ne!(child.id, task.id);
        assert!(child.children.is_empty());
    }

    #[test]
    fn child_inherits_plain_attributes() {
        let mut task = parent("recurring");
        let child = task.breed_children_at("01child", at(2017, 5, 21)).unwrap();

        assert_eq!(child.description, task.description);
        assert_eq!(child.agile(), Some("todo"));
        assert_eq!(child.body, task.body);
        assert_eq!(child.estimate, Some(2.5));
        assert_eq!(child.priority, Some(3));
        assert_eq!(child.project_id.as_deref(), Some("house"));
        assert_eq!(child.tag_ids, task.tag_ids);
        assert_eq!(child.state, task.state);
    }

    #[test]
    fn child_is_appended_to_parent() {
        let mut task = parent("recurring");
        task.breed_children_at("01child1", at(2017, 5, 21)).unwrap();
        task.breed_children_at("01child2", at(2017, 5, 21)).unwrap();
        let ids: Vec<&str> = task.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["01child1", "01child2"]);
    }

    #[test]
    fn inherited_attributes_drop_recurrence() {
        let task = parent("repeating");
        let attributes = TaskAttributes::inherited_from(&task);
        assert!(attributes.recurrence.is_none());
        assert!(attributes.recurrence_type.is_none());
        assert!(attributes.created.is_none());
    }

    #[test]
    fn errors_propagate_through_breeding() {
        let mut simple = Task::new("01simple", TaskAttributes::default()).unwrap();
        let err = simple.breed_children_at("01child", at(2020, 1, 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
        assert!(simple.children.is_empty());

        let mut task = parent("recurring");
        let err = task.breed_children_at("01parent", at(2020, 1, 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }
}
