//! Due date of the next occurrence of a recurrent task.

use chrono::NaiveDateTime;
use tracing::debug;

use super::date;
use super::task::{Recurrence, RecurrenceType, Task};
use crate::error::{TaskError, TaskResult};

/// Next due date of `parent`, measured against the current time.
pub fn next_due(parent: &Task) -> TaskResult<NaiveDateTime> {
    next_due_at(parent, date::now())
}

/// Next due date of `parent`.
///
/// `recurring` parents step their rule from `due` until the result is after
/// `now`, so missed occurrences are skipped. `repeating` parents apply the
/// rule once to the close date of their latest child, or use their own `due`
/// when nothing has been closed yet.
pub fn next_due_at(parent: &Task, now: NaiveDateTime) -> TaskResult<NaiveDateTime> {
    let recurrence = parent.recurrence().ok_or_else(|| {
        TaskError::invalid_value(
            "type",
            format!("Task {} is not a recurrent task", parent.id),
        )
    })?;
    if recurrence.rule.trim().is_empty() {
        return Err(TaskError::missing_recurrence(&parent.id));
    }

    let due = parent.due.ok_or_else(|| {
        TaskError::task_attribute(
            "due",
            format!(
                "You need to specify a due date for {} tasks",
                recurrence.kind
            ),
        )
    })?;

    let next = match recurrence.kind {
        RecurrenceType::Recurring => recurring_due(recurrence, due, now)?,
        RecurrenceType::Repeating => repeating_due(recurrence, parent, due)?,
    };
    debug!(task = %parent.id, kind = %recurrence.kind, due = %next, "computed next due date");
    Ok(next)
}

fn recurring_due(
    recurrence: &Recurrence,
    due: NaiveDateTime,
    now: NaiveDateTime,
) -> TaskResult<NaiveDateTime> {
    let mut last = due;
    let mut next = date::evaluate(&recurrence.rule, last)?;
    while next <= now {
        if next <= last {
            return Err(TaskError::invalid_value(
                "recurrence",
                format!("Recurrence {} never moves the due date forward", recurrence.rule),
            ));
        }
        last = next;
        next = date::evaluate(&recurrence.rule, last)?;
    }
    Ok(next)
}

fn repeating_due(
    recurrence: &Recurrence,
    parent: &Task,
    due: NaiveDateTime,
) -> TaskResult<NaiveDateTime> {
    let last_closed = parent
        .children
        .iter()
        .filter(|child| child.closed.is_some())
        .max()
        .and_then(|child| child.closed);

    // Only closed children carry a reference point. With none closed yet the
    // schedule still starts from the parent's own due date.
    match last_closed {
        Some(closed) => date::evaluate(&recurrence.rule, closed),
        None => Ok(due),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::entity::{Entity, STATE_COMPLETED};
    use crate::model::task::TaskAttributes;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn parent(kind: &str, rule: &str, due: NaiveDateTime) -> Task {
        Task::new(
            "01parent",
            TaskAttributes {
                description: Some("Pay the rent".to_string()),
                due: Some(due),
                recurrence: Some(rule.to_string()),
                recurrence_type: Some(kind.to_string()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn closed_child(id: &str, closed: NaiveDateTime) -> Task {
        let mut child = Task::new(id, TaskAttributes::default()).unwrap();
        child.close(STATE_COMPLETED, closed);
        child
    }

    #[test]
    fn recurring_skips_missed_occurrences() {
        let task = parent("recurring", "1mo", at(1800, 8, 2));
        assert_eq!(next_due_at(&task, at(2017, 5, 21)).unwrap(), at(2017, 6, 2));
    }

    #[test]
    fn recurring_never_returns_the_present() {
        let task = parent("recurring", "1d", at(2020, 1, 1));
        assert_eq!(next_due_at(&task, at(2020, 1, 5)).unwrap(), at(2020, 1, 6));
    }

    #[test]
    fn recurring_due_in_the_future_advances_once() {
        let task = parent("recurring", "1w", at(2030, 1, 1));
        assert_eq!(next_due_at(&task, at(2020, 1, 1)).unwrap(), at(2030, 1, 8));
    }

    #[test]
    fn recurring_rejects_rules_that_do_not_advance() {
        let task = parent("recurring", "now", at(2000, 1, 1));
        let err = next_due_at(&task, at(2020, 1, 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }

    #[test]
    fn repeating_without_children_uses_parent_due() {
        let task = parent("repeating", "1mo", at(1800, 8, 2));
        assert_eq!(next_due_at(&task, at(2020, 1, 1)).unwrap(), at(1800, 8, 2));
    }

    #[test]
    fn repeating_drifts_from_close_date() {
        let mut task = parent("repeating", "1mo", at(1800, 8, 2));
        task.children.push(closed_child("01child", at(2020, 8, 2)));
        assert_eq!(next_due_at(&task, at(2000, 1, 1)).unwrap(), at(2020, 9, 2));
        assert_eq!(next_due_at(&task, at(2030, 1, 1)).unwrap(), at(2020, 9, 2));
    }

    #[test]
    fn repeating_uses_latest_child_by_id() {
        let mut task = parent("repeating", "1w", at(2020, 1, 1));
        task.children.push(closed_child("01b", at(2020, 3, 1)));
        task.children.push(closed_child("01a", at(2020, 5, 1)));
        assert_eq!(next_due_at(&task, at(2020, 1, 1)).unwrap(), at(2020, 3, 8));
    }

    #[test]
    fn repeating_ignores_open_children() {
        let mut task = parent("repeating", "1w", at(2020, 1, 1));
        task.children.push(closed_child("01a", at(2020, 2, 1)));
        task.children
            .push(Task::new("01b", TaskAttributes::default()).unwrap());
        assert_eq!(next_due_at(&task, at(2020, 1, 1)).unwrap(), at(2020, 2, 8));
    }

    #[test]
    fn repeating_with_only_open_children_uses_parent_due() {
        let mut task = parent("repeating", "1w", at(2020, 1, 6));
        task.children
            .push(Task::new("01a", TaskAttributes::default()).unwrap());
        assert_eq!(next_due_at(&task, at(2020, 3, 1)).unwrap(), at(2020, 1, 6));
    }

    #[test]
    fn blank_rule_is_missing_recurrence() {
        let task = parent("recurring", "", at(2020, 1, 1));
        let err = next_due_at(&task, at(2020, 1, 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRecurrence);
    }

    #[test]
    fn simple_task_has_no_next_due() {
        let task = Task::new("a", TaskAttributes::default()).unwrap();
        let err = next_due_at(&task, at(2020, 1, 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }

    #[test]
    fn unparseable_rule_propagates() {
        let mut task = parent("repeating", "3x", at(2020, 1, 1));
        task.children.push(closed_child("01a", at(2020, 2, 1)));
        let err = next_due_at(&task, at(2020, 1, 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DateParseError);
    }
}
