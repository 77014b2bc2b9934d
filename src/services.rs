//! Task operations behind the command line: add, close, freeze, modify.
//!
//! These glue the model to the database. Closing a child of a recurrent task
//! breeds the next child here, and unfreezing a recurrent parent re-seeds it
//! when it has no open child left.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::arguments::{ParseMode, TaskArguments, parse_task_arguments};
use crate::config::Config;
use crate::db::Database;
use crate::error::{TaskError, TaskResult};
use crate::model::date;
use crate::model::entity::{
    Entity, Project, STATE_COMPLETED, STATE_DELETED, STATE_FROZEN, STATE_OPEN, Tag,
};
use crate::model::task::{Task, TaskAttributes, TaskKind};

/// Result of [`TaskService::add_task`].
#[derive(Debug, Clone)]
pub enum AddedTask {
    Simple(Task),
    /// A recurrent parent and its first child.
    Recurrent { parent: Task, child: Task },
}

impl AddedTask {
    /// The task the user works on: the task itself or the first child.
    pub fn actionable(&self) -> &Task {
        match self {
            AddedTask::Simple(task) => task,
            AddedTask::Recurrent { child, .. } => child,
        }
    }
}

/// Task operations over one database with one configuration.
pub struct TaskService {
    db: Database,
    config: Config,
}

impl TaskService {
    pub fn new(db: Database, config: Config) -> Self {
        Self { db, config }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn check_state(&self, state: Option<&str>) -> TaskResult<()> {
        match state {
            Some(state) if !self.config.task.allowed_states.iter().any(|s| s == state) => {
                Err(TaskError::invalid_value(
                    "state",
                    format!(
                        "State {} is not in the allowed states: {}",
                        state,
                        self.config.task.allowed_states.join(", ")
                    ),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Like [`check_state`](Self::check_state), but terminal states are only
    /// reachable through `do` and `rm`, which also set the close date and run
    /// the recurrence hooks.
    fn check_assignable_state(&self, state: Option<&str>) -> TaskResult<()> {
        self.check_state(state)?;
        match state {
            Some(state) if state == STATE_COMPLETED || state == STATE_DELETED => {
                Err(TaskError::invalid_value(
                    "state",
                    format!(
                        "State {} can't be assigned directly, use `do` or `rm` to close tasks",
                        state
                    ),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Create the project and tags `task` references when missing.
    fn ensure_relations(&self, task: &Task) -> TaskResult<()> {
        if let Some(project_id) = &task.project_id {
            if self.db.get_project(project_id)?.is_none() {
                self.db
                    .save_project(&Project::new(project_id, Some(String::new())))?;
                info!("Added project {}", project_id);
            }
        }

        for tag_id in &task.tag_ids {
            if self.db.get_tag(tag_id)?.is_none() {
                self.db.save_tag(&Tag::new(tag_id, Some(String::new())))?;
                info!("Added tag {}", tag_id);
            }
        }
        Ok(())
    }

    /// Create a task from command line words.
    pub fn add(&self, args: &[String]) -> TaskResult<AddedTask> {
        let parsed = parse_task_arguments(args, ParseMode::Add)?;
        self.add_task(parsed.attributes)
    }

    /// Create a simple task, or a recurrent parent and its first child when
    /// `recurrence_type` is set.
    pub fn add_task(&self, attributes: TaskAttributes) -> TaskResult<AddedTask> {
        self.add_task_at(attributes, date::now())
    }

    pub fn add_task_at(
        &self,
        attributes: TaskAttributes,
        now: NaiveDateTime,
    ) -> TaskResult<AddedTask> {
        self.check_assignable_state(attributes.state.as_deref())?;
        if attributes.closed.is_some() {
            return Err(TaskError::task_attribute(
                "closed",
                "New tasks can't be created closed",
            ));
        }
        if attributes.recurrence_type.is_some()
            && attributes
                .recurrence
                .as_deref()
                .is_none_or(|rule| rule.trim().is_empty())
        {
            return Err(TaskError::task_attribute(
                "recurrence",
                "You need to specify a recurrence for recurrent tasks",
            ));
        }

        let id = self.db.next_task_id(&self.config.fulid)?;
        let mut task = Task::with_agile_states(id, attributes, &self.config.task.agile_states)?;
        self.ensure_relations(&task)?;

        if !task.is_recurrent() {
            self.db.save_task(&task)?;
            info!(
                "Added task {}: {}",
                task.id,
                task.description.as_deref().unwrap_or("")
            );
            return Ok(AddedTask::Simple(task));
        }

        self.db.save_task(&task)?;
        let child_id = self.db.next_task_id(&self.config.fulid)?;
        let child = task.breed_children_at(child_id, now)?;
        self.db.save_task(&child)?;

        if let Some(recurrence) = task.recurrence() {
            info!(
                "Added {} task {}: {}",
                recurrence.kind,
                task.id,
                task.description.as_deref().unwrap_or("")
            );
        }
        info!("Added first child task with id {}", child.id);

        Ok(AddedTask::Recurrent {
            parent: task,
            child,
        })
    }

    /// Tasks selected by a filter: explicit ids or sulids plus attribute
    /// conditions. Attribute conditions only match open tasks unless a
    /// `state:` is given.
    pub fn tasks_from_filter(&self, filter: &[String]) -> TaskResult<Vec<Task>> {
        let parsed = parse_task_arguments(filter, ParseMode::Filter)?;
        self.tasks_from_arguments(&parsed)
    }

    fn tasks_from_arguments(&self, parsed: &TaskArguments) -> TaskResult<Vec<Task>> {
        let mut tasks = Vec::new();
        for task_id in &parsed.task_ids {
            tasks.push(self.db.require_task(task_id)?);
        }

        if parsed.has_filters() {
            let mut fields = parsed.search_fields();
            if parsed.attributes.state.is_none() {
                fields.push(("state", STATE_OPEN.to_string()));
            }
            tasks.extend(self.db.msearch_tasks(&fields)?);
        }

        tasks.sort();
        tasks.dedup();
        Ok(tasks)
    }

    /// Complete the tasks matching `filter`.
    pub fn do_tasks(
        &self,
        filter: &[String],
        close_date: &str,
        delete_parent: bool,
    ) -> TaskResult<Vec<Task>> {
        self.close_tasks(filter, STATE_COMPLETED, close_date, delete_parent, date::now())
    }

    /// Delete the tasks matching `filter`.
    pub fn rm_tasks(
        &self,
        filter: &[String],
        close_date: &str,
        delete_parent: bool,
    ) -> TaskResult<Vec<Task>> {
        self.close_tasks(filter, STATE_DELETED, close_date, delete_parent, date::now())
    }

    /// Close the tasks matching `filter` with `state`.
    ///
    /// `close_date` is a date expression evaluated against `now`, which is
    /// also the reference for scheduling recurring children.
    pub fn close_tasks(
        &self,
        filter: &[String],
        state: &str,
        close_date: &str,
        delete_parent: bool,
        now: NaiveDateTime,
    ) -> TaskResult<Vec<Task>> {
        let tasks = self.tasks_from_filter(filter)?;
        if tasks.is_empty() {
            return Err(TaskError::entity_not_found("Task", &filter.join(" "))
                .with_message("No Tasks were found with that task filter"));
        }

        let close_date = date::evaluate(close_date, now)?;
        let mut closed = Vec::with_capacity(tasks.len());
        for task in tasks {
            closed.push(self.close_task(task, state, close_date, delete_parent, now)?);
        }
        Ok(closed)
    }

    /// Close one task and run the parent/child hooks.
    pub fn close_task(
        &self,
        mut task: Task,
        state: &str,
        close_date: NaiveDateTime,
        delete_parent: bool,
        now: NaiveDateTime,
    ) -> TaskResult<Task> {
        let was_open = task.is_open();
        task.close(state, close_date);

        if task.is_recurrent() {
            let mut batch: Vec<&Task> = vec![&task];
            batch.extend(task.children.iter());
            self.db.save_tasks(&batch)?;
            for child in &task.children {
                info!(
                    "Closed child task {}: {} with state {}",
                    child.id,
                    child.description.as_deref().unwrap_or(""),
                    state
                );
            }
            info!(
                "Closed parent task {}: {} with state {}",
                task.id,
                task.description.as_deref().unwrap_or(""),
                state
            );
            return Ok(task);
        }

        self.db.save_task(&task)?;

        let Some(parent_id) = task.parent_id.clone() else {
            info!(
                "Closed task {}: {} with state {}",
                task.id,
                task.description.as_deref().unwrap_or(""),
                state
            );
            if delete_parent {
                warn!("Task {} doesn't have a parent", task.id);
            }
            return Ok(task);
        };

        info!(
            "Closed child task {}: {} with state {}",
            task.id,
            task.description.as_deref().unwrap_or(""),
            state
        );

        let mut parent = self
            .db
            .get_task(&parent_id)?
            .ok_or_else(|| TaskError::entity_not_found("Task", &parent_id))?;

        if delete_parent {
            parent.close(state, close_date);
            let mut batch: Vec<&Task> = vec![&parent];
            batch.extend(parent.children.iter());
            self.db.save_tasks(&batch)?;
            info!(
                "Closed parent task {}: {} with state {}",
                parent.id,
                parent.description.as_deref().unwrap_or(""),
                state
            );
        } else if parent.is_recurrent() && was_open && parent.is_open() {
            let child_id = self.db.next_task_id(&self.config.fulid)?;
            let child = parent.breed_children_at(child_id, now)?;
            self.db.save_task(&child)?;
            info!(
                "Added child task {}: {}",
                child.id,
                child.description.as_deref().unwrap_or("")
            );
        }

        Ok(task)
    }

    /// Look a task up by id or sulid among the tasks in any of `states`.
    fn resolve(&self, id: &str, states: &[&str]) -> TaskResult<Task> {
        let mut last_error = None;
        for state in states {
            match self.db.require_task_in(id, state) {
                Ok(task) => return Ok(task),
                Err(err) => last_error = Some(TaskError::from(err)),
            }
        }
        Err(last_error.unwrap_or_else(|| TaskError::entity_not_found("Task", id)))
    }

    fn parent_of(&self, task: &Task) -> TaskResult<Option<Task>> {
        match &task.parent_id {
            Some(parent_id) => Ok(Some(
                self.db
                    .get_task(parent_id)?
                    .ok_or_else(|| TaskError::entity_not_found("Task", parent_id))?,
            )),
            None => Ok(None),
        }
    }

    /// Freeze a task, or its parent when `parent` is set.
    ///
    /// A frozen recurrent parent breeds no children until unfrozen.
    pub fn freeze(&self, id: &str, parent: bool) -> TaskResult<Task> {
        let task = self.resolve(id, &[STATE_OPEN])?;
        let mut target = self.target(task, parent)?;
        if !target.is_open() {
            return Err(TaskError::invalid_value(
                "state",
                format!("Task {} is {}, only open tasks can be frozen", target.id, target.state),
            ));
        }

        target.state = STATE_FROZEN.to_string();
        self.db.save_task(&target)?;
        info!("Frozen task {}", target.id);
        Ok(target)
    }

    /// Unfreeze a task, or its parent when `parent` is set.
    ///
    /// An unfrozen recurrent parent without open children breeds one.
    pub fn unfreeze(&self, id: &str, parent: bool) -> TaskResult<Task> {
        self.unfreeze_at(id, parent, date::now())
    }

    pub fn unfreeze_at(&self, id: &str, parent: bool, now: NaiveDateTime) -> TaskResult<Task> {
        let task = self.resolve(id, &[STATE_FROZEN, STATE_OPEN])?;
        let mut target = self.target(task, parent)?;
        if target.state != STATE_FROZEN && !target.is_open() {
            return Err(TaskError::invalid_value(
                "state",
                format!("Task {} is {} and can't be unfrozen", target.id, target.state),
            ));
        }

        target.state = STATE_OPEN.to_string();
        self.db.save_task(&target)?;
        info!("Unfrozen task {}", target.id);

        if target.is_recurrent() && target.open_children().next().is_none() {
            let child_id = self.db.next_task_id(&self.config.fulid)?;
            let child = target.breed_children_at(child_id, now)?;
            self.db.save_task(&child)?;
            info!(
                "Added child task {}: {}",
                child.id,
                child.description.as_deref().unwrap_or("")
            );
        }
        Ok(target)
    }

    fn target(&self, task: Task, parent: bool) -> TaskResult<Task> {
        if !parent {
            return Ok(task);
        }
        match self.parent_of(&task)? {
            Some(parent) => Ok(parent),
            None => {
                warn!("Task {} doesn't have a parent task", task.id);
                Ok(task)
            }
        }
    }

    /// Change the attributes of a task, or of its parent when `parent` is set.
    ///
    /// `args` uses the same `key:value` syntax as `add`; `key:` clears a
    /// field and `-tag` removes a tag.
    pub fn modify(&self, id: &str, args: &[String], parent: bool) -> TaskResult<Task> {
        let parsed = parse_task_arguments(args, ParseMode::Add)?;
        let task = self.resolve(id, &[STATE_OPEN, STATE_FROZEN])?;
        let mut target = self.target(task, parent)?;

        self.apply_modification(&mut target, parsed)?;
        self.ensure_relations(&target)?;
        self.db.save_task(&target)?;
        info!("Modified task {}", target.id);
        Ok(target)
    }

    fn apply_modification(&self, task: &mut Task, parsed: TaskArguments) -> TaskResult<()> {
        let a = parsed.attributes;
        self.check_assignable_state(a.state.as_deref())?;

        for field in &parsed.cleared {
            match *field {
                "agile" => task.set_agile(None)?,
                "body" => task.body = None,
                "due" if task.is_recurrent() => {
                    return Err(TaskError::task_attribute(
                        "due",
                        "You need to specify a due date for recurrent tasks",
                    ));
                }
                "due" => task.due = None,
                "estimate" => task.estimate = None,
                "fun" => task.fun = None,
                "priority" => task.priority = None,
                "project_id" => task.project_id = None,
                "value" => task.value = None,
                "willpower" => task.willpower = None,
                other => {
                    return Err(TaskError::task_attribute(
                        other,
                        format!("The {} of a task can't be cleared", other),
                    ));
                }
            }
        }

        if let Some(description) = a.description {
            task.description = Some(description);
        }
        if a.agile.is_some() {
            task.set_agile_within(a.agile, &self.config.task.agile_states)?;
        }
        if let Some(body) = a.body {
            task.body = Some(body);
        }
        if let Some(due) = a.due {
            task.due = Some(due);
        }
        if let Some(estimate) = a.estimate {
            task.estimate = Some(estimate);
        }
        if let Some(fun) = a.fun {
            task.fun = Some(fun);
        }
        if let Some(priority) = a.priority {
            task.priority = Some(priority);
        }
        if let Some(project_id) = a.project_id {
            task.project_id = Some(project_id);
        }
        if let Some(state) = a.state {
            task.state = state;
            task.closed = None;
        }
        if let Some(value) = a.value {
            task.value = Some(value);
        }
        if let Some(willpower) = a.willpower {
            task.willpower = Some(willpower);
        }

        if let Some(recurrence_type) = a.recurrence_type {
            task.set_recurrence_type(&recurrence_type)?;
            if let (Some(rule), TaskKind::Recurrent(recurrence)) =
                (a.recurrence, &mut task.kind)
            {
                recurrence.rule = rule;
            }
        }

        for tag in parsed.tags_removed {
            match task.tag_ids.iter().position(|t| *t == tag) {
                Some(index) => {
                    task.tag_ids.remove(index);
                }
                None => {
                    return Err(TaskError::invalid_value(
                        "tag_ids",
                        format!("Task {} doesn't have the tag {}", task.id, tag),
                    ));
                }
            }
        }
        for tag in a.tag_ids {
            if !task.tag_ids.contains(&tag) {
                task.tag_ids.push(tag);
            }
        }
        Ok(())
    }
}
