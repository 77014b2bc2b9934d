//! Structured error types for task operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    TaskAttributeError,
    InvalidValue,

    // Parse errors
    DateParseError,

    // Precondition errors
    MissingRecurrence,

    // Not found errors
    EntityNotFound,

    // Internal errors
    DatabaseError,
    ConfigError,
    InternalError,
}

/// Structured error for task operations.
#[derive(Debug, Serialize)]
pub struct TaskError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl TaskError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    // Convenience constructors

    pub fn task_attribute(field: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TaskAttributeError, message).with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidValue, reason).with_field(field)
    }

    /// The offending substring is kept in the message so callers can show it.
    pub fn date_parse(expression: &str) -> Self {
        Self::new(
            ErrorCode::DateParseError,
            format!(
                "Unable to parse the date string {}, please enter a valid one",
                expression
            ),
        )
    }

    pub fn missing_recurrence(task_id: &str) -> Self {
        Self::new(
            ErrorCode::MissingRecurrence,
            format!(
                "The recurrence of the task {} is None, so it can't breed children",
                task_id
            ),
        )
        .with_field("recurrence")
    }

    pub fn entity_not_found(kind: &str, id: &str) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("No {} found with id {}", kind, id),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn config(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ConfigError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TaskError {}

impl From<rusqlite::Error> for TaskError {
    fn from(err: rusqlite::Error) -> Self {
        TaskError::database(err)
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::internal(err)
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<TaskError>() {
            Ok(task_err) => return task_err,
            Err(err) => err,
        };
        match err.downcast::<rusqlite::Error>() {
            Ok(sql_err) => TaskError::database(sql_err),
            Err(err) => TaskError::internal(format!("{:#}", err)),
        }
    }
}

/// Result type for task operations.
pub type TaskResult<T> = std::result::Result<T, TaskError>;
