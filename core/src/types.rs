//! Domain DTOs for the CMS todo collection and its auth endpoints.
//!
//! # Design
//! These types mirror the CMS wire schema (camelCase, `{"data": ...}`
//! envelopes) but are defined independently from the mock-server crate.
//! Integration tests catch any schema drift between the two.
//!
//! Descriptions cross this boundary in two forms: `TodoDraft` holds the flat
//! text a form edits, `TodoPayload` and `Todo` hold the block document the
//! CMS stores. The conversion happens in exactly two places,
//! `TodoDraft::to_payload` and `TodoDraft::from_todo`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::richtext::{self, Block, RichText};

/// Priority of a todo. Serialized capitalized, as the CMS enumeration expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
}

impl Priority {
    /// Sort rank used by list views. Higher sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

/// Rank of an optional priority; a missing priority ranks below `Low`.
pub fn priority_rank(priority: Option<Priority>) -> u8 {
    priority.map_or(0, Priority::rank)
}

fn lenient_priority<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Priority>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match raw {
        Some(serde_json::Value::String(name)) => match name.parse() {
            Ok(priority) => Some(priority),
            Err(reason) => {
                tracing::debug!(%reason, "ignoring stored priority");
                None
            }
        },
        Some(other) => {
            tracing::debug!(%other, "ignoring stored priority");
            None
        }
        None => None,
    })
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    /// Form values arrive lowercase (`"medium"`); any casing is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Status chosen in the todo form. The CMS only stores `isCompleted`, so
/// `InProgress` survives only on the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in-progress",
            TodoStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A todo record as returned by the CMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub document_id: String,
    pub title: String,
    #[serde(default)]
    pub description: RichText,
    #[serde(default)]
    pub is_completed: bool,
    /// Stored values outside the known set read as `None` and rank lowest.
    #[serde(
        default,
        deserialize_with = "lenient_priority",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Status picked in the form that produced this record, if known.
    #[serde(skip)]
    pub ui_status: Option<TodoStatus>,
}

impl Todo {
    /// Attach the status the user picked, so `InProgress` is not lost when the
    /// server echoes the record back.
    pub fn with_ui_status(mut self, status: TodoStatus) -> Self {
        self.ui_status = Some(status);
        self
    }

    pub fn status(&self) -> TodoStatus {
        if self.is_completed {
            TodoStatus::Completed
        } else if self.ui_status == Some(TodoStatus::InProgress) {
            TodoStatus::InProgress
        } else {
            TodoStatus::Pending
        }
    }

    pub fn plain_description(&self) -> String {
        richtext::to_flat_text(&self.description)
    }

    /// Past due and not completed. Only the calendar day counts: a todo due
    /// today is not overdue.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_completed && self.due_date.is_some_and(|due| due < today)
    }
}

/// What the todo form edits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl TodoDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Populate an edit form from a stored record.
    pub fn from_todo(todo: &Todo) -> Self {
        Self {
            title: todo.title.clone(),
            description: todo.plain_description(),
            status: todo.status(),
            priority: todo.priority,
            due_date: todo.due_date,
        }
    }

    pub fn to_payload(&self) -> TodoPayload {
        let description = if self.description.is_empty() {
            None
        } else {
            Some(self.description.as_str())
        };
        TodoPayload {
            title: self.title.clone(),
            description: richtext::to_structured(description),
            is_completed: self.status == TodoStatus::Completed,
            priority: self.priority,
            due_date: self.due_date,
        }
    }
}

/// Fields sent to the CMS on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPayload {
    pub title: String,
    pub description: Vec<Block>,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// The `{"data": ...}` wrapper the CMS puts around request and response
/// bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// List responses arrive either enveloped with pagination metadata or, from
/// older endpoints, as a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TodoListBody {
    Enveloped {
        data: Vec<Todo>,
        #[serde(default)]
        meta: Option<serde_json::Value>,
    },
    Bare(Vec<Todo>),
}

impl TodoListBody {
    pub fn into_todos(self) -> Vec<Todo> {
        match self {
            TodoListBody::Enveloped { data, .. } => data,
            TodoListBody::Bare(todos) => todos,
        }
    }
}

/// Outcome of a delete. A 404 means someone else already removed the item,
/// which the list view treats the same as a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyGone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Public profile of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
}

/// Body returned by the login and register endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub jwt: String,
    pub user: User,
}
