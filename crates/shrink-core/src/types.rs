use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Conversation
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// Errors and notices produced by the application itself.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// One entry of a session transcript. Never mutated once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Append-only transcript of one session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<ConversationMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Messages appended at or after position `index`.
    pub fn since(&self, index: usize) -> &[ConversationMessage] {
        self.messages.get(index..).unwrap_or(&[])
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[ConversationMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// =============================================================================
// Tabular data
// =============================================================================

/// Column-ordered tabular result shared by the warehouse and dashboard views.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl Table {
    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A table with the given header and no rows yet.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<serde_json::Value>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&serde_json::Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|r| r.get(idx)).collect())
    }
}

/// Dashboard filter state applied to warehouse queries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filters {
    pub store: Option<u32>,
    pub department: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Filters {
    pub fn is_unfiltered(&self) -> bool {
        self == &Filters::default()
    }
}
