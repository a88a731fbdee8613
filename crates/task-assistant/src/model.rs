//! Domain Models
//!
//! Tasks and the filter/patch records the store operates on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::StoreError;

/// Store-assigned task identifier, rendered as a plain string
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied id; anything that is not a UUID is rejected
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| StoreError::InvalidIdentifier(s.to_string()))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lenient enum parsing for model-supplied strings: case-insensitive, with
/// spaces and dashes treated as underscores.
fn normalize_variant(s: &str) -> String {
    s.trim().to_lowercase().replace([' ', '-'], "_")
}

macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [&'static str] = &[$($text),+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match normalize_variant(s).as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(
                        "unknown {} '{}' (expected one of: {})",
                        $label,
                        s,
                        Self::ALL.join(", ")
                    )),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

/// Kind of work a task represents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum TaskType {
    #[default]
    Study,
    Code,
    Revision,
}

string_enum!(TaskType, "type", {
    Study => "study",
    Code => "code",
    Revision => "revision",
});

/// Lifecycle state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

string_enum!(TaskStatus, "status", {
    Pending => "pending",
    InProgress => "in_progress",
    Done => "done",
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

string_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// A persisted task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    /// The user's original wording, if captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Distinct tags, in insertion order
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(rename = "type", default)]
    pub task_type: TaskType,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Priority,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Materialize a new task; both timestamps are `now`
    pub fn from_new(id: TaskId, new: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            raw_input: new.raw_input,
            subject: new.subject,
            topic: new.topic,
            tags: normalize_tags(new.tags),
            task_type: new.task_type,
            status: TaskStatus::Pending,
            priority: new.priority,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields supplied when creating a task
#[derive(Clone, Debug, Default)]
pub struct NewTask {
    pub title: String,
    pub raw_input: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub tags: Vec<String>,
    pub task_type: TaskType,
    pub priority: Priority,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// Criteria for `TaskStore::find`. Empty criteria match everything.
#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
    /// Match tasks carrying at least one of these tags
    pub tags: Vec<String>,

    pub status: Option<TaskStatus>,

    /// Case-insensitive substring of title or topic
    pub text: Option<String>,
}

impl TaskFilter {
    pub const DEFAULT_LIMIT: usize = 5;

    pub fn matches(&self, task: &Task) -> bool {
        if !self.tags.is_empty() && !task.tags.iter().any(|t| self.tags.contains(t)) {
            return false;
        }

        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }

        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_topic = task
                .topic
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&needle));
            if !in_title && !in_topic {
                return false;
            }
        }

        true
    }
}

/// Changes applied by `TaskStore::update`
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    /// Unioned into the existing tag set
    pub add_tags: Vec<String>,
}

impl TaskPatch {
    /// Apply to `task`, stamping `updated_at`
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        merge_tags(&mut task.tags, &self.add_tags);
        task.updated_at = now;
    }
}

/// What `TaskStore::update` did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// A task with that id exists
    pub matched: bool,
    /// The stored document changed
    pub modified: bool,
}

impl UpdateOutcome {
    pub const NOT_FOUND: Self = Self {
        matched: false,
        modified: false,
    };
}

/// Trim, drop empties and duplicates, keep first-seen order
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Add tags not already present. Returns whether anything was added.
pub fn merge_tags(existing: &mut Vec<String>, add: &[String]) -> bool {
    let before = existing.len();
    for tag in normalize_tags(add) {
        if !existing.contains(&tag) {
            existing.push(tag);
        }
    }
    existing.len() != before
}

/// Accepts a JSON list of strings or one comma-separated string
pub fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagsInput {
        List(Vec<String>),
        Csv(String),
    }

    let tags = match Option::<TagsInput>::deserialize(deserializer)? {
        Some(TagsInput::List(list)) => list,
        Some(TagsInput::Csv(csv)) => csv.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };

    Ok(normalize_tags(tags))
}
