use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};
use uuid::Uuid;

use crate::datetime::iso_timestamp_serde;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High
}

impl Priority {
  /// Ordering weight used by the
  /// priority sort: high=3, medium=2,
  /// low=1.
  #[must_use]
  pub fn rank(self) -> u8 {
    match self {
      | Self::Low => 1,
      | Self::Medium => 2,
      | Self::High => 3
    }
  }

  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Low => "low",
      | Self::Medium => "medium",
      | Self::High => "high"
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Priority {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "l" | "low" => Ok(Self::Low),
      | "m" | "medium" => {
        Ok(Self::Medium)
      }
      | "h" | "high" => Ok(Self::High),
      | other => {
        Err(anyhow!(
          "invalid priority: {other} \
           (expected low, medium or \
           high)"
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Pending,
  Completed
}

impl Status {
  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Pending => "pending",
      | Self::Completed => "completed"
    }
  }
}

impl fmt::Display for Status {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Payload shared by add and edit.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TaskInput {
  pub title:       String,
  pub description: String,
  pub priority:    Priority,
  pub due_date:    Option<NaiveDate>
}

impl TaskInput {
  pub fn new(
    title: impl Into<String>
  ) -> Self {
    Self {
      title: title.into(),
      ..Self::default()
    }
  }

  #[must_use]
  pub fn with_description(
    mut self,
    description: impl Into<String>
  ) -> Self {
    self.description =
      description.into();
    self
  }

  #[must_use]
  pub fn with_priority(
    mut self,
    priority: Priority
  ) -> Self {
    self.priority = priority;
    self
  }

  #[must_use]
  pub fn with_due_date(
    mut self,
    due_date: Option<NaiveDate>
  ) -> Self {
    self.due_date = due_date;
    self
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id: String,

  pub title: String,

  #[serde(default)]
  pub description: String,

  pub priority: Priority,

  pub status: Status,

  #[serde(with = "iso_timestamp_serde")]
  pub created_at: DateTime<Utc>,

  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "iso_timestamp_serde::option"
  )]
  pub completed_at: Option<DateTime<Utc>>,

  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date: Option<NaiveDate>,

  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub category: Option<String>,

  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub urgency: Option<String>
}

impl Task {
  /// Builds a pending task from an
  /// already validated input.
  pub fn new_pending(
    input: TaskInput,
    now: DateTime<Utc>
  ) -> Self {
    Self {
      id:           Uuid::new_v4()
        .to_string(),
      title:        input.title,
      description:  input.description,
      priority:     input.priority,
      status:       Status::Pending,
      created_at:   now,
      completed_at: None,
      due_date:     input.due_date,
      category:     None,
      urgency:      None
    }
  }

  #[must_use]
  pub fn is_completed(&self) -> bool {
    self.status == Status::Completed
  }

  /// First eight characters of the id,
  /// enough to address a task from the
  /// command line.
  #[must_use]
  pub fn short_id(&self) -> &str {
    self
      .id
      .get(..8)
      .unwrap_or(self.id.as_str())
  }
}
