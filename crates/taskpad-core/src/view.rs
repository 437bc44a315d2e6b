use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use deunicode::deunicode;
use serde::Serialize;
use tracing::trace;

use crate::task::{
  Priority,
  Status,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum StatusFilter {
  #[default]
  All,
  Only(Status)
}

impl StatusFilter {
  fn admits(self, status: Status) -> bool {
    match self {
      | Self::All => true,
      | Self::Only(wanted) => {
        wanted == status
      }
    }
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "" | "all" => Ok(Self::All),
      | "pending" => {
        Ok(Self::Only(Status::Pending))
      }
      | "completed" | "done" => {
        Ok(Self::Only(
          Status::Completed
        ))
      }
      | other => {
        Err(anyhow!(
          "invalid status filter: \
           {other} (expected all, \
           pending or completed)"
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Only(Priority)
}

impl PriorityFilter {
  fn admits(
    self,
    priority: Priority
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Only(wanted) => {
        wanted == priority
      }
    }
  }
}

impl FromStr for PriorityFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty()
      || trimmed
        .eq_ignore_ascii_case("all")
    {
      return Ok(Self::All);
    }
    trimmed
      .parse::<Priority>()
      .map(Self::Only)
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum SortKey {
  #[default]
  Created,
  Priority,
  Title,
  DueDate
}

impl SortKey {
  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Created => "created",
      | Self::Priority => "priority",
      | Self::Title => "title",
      | Self::DueDate => "dueDate"
    }
  }
}

impl fmt::Display for SortKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "created" | "entry" => {
        Ok(Self::Created)
      }
      | "priority" | "pri" => {
        Ok(Self::Priority)
      }
      | "title" => Ok(Self::Title),
      | "duedate" | "due" => {
        Ok(Self::DueDate)
      }
      | other => {
        Err(anyhow!(
          "invalid sort key: {other} \
           (expected created, \
           priority, title or dueDate)"
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum SortOrder {
  Asc,
  #[default]
  Desc
}

impl SortOrder {
  #[must_use]
  pub fn toggled(self) -> Self {
    match self {
      | Self::Asc => Self::Desc,
      | Self::Desc => Self::Asc
    }
  }

  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Asc => "asc",
      | Self::Desc => "desc"
    }
  }
}

impl fmt::Display for SortOrder {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortOrder {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "asc" | "ascending" => {
        Ok(Self::Asc)
      }
      | "desc" | "descending" => {
        Ok(Self::Desc)
      }
      | other => {
        Err(anyhow!(
          "invalid sort order: {other} \
           (expected asc or desc)"
        ))
      }
    }
  }
}

/// Inputs of the displayed list. The
/// default shows every task, newest
/// first.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct ViewQuery {
  pub search:   String,
  pub status:   StatusFilter,
  pub priority: PriorityFilter,
  pub sort:     SortKey,
  pub order:    SortOrder
}

impl ViewQuery {
  #[must_use]
  pub fn with_search(
    mut self,
    search: impl Into<String>
  ) -> Self {
    self.search = search.into();
    self
  }

  #[must_use]
  pub fn with_status(
    mut self,
    status: StatusFilter
  ) -> Self {
    self.status = status;
    self
  }

  #[must_use]
  pub fn with_priority(
    mut self,
    priority: PriorityFilter
  ) -> Self {
    self.priority = priority;
    self
  }

  /// Changes the sort key only; the
  /// chosen direction is kept.
  #[must_use]
  pub fn with_sort(
    mut self,
    sort: SortKey
  ) -> Self {
    self.sort = sort;
    self
  }

  #[must_use]
  pub fn with_order(
    mut self,
    order: SortOrder
  ) -> Self {
    self.order = order;
    self
  }

  pub fn toggle_order(&mut self) {
    self.order = self.order.toggled();
  }

  fn matches(
    &self,
    needle: &str,
    task: &Task
  ) -> bool {
    let text_match = needle.is_empty()
      || task
        .title
        .to_lowercase()
        .contains(needle)
      || task
        .description
        .to_lowercase()
        .contains(needle);

    text_match
      && self.status.admits(task.status)
      && self
        .priority
        .admits(task.priority)
  }
}

/// Filters and sorts a copy of `tasks`.
#[tracing::instrument(skip(tasks, query), fields(count = tasks.len()))]
pub fn derive_view(
  tasks: &[Task],
  query: &ViewQuery
) -> Vec<Task> {
  let needle =
    query.search.trim().to_lowercase();

  let mut rows: Vec<Task> = tasks
    .iter()
    .filter(|task| {
      query.matches(&needle, task)
    })
    .cloned()
    .collect();

  rows.sort_by(|a, b| {
    let base =
      compare_by_key(query.sort, a, b);
    match query.order {
      | SortOrder::Asc => base,
      | SortOrder::Desc => base.reverse()
    }
  });

  trace!(
    shown = rows.len(),
    sort = %query.sort,
    order = %query.order,
    "derived view"
  );
  rows
}

fn compare_by_key(
  key: SortKey,
  a: &Task,
  b: &Task
) -> Ordering {
  match key {
    // Higher rank first when ascending.
    | SortKey::Priority => {
      b.priority
        .rank()
        .cmp(&a.priority.rank())
    }
    | SortKey::Title => {
      collate(&a.title, &b.title)
    }
    // `None` orders before any date.
    | SortKey::DueDate => {
      a.due_date.cmp(&b.due_date)
    }
    | SortKey::Created => {
      a.created_at.cmp(&b.created_at)
    }
  }
}

/// Dictionary-style comparison: accents
/// and case are ignored first, then
/// unaccented before accented, then
/// lowercase before uppercase.
fn collate(a: &str, b: &str) -> Ordering {
  let primary = deunicode(a)
    .to_lowercase()
    .cmp(&deunicode(b).to_lowercase());
  primary
    .then_with(|| {
      a.to_lowercase()
        .cmp(&b.to_lowercase())
    })
    .then_with(|| b.cmp(a))
}

/// Counts shown in the list header.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
  pub total:         usize,
  pub completed:     usize,
  pub pending:       usize,
  pub high_priority: usize
}

impl Stats {
  pub fn from_tasks(
    tasks: &[Task]
  ) -> Self {
    let completed = tasks
      .iter()
      .filter(|task| task.is_completed())
      .count();
    Self {
      total: tasks.len(),
      completed,
      pending: tasks.len() - completed,
      high_priority: tasks
        .iter()
        .filter(|task| {
          task.priority == Priority::High
        })
        .count()
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    PriorityFilter,
    SortKey,
    SortOrder,
    Stats,
    StatusFilter,
    ViewQuery,
    derive_view
  };
  use crate::task::{
    Priority,
    Status,
    Task,
    TaskInput
  };

  fn task(
    title: &str,
    priority: Priority,
    minutes: i64
  ) -> Task {
    let base = Utc
      .with_ymd_and_hms(
        2026, 2, 16, 5, 0, 0
      )
      .single()
      .expect("valid base");
    Task::new_pending(
      TaskInput::new(title)
        .with_priority(priority),
      base + Duration::minutes(minutes)
    )
  }

  fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks
      .iter()
      .map(|t| t.title.as_str())
      .collect()
  }

  #[test]
  fn default_view_is_newest_first() {
    let tasks = vec![
      task("old", Priority::Low, 0),
      task("mid", Priority::Low, 1),
      task("new", Priority::Low, 2),
    ];
    let view = derive_view(
      &tasks,
      &ViewQuery::default()
    );
    assert_eq!(
      titles(&view),
      vec!["new", "mid", "old"]
    );
  }

  #[test]
  fn title_sort_is_case_insensitive_and_reversible()
   {
    let tasks = vec![
      task("Banana", Priority::Low, 0),
      task("apple", Priority::Low, 1),
      task("Cherry", Priority::Low, 2),
    ];
    let mut query = ViewQuery::default()
      .with_sort(SortKey::Title)
      .with_order(SortOrder::Asc);

    let asc = derive_view(&tasks, &query);
    assert_eq!(
      titles(&asc),
      vec!["apple", "Banana", "Cherry"]
    );

    query.toggle_order();
    let desc =
      derive_view(&tasks, &query);
    let mut reversed = asc.clone();
    reversed.reverse();
    assert_eq!(desc, reversed);
  }

  #[test]
  fn accented_titles_sort_with_their_base_letter()
   {
    let tasks = vec![
      task("Zebra", Priority::Low, 0),
      task("Éclair", Priority::Low, 1),
      task("eagle", Priority::Low, 2),
    ];
    let query = ViewQuery::default()
      .with_sort(SortKey::Title)
      .with_order(SortOrder::Asc);
    assert_eq!(
      titles(&derive_view(&tasks, &query)),
      vec!["eagle", "Éclair", "Zebra"]
    );
  }

  #[test]
  fn priority_sort_puts_high_first_when_ascending()
   {
    let tasks = vec![
      task("l", Priority::Low, 0),
      task("h", Priority::High, 1),
      task("m", Priority::Medium, 2),
    ];
    let query = ViewQuery::default()
      .with_order(SortOrder::Asc)
      .with_sort(SortKey::Priority);
    assert_eq!(
      titles(&derive_view(&tasks, &query)),
      vec!["h", "m", "l"]
    );
  }

  #[test]
  fn missing_due_date_sorts_earliest() {
    let mut a = task("a", Priority::Low, 0);
    a.due_date =
      NaiveDate::from_ymd_opt(2026, 3, 1);
    let b = task("b", Priority::Low, 1);
    let mut c = task("c", Priority::Low, 2);
    c.due_date =
      NaiveDate::from_ymd_opt(2026, 2, 1);

    let query = ViewQuery::default()
      .with_order(SortOrder::Asc)
      .with_sort(SortKey::DueDate);
    assert_eq!(
      titles(&derive_view(
        &[a, b, c],
        &query
      )),
      vec!["b", "c", "a"]
    );
  }

  #[test]
  fn selecting_sort_key_keeps_direction()
  {
    let query = ViewQuery::default()
      .with_order(SortOrder::Asc)
      .with_sort(SortKey::Title);
    assert_eq!(query.order, SortOrder::Asc);
  }

  #[test]
  fn status_and_priority_filters_intersect()
   {
    let mut done_high =
      task("done high", Priority::High, 0);
    done_high.status = Status::Completed;
    let mut done_low =
      task("done low", Priority::Low, 1);
    done_low.status = Status::Completed;
    let open_high =
      task("open high", Priority::High, 2);
    let tasks =
      vec![done_high, done_low, open_high];

    let completed = derive_view(
      &tasks,
      &ViewQuery::default().with_status(
        StatusFilter::Only(
          Status::Completed
        )
      )
    );
    assert!(
      completed
        .iter()
        .all(|t| t.status == Status::Completed)
    );
    assert_eq!(completed.len(), 2);

    let both = derive_view(
      &tasks,
      &ViewQuery::default()
        .with_status(StatusFilter::Only(
          Status::Completed
        ))
        .with_priority(
          PriorityFilter::Only(
            Priority::High
          )
        )
    );
    assert_eq!(titles(&both), vec!["done high"]);
  }

  #[test]
  fn search_matches_title_or_description()
  {
    let mut with_desc =
      task("Errands", Priority::Low, 0);
    with_desc.description =
      "pick up the Parcel".to_string();
    let tasks = vec![
      with_desc,
      task("Parcel tape", Priority::Low, 1),
      task("Other", Priority::Low, 2),
    ];

    let view = derive_view(
      &tasks,
      &ViewQuery::default()
        .with_search("  parcel ")
        .with_order(SortOrder::Asc)
    );
    assert_eq!(
      titles(&view),
      vec!["Errands", "Parcel tape"]
    );
  }

  #[test]
  fn filters_parse_from_cli_words() {
    assert_eq!(
      "done"
        .parse::<StatusFilter>()
        .expect("status"),
      StatusFilter::Only(
        Status::Completed
      )
    );
    assert_eq!(
      "ALL"
        .parse::<PriorityFilter>()
        .expect("priority"),
      PriorityFilter::All
    );
    assert_eq!(
      "dueDate"
        .parse::<SortKey>()
        .expect("sort"),
      SortKey::DueDate
    );
    assert!("sideways".parse::<SortOrder>().is_err());
  }

  #[test]
  fn stats_count_status_and_high_priority()
   {
    let mut done =
      task("a", Priority::High, 0);
    done.status = Status::Completed;
    let tasks = vec![
      done,
      task("b", Priority::High, 1),
      task("c", Priority::Low, 2),
    ];
    assert_eq!(
      Stats::from_tasks(&tasks),
      Stats {
        total:         3,
        completed:     1,
        pending:       2,
        high_priority: 2
      }
    );
  }
}
