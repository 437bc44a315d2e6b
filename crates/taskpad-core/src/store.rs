use std::collections::HashSet;

use chrono::{
  DateTime,
  Utc
};
use tracing::{
  debug,
  error,
  info,
  instrument,
  warn
};

use crate::classifier::ClassifierSuggestion;
use crate::datastore::{
  Slot,
  decode_tasks,
  encode_tasks
};
use crate::datetime::truncate_to_millis;
use crate::error::StoreError;
use crate::task::{
  Status,
  Task,
  TaskInput
};
use crate::view::Stats;

/// Authoritative ordered task list for a
/// session, mirrored to its slot after
/// every mutation.
///
/// A failed slot write does not undo the
/// mutation: the operation still returns
/// `Ok` and the failure is kept for
/// [`TaskStore::take_write_error`].
#[derive(Debug)]
pub struct TaskStore<S: Slot> {
  slot:        S,
  tasks:       Vec<Task>,
  write_error: Option<StoreError>
}

impl<S: Slot> TaskStore<S> {
  /// Loads the slot. Missing, unreadable
  /// or corrupt data yields an empty
  /// store.
  #[instrument(skip(slot), fields(slot = slot.name()))]
  pub fn open(slot: S) -> Self {
    let tasks = match slot.read() {
      | Ok(Some(raw)) => {
        match decode_tasks(&raw) {
          | Ok(tasks) => sanitize(tasks),
          | Err(err) => {
            warn!(
              error = %format!("{err:#}"),
              "slot content is corrupt; starting empty"
            );
            Vec::new()
          }
        }
      }
      | Ok(None) => {
        debug!("slot is empty");
        Vec::new()
      }
      | Err(err) => {
        warn!(
          error = %format!("{err:#}"),
          "failed reading slot; starting empty"
        );
        Vec::new()
      }
    };

    info!(
      count = tasks.len(),
      "loaded tasks"
    );

    Self {
      slot,
      tasks,
      write_error: None
    }
  }

  /// All tasks in insertion order.
  pub fn list(&self) -> &[Task] {
    &self.tasks
  }

  pub fn get(
    &self,
    id: &str
  ) -> Result<&Task, StoreError> {
    self
      .tasks
      .iter()
      .find(|task| task.id == id)
      .ok_or_else(|| {
        StoreError::NotFound(
          id.to_string()
        )
      })
  }

  /// Resolves a full id or a unique id
  /// prefix.
  pub fn resolve(
    &self,
    id_or_prefix: &str
  ) -> Result<&Task, StoreError> {
    let needle = id_or_prefix.trim();
    if needle.is_empty() {
      return Err(StoreError::NotFound(
        id_or_prefix.to_string()
      ));
    }
    if let Ok(task) = self.get(needle) {
      return Ok(task);
    }

    let mut matches = self
      .tasks
      .iter()
      .filter(|task| {
        task.id.starts_with(needle)
      });
    let first =
      matches.next().ok_or_else(|| {
        StoreError::NotFound(
          needle.to_string()
        )
      })?;
    if matches.next().is_some() {
      return Err(StoreError::NotFound(
        format!(
          "{needle} (ambiguous id \
           prefix)"
        )
      ));
    }
    Ok(first)
  }

  #[instrument(skip(self, input, now))]
  pub fn add(
    &mut self,
    input: TaskInput,
    now: DateTime<Utc>
  ) -> Result<Task, StoreError> {
    let input = validated(input)?;
    let mut task = Task::new_pending(
      input,
      truncate_to_millis(now)
    );
    while self
      .tasks
      .iter()
      .any(|existing| existing.id == task.id)
    {
      task.id =
        uuid::Uuid::new_v4().to_string();
    }

    self.tasks.push(task.clone());
    debug!(
      id = %task.id,
      count = self.tasks.len(),
      "task added"
    );
    self.persist();
    Ok(task)
  }

  #[instrument(skip(self, input))]
  pub fn edit(
    &mut self,
    id: &str,
    input: TaskInput
  ) -> Result<Task, StoreError> {
    let idx = self.position(id)?;
    let input = validated(input)?;

    let task = &mut self.tasks[idx];
    task.title = input.title;
    task.description = input.description;
    task.priority = input.priority;
    task.due_date = input.due_date;
    let updated = task.clone();

    debug!(id, "task edited");
    self.persist();
    Ok(updated)
  }

  #[instrument(skip(self, now))]
  pub fn toggle_complete(
    &mut self,
    id: &str,
    now: DateTime<Utc>
  ) -> Result<Task, StoreError> {
    let idx = self.position(id)?;

    let task = &mut self.tasks[idx];
    match task.status {
      | Status::Pending => {
        task.status = Status::Completed;
        task.completed_at = Some(
          truncate_to_millis(now)
        );
      }
      | Status::Completed => {
        task.status = Status::Pending;
        task.completed_at = None;
      }
    }
    let updated = task.clone();

    debug!(
      id,
      status = %updated.status,
      "task completion toggled"
    );
    self.persist();
    Ok(updated)
  }

  /// Deleting an unknown id is a
  /// `NotFound` error, like every other
  /// id-addressed operation.
  #[instrument(skip(self))]
  pub fn remove(
    &mut self,
    id: &str
  ) -> Result<Task, StoreError> {
    let idx = self.position(id)?;
    let removed = self.tasks.remove(idx);

    debug!(
      id,
      count = self.tasks.len(),
      "task removed"
    );
    self.persist();
    Ok(removed)
  }

  /// Copies priority, category and
  /// urgency from a suggestion; the
  /// reasoning is dropped.
  #[instrument(skip(self, suggestion))]
  pub fn apply_suggestion(
    &mut self,
    id: &str,
    suggestion: &ClassifierSuggestion
  ) -> Result<Task, StoreError> {
    let idx = self.position(id)?;

    let task = &mut self.tasks[idx];
    task.priority = suggestion.priority;
    task.category =
      Some(suggestion.category.clone());
    task.urgency =
      Some(suggestion.urgency.clone());
    let updated = task.clone();

    debug!(
      id,
      priority = %updated.priority,
      category = %suggestion.category,
      "suggestion applied"
    );
    self.persist();
    Ok(updated)
  }

  pub fn stats(&self) -> Stats {
    Stats::from_tasks(&self.tasks)
  }

  /// Takes the most recent slot write
  /// failure, if any.
  pub fn take_write_error(
    &mut self
  ) -> Option<StoreError> {
    self.write_error.take()
  }

  fn position(
    &self,
    id: &str
  ) -> Result<usize, StoreError> {
    self
      .tasks
      .iter()
      .position(|task| task.id == id)
      .ok_or_else(|| {
        StoreError::NotFound(
          id.to_string()
        )
      })
  }

  fn persist(&mut self) {
    let result = encode_tasks(
      &self.tasks
    )
    .and_then(|payload| {
      self.slot.write(&payload)
    });

    match result {
      | Ok(()) => {
        self.write_error = None;
      }
      | Err(source) => {
        error!(
          slot = self.slot.name(),
          error = %format!("{source:#}"),
          "failed to persist tasks; changes are kept for this session only"
        );
        self.write_error =
          Some(StoreError::Persistence {
            slot: self
              .slot
              .name()
              .to_string(),
            source
          });
      }
    }
  }
}

fn validated(
  mut input: TaskInput
) -> Result<TaskInput, StoreError> {
  let title = input.title.trim();
  if title.is_empty() {
    return Err(StoreError::Validation(
      "title cannot be empty"
        .to_string()
    ));
  }
  input.title = title.to_string();
  input.description = input
    .description
    .trim()
    .to_string();
  Ok(input)
}

/// Drops records that break the store
/// invariants and repairs completion
/// timestamps.
fn sanitize(tasks: Vec<Task>) -> Vec<Task> {
  let mut seen = HashSet::new();
  let mut kept =
    Vec::with_capacity(tasks.len());

  for mut task in tasks {
    if task.title.trim().is_empty() {
      warn!(id = %task.id, "dropping stored task with empty title");
      continue;
    }
    if !seen.insert(task.id.clone()) {
      warn!(id = %task.id, "dropping stored task with duplicate id");
      continue;
    }
    match (task.status, task.completed_at)
    {
      | (Status::Pending, Some(_)) => {
        task.completed_at = None;
      }
      | (Status::Completed, None) => {
        warn!(id = %task.id, "completed task without completion time; using creation time");
        task.completed_at =
          Some(task.created_at);
      }
      | _ => {}
    }
    kept.push(task);
  }

  kept
}

#[cfg(test)]
mod tests {
  use anyhow::anyhow;
  use chrono::{
    Duration,
    TimeZone,
    Utc
  };

  use super::TaskStore;
  use crate::classifier::classify;
  use crate::datastore::{
    MemorySlot,
    Slot
  };
  use crate::error::StoreError;
  use crate::task::{
    Priority,
    Status,
    TaskInput
  };

  fn now() -> chrono::DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 2, 16, 5, 0, 0
      )
      .single()
      .expect("valid now")
  }

  struct BrokenSlot;

  impl Slot for BrokenSlot {
    fn name(&self) -> &str {
      "broken"
    }

    fn read(
      &self
    ) -> anyhow::Result<Option<String>>
    {
      Err(anyhow!("disk unplugged"))
    }

    fn write(
      &self,
      _payload: &str
    ) -> anyhow::Result<()> {
      Err(anyhow!("disk unplugged"))
    }
  }

  #[test]
  fn add_trims_and_appends() {
    let mut store = TaskStore::open(
      MemorySlot::new("tasks")
    );
    let task = store
      .add(
        TaskInput::new("  Call mom  ")
          .with_description(" soon "),
        now()
      )
      .expect("add");

    assert_eq!(store.list().len(), 1);
    assert_eq!(task.title, "Call mom");
    assert_eq!(task.description, "soon");
    assert_eq!(task.status, Status::Pending);
    assert_eq!(task.created_at, now());
    assert!(task.completed_at.is_none());
  }

  #[test]
  fn whitespace_title_is_rejected_without_change()
   {
    let slot = MemorySlot::new("tasks");
    let mut store = TaskStore::open(&slot);
    store
      .add(TaskInput::new("keep"), now())
      .expect("add");
    let before = store.list().to_vec();

    let err = store
      .add(TaskInput::new(" \t "), now())
      .expect_err("blank title");
    assert!(matches!(
      err,
      StoreError::Validation(_)
    ));
    assert_eq!(store.list(), before.as_slice());
  }

  #[test]
  fn edit_keeps_identity_and_completion() {
    let mut store = TaskStore::open(
      MemorySlot::new("tasks")
    );
    let task = store
      .add(TaskInput::new("Draft"), now())
      .expect("add");
    store
      .toggle_complete(&task.id, now())
      .expect("toggle");

    let edited = store
      .edit(
        &task.id,
        TaskInput::new("Final")
          .with_priority(Priority::High)
      )
      .expect("edit");

    assert_eq!(edited.id, task.id);
    assert_eq!(edited.title, "Final");
    assert_eq!(
      edited.priority,
      Priority::High
    );
    assert_eq!(
      edited.created_at,
      task.created_at
    );
    assert_eq!(
      edited.status,
      Status::Completed
    );
    assert_eq!(
      edited.completed_at,
      Some(now())
    );
  }

  #[test]
  fn edit_checks_existence_before_title()
  {
    let mut store = TaskStore::open(
      MemorySlot::new("tasks")
    );
    let err = store
      .edit("missing", TaskInput::new(""))
      .expect_err("missing id");
    assert!(matches!(
      err,
      StoreError::NotFound(_)
    ));
  }

  #[test]
  fn double_toggle_restores_pending() {
    let mut store = TaskStore::open(
      MemorySlot::new("tasks")
    );
    let task = store
      .add(TaskInput::new("Run"), now())
      .expect("add");

    let done = store
      .toggle_complete(
        &task.id,
        now() + Duration::hours(1)
      )
      .expect("complete");
    assert_eq!(
      done.completed_at,
      Some(now() + Duration::hours(1))
    );

    let reopened = store
      .toggle_complete(&task.id, now())
      .expect("reopen");
    assert_eq!(
      reopened.status,
      Status::Pending
    );
    assert!(
      reopened.completed_at.is_none()
    );
  }

  #[test]
  fn removing_unknown_id_leaves_store_intact()
   {
    let mut store = TaskStore::open(
      MemorySlot::new("tasks")
    );
    store
      .add(TaskInput::new("a"), now())
      .expect("add");
    let before = store.list().to_vec();

    let err = store
      .remove("nope")
      .expect_err("unknown id");
    assert!(matches!(
      err,
      StoreError::NotFound(_)
    ));
    assert_eq!(store.list(), before.as_slice());
  }

  #[test]
  fn toggle_and_suggest_on_unknown_id_are_not_found()
  {
    let slot = MemorySlot::new("tasks");
    let mut store = TaskStore::open(&slot);
    store
      .add(TaskInput::new("a"), now())
      .expect("add");
    let before = store.list().to_vec();
    let payload = slot.read().expect("read");

    let err = store
      .toggle_complete("nope", now())
      .expect_err("unknown id");
    assert!(matches!(
      err,
      StoreError::NotFound(_)
    ));

    let err = store
      .apply_suggestion(
        "nope",
        &classify("Go for a run", "")
      )
      .expect_err("unknown id");
    assert!(matches!(
      err,
      StoreError::NotFound(_)
    ));

    assert_eq!(store.list(), before.as_slice());
    assert_eq!(
      slot.read().expect("read"),
      payload
    );
  }

  #[test]
  fn every_mutation_is_mirrored_to_the_slot()
   {
    let slot = MemorySlot::new("tasks");
    let mut store = TaskStore::open(&slot);
    let task = store
      .add(TaskInput::new("a"), now())
      .expect("add");
    store
      .add(TaskInput::new("b"), now())
      .expect("add");
    store.remove(&task.id).expect("remove");

    let reloaded = TaskStore::open(&slot);
    assert_eq!(reloaded.list(), store.list());
    assert_eq!(reloaded.list().len(), 1);
    assert_eq!(reloaded.list()[0].title, "b");
  }

  #[test]
  fn write_failure_keeps_in_memory_change()
  {
    let mut store =
      TaskStore::open(BrokenSlot);
    assert!(store.list().is_empty());

    let task = store
      .add(TaskInput::new("survives"), now())
      .expect("add succeeds");
    assert_eq!(store.list().len(), 1);
    assert_eq!(store.list()[0].id, task.id);

    let err = store
      .take_write_error()
      .expect("write error recorded");
    assert!(matches!(
      err,
      StoreError::Persistence { .. }
    ));
    assert!(store.take_write_error().is_none());
  }

  #[test]
  fn corrupt_slot_degrades_to_empty() {
    let store = TaskStore::open(
      MemorySlot::with_payload(
        "tasks", "{oops"
      )
    );
    assert!(store.list().is_empty());
  }

  #[test]
  fn load_repairs_broken_records() {
    let raw = r#"[
      {"id":"a","title":"one","priority":"low","status":"pending",
       "createdAt":"2026-01-01T00:00:00.000Z",
       "completedAt":"2026-01-02T00:00:00.000Z"},
      {"id":"a","title":"dup","priority":"low","status":"pending",
       "createdAt":"2026-01-01T00:00:00.000Z"},
      {"id":"b","title":"  ","priority":"low","status":"pending",
       "createdAt":"2026-01-01T00:00:00.000Z"},
      {"id":"c","title":"done","priority":"high","status":"completed",
       "createdAt":"2026-01-01T00:00:00.000Z"}
    ]"#;
    let store = TaskStore::open(
      MemorySlot::with_payload(
        "tasks", raw
      )
    );

    let tasks = store.list();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "one");
    assert!(tasks[0].completed_at.is_none());
    assert_eq!(
      tasks[1].completed_at,
      Some(tasks[1].created_at)
    );
  }

  #[test]
  fn resolve_accepts_unique_prefix() {
    let mut store = TaskStore::open(
      MemorySlot::new("tasks")
    );
    let task = store
      .add(TaskInput::new("a"), now())
      .expect("add");

    let found = store
      .resolve(task.short_id())
      .expect("resolve prefix");
    assert_eq!(found.id, task.id);
    assert!(store.resolve("").is_err());
    assert!(store.resolve("zzzz").is_err());
  }

  #[test]
  fn applying_suggestion_copies_labels_only()
   {
    let mut store = TaskStore::open(
      MemorySlot::new("tasks")
    );
    let task = store
      .add(
        TaskInput::new(
          "Buy groceries tomorrow"
        ),
        now()
      )
      .expect("add");

    let suggestion = classify(
      &task.title,
      &task.description
    );
    let updated = store
      .apply_suggestion(
        &task.id,
        &suggestion
      )
      .expect("apply");

    assert_eq!(
      updated.priority,
      Priority::High
    );
    assert_eq!(
      updated.category.as_deref(),
      Some("shopping")
    );
    assert_eq!(
      updated.urgency.as_deref(),
      Some("immediate")
    );
    assert_eq!(updated.title, task.title);
  }
}
