use std::fs;
use std::io::Write;
use std::path::{
  Path,
  PathBuf
};
use std::sync::Mutex;

use anyhow::{
  Context,
  anyhow
};
use tempfile::NamedTempFile;
use tracing::{
  debug,
  info
};

use crate::task::Task;

/// A single named key-value location
/// holding the serialized task list.
pub trait Slot {
  fn name(&self) -> &str;

  /// Returns `None` when nothing has
  /// been written yet.
  fn read(
    &self
  ) -> anyhow::Result<Option<String>>;

  fn write(
    &self,
    payload: &str
  ) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct FileSlot {
  name: String,
  pub path: PathBuf
}

impl FileSlot {
  #[tracing::instrument(skip(data_dir))]
  pub fn open(
    data_dir: &Path,
    name: &str
  ) -> anyhow::Result<Self> {
    if name.trim().is_empty()
      || name.contains(['/', '\\'])
    {
      return Err(anyhow!(
        "invalid slot name: {name:?}"
      ));
    }

    fs::create_dir_all(data_dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          data_dir.display()
        )
      })?;

    let path = data_dir
      .join(format!("{name}.json"));

    info!(
      data_dir = %data_dir.display(),
      slot = %path.display(),
      "opened file slot"
    );

    Ok(Self {
      name: name.to_string(),
      path
    })
  }
}

impl Slot for FileSlot {
  fn name(&self) -> &str {
    &self.name
  }

  #[tracing::instrument(skip(self), fields(slot = %self.path.display()))]
  fn read(
    &self
  ) -> anyhow::Result<Option<String>> {
    if !self.path.exists() {
      debug!("slot file absent");
      return Ok(None);
    }
    let raw =
      fs::read_to_string(&self.path)
        .with_context(|| {
          format!(
            "failed reading {}",
            self.path.display()
          )
        })?;
    Ok(Some(raw))
  }

  #[tracing::instrument(skip(self, payload), fields(slot = %self.path.display()))]
  fn write(
    &self,
    payload: &str
  ) -> anyhow::Result<()> {
    debug!(
      bytes = payload.len(),
      "writing slot atomically"
    );

    let dir = self
      .path
      .parent()
      .unwrap_or_else(|| Path::new("."));
    let mut temp =
      NamedTempFile::new_in(dir)?;
    temp.write_all(payload.as_bytes())?;
    temp.flush()?;

    temp.persist(&self.path).map_err(
      |err| {
        anyhow!(
          "failed to persist {}: {}",
          self.path.display(),
          err
        )
      }
    )?;

    Ok(())
  }
}

/// Process-local slot; nothing survives
/// the session.
#[derive(Debug, Default)]
pub struct MemorySlot {
  name:  String,
  value: Mutex<Option<String>>
}

impl MemorySlot {
  pub fn new(name: &str) -> Self {
    Self {
      name:  name.to_string(),
      value: Mutex::new(None)
    }
  }

  pub fn with_payload(
    name: &str,
    payload: &str
  ) -> Self {
    Self {
      name:  name.to_string(),
      value: Mutex::new(Some(
        payload.to_string()
      ))
    }
  }
}

impl Slot for MemorySlot {
  fn name(&self) -> &str {
    &self.name
  }

  fn read(
    &self
  ) -> anyhow::Result<Option<String>> {
    let guard =
      self.value.lock().map_err(|_| {
        anyhow!(
          "memory slot {} poisoned",
          self.name
        )
      })?;
    Ok(guard.clone())
  }

  fn write(
    &self,
    payload: &str
  ) -> anyhow::Result<()> {
    let mut guard =
      self.value.lock().map_err(|_| {
        anyhow!(
          "memory slot {} poisoned",
          self.name
        )
      })?;
    *guard = Some(payload.to_string());
    Ok(())
  }
}

impl<S: Slot + ?Sized> Slot for &S {
  fn name(&self) -> &str {
    (**self).name()
  }

  fn read(
    &self
  ) -> anyhow::Result<Option<String>> {
    (**self).read()
  }

  fn write(
    &self,
    payload: &str
  ) -> anyhow::Result<()> {
    (**self).write(payload)
  }
}

#[tracing::instrument(skip(tasks))]
pub fn encode_tasks(
  tasks: &[Task]
) -> anyhow::Result<String> {
  serde_json::to_string(tasks)
    .context("failed to encode tasks")
}

/// An empty or whitespace payload is an
/// empty list.
#[tracing::instrument(skip(raw))]
pub fn decode_tasks(
  raw: &str
) -> anyhow::Result<Vec<Task>> {
  if raw.trim().is_empty() {
    return Ok(Vec::new());
  }
  let tasks: Vec<Task> =
    serde_json::from_str(raw)
      .context("failed to decode tasks")?;
  debug!(
    count = tasks.len(),
    "decoded tasks"
  );
  Ok(tasks)
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::{
    FileSlot,
    MemorySlot,
    Slot,
    decode_tasks
  };

  #[test]
  fn file_slot_reads_none_until_written()
  {
    let temp =
      tempdir().expect("tempdir");
    let slot =
      FileSlot::open(temp.path(), "tasks")
        .expect("open slot");

    assert!(
      slot
        .read()
        .expect("read empty")
        .is_none()
    );

    slot
      .write("[]")
      .expect("write slot");
    assert_eq!(
      slot
        .read()
        .expect("read written")
        .as_deref(),
      Some("[]")
    );
    assert!(
      temp.path().join("tasks.json").exists()
    );
  }

  #[test]
  fn file_slot_rejects_path_like_names() {
    let temp =
      tempdir().expect("tempdir");
    assert!(
      FileSlot::open(temp.path(), "../x")
        .is_err()
    );
    assert!(
      FileSlot::open(temp.path(), "  ")
        .is_err()
    );
  }

  #[test]
  fn memory_slot_keeps_last_write() {
    let slot = MemorySlot::new("tasks");
    slot.write("[1]").expect("write");
    slot.write("[2]").expect("write");
    assert_eq!(
      slot
        .read()
        .expect("read")
        .as_deref(),
      Some("[2]")
    );
  }

  #[test]
  fn blank_payload_decodes_to_empty_list()
  {
    assert!(
      decode_tasks("  \n")
        .expect("decode blank")
        .is_empty()
    );
    assert!(
      decode_tasks("{not json")
        .is_err()
    );
  }
}
