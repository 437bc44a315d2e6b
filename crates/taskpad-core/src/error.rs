//! Errors surfaced by task store
//! operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  /// The input was rejected; the store
  /// is unchanged.
  #[error("validation error: {0}")]
  Validation(String),

  /// No task matched the given id.
  #[error("task not found: {0}")]
  NotFound(String),

  /// The durable slot could not be read
  /// or written.
  #[error("persistence error on slot {slot}: {source:#}")]
  Persistence {
    slot:   String,
    #[source]
    source: anyhow::Error
  }
}
