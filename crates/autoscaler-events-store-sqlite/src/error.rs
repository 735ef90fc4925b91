//! Error type for `autoscaler-events-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] autoscaler_events_core::Error),

  /// The database rejected or failed a statement. Passed through untouched.
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// An update by id touched a row count other than one. The row was deleted
  /// underneath the caller or ids collided; this is never retried.
  #[error("update of event id={id} affected {affected} rows, expected exactly 1")]
  StateViolation { id: i64, affected: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
