//! Error types for `autoscaler-events-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("batch size must be greater than zero")]
  InvalidBatchSize,

  #[error("event ttl {0:?} is out of range")]
  TtlOutOfRange(std::time::Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
