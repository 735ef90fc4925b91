//! Event records — one persisted occurrence series of an autoscaler event.
//!
//! A logical event series is identified by `(job_key, reason, event_key)`.
//! Repeat occurrences are folded into the latest row of the series by
//! bumping its `event_count` instead of appending a new row.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Classification ──────────────────────────────────────────────────────────

/// The classification labels the autoscaler raises events with.
///
/// The store persists the label as free-form text, so callers are not limited
/// to these two; see [`NewEvent::event_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
  Normal,
  Warning,
}

impl EventType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Normal => "Normal",
      Self::Warning => "Warning",
    }
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<EventType> for String {
  fn from(t: EventType) -> Self { t.as_str().to_owned() }
}

// ─── Stored record ───────────────────────────────────────────────────────────

/// One row of persisted event state.
///
/// `id` is assigned by the store and strictly increases in insertion order.
/// It is the only reliable recency signal within a series; timestamps of
/// different rows may collide or run backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
  pub id:          i64,
  pub create_time: DateTime<Utc>,
  /// Refreshed on every [`update`](crate::store::EventStore::update).
  pub update_time: DateTime<Utc>,
  pub job_key:     String,
  pub reason:      String,
  pub event_type:  String,
  pub message:     String,
  /// Occurrence counter; 1 on creation, only ever increased by callers.
  pub event_count: u32,
  /// Distinguishes concurrent series sharing a `job_key` and `reason`.
  pub event_key:   String,
}

impl EventRecord {
  /// Pick the most recent record by `id`, ignoring timestamps entirely.
  pub fn latest(records: impl IntoIterator<Item = Self>) -> Option<Self> {
    records.into_iter().max_by_key(|r| r.id)
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// Input for [`EventStore::create`](crate::store::EventStore::create).
/// The store assigns `id`, both timestamps and the initial count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
  pub job_key:    String,
  pub reason:     String,
  pub event_type: String,
  pub message:    String,
  pub event_key:  String,
}

impl NewEvent {
  pub fn new(
    job_key: impl Into<String>,
    reason: impl Into<String>,
    event_type: impl Into<String>,
    message: impl Into<String>,
    event_key: impl Into<String>,
  ) -> Self {
    Self {
      job_key:    job_key.into(),
      reason:     reason.into(),
      event_type: event_type.into(),
      message:    message.into(),
      event_key:  event_key.into(),
    }
  }
}

// ─── Expiry ──────────────────────────────────────────────────────────────────

/// Result of [`EventStore::compute_expiry`](crate::store::EventStore::compute_expiry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredEvents {
  /// Rows created before the cutoff and below the expiry boundary.
  pub expired_count:  u64,
  /// Largest `id` among those rows; `0` when `expired_count` is zero, which
  /// no row can match since ids start at 1.
  pub max_expired_id: i64,
}
