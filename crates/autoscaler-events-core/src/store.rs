//! The `EventStore` trait.
//!
//! Implemented by storage backends (e.g. `autoscaler-events-store-sqlite`).
//! The retention driver and the operator binary depend on this abstraction,
//! not on any concrete backend.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};

use crate::event::{EventRecord, ExpiredEvents, NewEvent};

/// Persistence for autoscaler events with deduplication lookups and
/// bounded, time-based expiry.
///
/// Every method is a single request against the backend; nothing is cached
/// and nothing is retried. Callers own transaction boundaries and retry
/// policy.
pub trait EventStore: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  // ── Lookups ───────────────────────────────────────────────────────────

  /// Return the row of the `(job_key, reason, event_key)` series with the
  /// greatest `id`, or `None` if the series has no rows.
  ///
  /// Recency is decided by `id` alone, never by `create_time`.
  fn find_latest<'a>(
    &'a self,
    job_key: &'a str,
    reason: &'a str,
    event_key: &'a str,
  ) -> impl Future<Output = Result<Option<EventRecord>, Self::Error>> + Send + 'a;

  /// Return every row for `(job_key, reason)` across all event keys, in
  /// whatever order the backend yields them. Diagnostic use only.
  fn find_series<'a>(
    &'a self,
    job_key: &'a str,
    reason: &'a str,
  ) -> impl Future<Output = Result<Vec<EventRecord>, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert a new row stamped with the store's clock.
  ///
  /// No uniqueness is enforced; check [`find_latest`](Self::find_latest)
  /// first to fold repeats into an existing row.
  fn create(
    &self,
    event: NewEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert a new row with `create_time = update_time = at` and
  /// `event_count = 1`.
  fn create_at(
    &self,
    event: NewEvent,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Overwrite `message` and `event_count` of row `id` and refresh its
  /// `update_time`.
  ///
  /// Fails with a state violation unless exactly one row was affected.
  fn update(
    &self,
    id: i64,
    message: String,
    event_count: u32,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Retention ─────────────────────────────────────────────────────────

  /// Count the rows older than `now - ttl` that lie below the expiry
  /// boundary, and report the largest such `id`.
  ///
  /// The boundary is the smallest `id` whose row is not expired; with no
  /// such row every row older than the cutoff counts. Both values come from
  /// one statement so they describe the same snapshot.
  fn compute_expiry(
    &self,
    ttl: Duration,
  ) -> impl Future<Output = Result<Option<ExpiredEvents>, Self::Error>> + Send + '_;

  /// Delete at most `batch_size` rows with `id <= max_target_id` and return
  /// how many were deleted. Which eligible rows go first is unspecified.
  fn prune_batch(
    &self,
    max_target_id: i64,
    batch_size: u32,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// The current instant according to the store's clock.
  fn now(&self) -> DateTime<Utc>;
}
