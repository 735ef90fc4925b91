//! The retention cycle: compute the expiry boundary once, then delete in
//! bounded batches until the expired rows are gone.
//!
//! A cycle is not atomic. If it is interrupted part-way, the rows already
//! deleted stay deleted and the next cycle recomputes the boundary and picks
//! up the remainder, so expired rows are eventually pruned rather than
//! pruned exactly once.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Error, Result, store::EventStore};

/// Events older than this are eligible for pruning by default (90 days).
pub const DEFAULT_TTL: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Maximum rows removed by a single delete statement by default.
pub const DEFAULT_BATCH_SIZE: u32 = 4098;

/// How old an event may get and how many rows one delete may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
  pub ttl:        Duration,
  pub batch_size: u32,
}

impl Default for RetentionPolicy {
  fn default() -> Self {
    Self { ttl: DEFAULT_TTL, batch_size: DEFAULT_BATCH_SIZE }
  }
}

/// Outcome of one [`prune_expired`] cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
  /// Rows the expiry computation reported at the start of the cycle.
  pub expired: u64,
  pub deleted: u64,
  /// Delete statements issued.
  pub batches: u64,
}

/// `now - ttl`, the instant before which a row counts as expired.
pub fn expiry_cutoff(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
  chrono::Duration::from_std(ttl)
    .ok()
    .and_then(|ttl| now.checked_sub_signed(ttl))
    .ok_or(Error::TtlOutOfRange(ttl))
}

/// Run one retention cycle against `store`.
///
/// Issues at most `ceil(expired / batch_size)` deletes, all bounded by the
/// same `max_expired_id`, and stops early once a delete affects no rows.
pub async fn prune_expired<S: EventStore>(
  store: &S,
  policy: &RetentionPolicy,
) -> Result<PruneReport, S::Error> {
  if policy.batch_size == 0 {
    return Err(Error::InvalidBatchSize.into());
  }

  let expiry = match store.compute_expiry(policy.ttl).await? {
    Some(e) if e.expired_count > 0 => e,
    _ => {
      tracing::debug!("no expired events");
      return Ok(PruneReport::default());
    }
  };

  let mut report = PruneReport { expired: expiry.expired_count, ..Default::default() };
  let max_batches = expiry.expired_count.div_ceil(u64::from(policy.batch_size));

  while report.batches < max_batches {
    let deleted = store
      .prune_batch(expiry.max_expired_id, policy.batch_size)
      .await?;
    report.batches += 1;
    report.deleted += deleted;
    if deleted == 0 {
      break;
    }
  }

  if report.deleted < report.expired {
    tracing::warn!(
      expired = report.expired,
      deleted = report.deleted,
      "retention cycle removed fewer rows than were expired"
    );
  }
  tracing::info!(
    expired = report.expired,
    deleted = report.deleted,
    batches = report.batches,
    max_expired_id = expiry.max_expired_id,
    "pruned expired events"
  );

  Ok(report)
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use chrono::TimeZone;

  use super::*;
  use crate::{
    clock::{Clock, ManualClock},
    event::{EventRecord, ExpiredEvents, NewEvent},
  };

  /// In-memory store with the same expiry semantics as the SQL backends.
  struct MemoryStore {
    rows:    Mutex<Vec<EventRecord>>,
    clock:   Arc<ManualClock>,
    deletes: Mutex<Vec<(i64, u32)>>,
    /// When set, returned by `compute_expiry` instead of a fresh computation.
    stale:   Mutex<Option<ExpiredEvents>>,
  }

  impl MemoryStore {
    fn new(clock: Arc<ManualClock>) -> Self {
      Self {
        rows: Mutex::new(Vec::new()),
        clock,
        deletes: Mutex::new(Vec::new()),
        stale: Mutex::new(None),
      }
    }

    fn len(&self) -> usize { self.rows.lock().unwrap().len() }
  }

  impl EventStore for MemoryStore {
    type Error = Error;

    async fn find_latest(
      &self,
      job_key: &str,
      reason: &str,
      event_key: &str,
    ) -> Result<Option<EventRecord>> {
      let rows = self.rows.lock().unwrap().clone();
      Ok(EventRecord::latest(rows.into_iter().filter(|r| {
        r.job_key == job_key && r.reason == reason && r.event_key == event_key
      })))
    }

    async fn find_series(&self, job_key: &str, reason: &str) -> Result<Vec<EventRecord>> {
      let rows = self.rows.lock().unwrap();
      Ok(
        rows
          .iter()
          .filter(|r| r.job_key == job_key && r.reason == reason)
          .cloned()
          .collect(),
      )
    }

    async fn create(&self, event: NewEvent) -> Result<()> {
      self.create_at(event, self.clock.now()).await
    }

    async fn create_at(&self, event: NewEvent, at: DateTime<Utc>) -> Result<()> {
      let mut rows = self.rows.lock().unwrap();
      let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
      rows.push(EventRecord {
        id,
        create_time: at,
        update_time: at,
        job_key: event.job_key,
        reason: event.reason,
        event_type: event.event_type,
        message: event.message,
        event_count: 1,
        event_key: event.event_key,
      });
      Ok(())
    }

    async fn update(&self, id: i64, message: String, event_count: u32) -> Result<()> {
      let mut rows = self.rows.lock().unwrap();
      let row = rows.iter_mut().find(|r| r.id == id).unwrap();
      row.message = message;
      row.event_count = event_count;
      row.update_time = self.clock.now();
      Ok(())
    }

    async fn compute_expiry(&self, ttl: Duration) -> Result<Option<ExpiredEvents>> {
      if let Some(stale) = *self.stale.lock().unwrap() {
        return Ok(Some(stale));
      }
      let cutoff = expiry_cutoff(self.clock.now(), ttl)?;
      let rows = self.rows.lock().unwrap();
      let boundary = rows
        .iter()
        .filter(|r| r.create_time >= cutoff)
        .map(|r| r.id)
        .min();
      let expired: Vec<i64> = rows
        .iter()
        .filter(|r| r.create_time < cutoff && boundary.is_none_or(|b| r.id < b))
        .map(|r| r.id)
        .collect();
      Ok(Some(ExpiredEvents {
        expired_count:  expired.len() as u64,
        max_expired_id: expired.iter().copied().max().unwrap_or(0),
      }))
    }

    async fn prune_batch(&self, max_target_id: i64, batch_size: u32) -> Result<u64> {
      self.deletes.lock().unwrap().push((max_target_id, batch_size));
      let mut rows = self.rows.lock().unwrap();
      let mut budget = batch_size;
      let before = rows.len();
      rows.retain(|r| {
        if budget > 0 && r.id <= max_target_id {
          budget -= 1;
          false
        } else {
          true
        }
      });
      Ok((before - rows.len()) as u64)
    }

    fn now(&self) -> DateTime<Utc> { self.clock.now() }
  }

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() }

  fn event() -> NewEvent {
    NewEvent::new("job-1", "ScalingReport", "Normal", "scaled", "vertex-a")
  }

  async fn seeded(days_ago: &[i64]) -> MemoryStore {
    let store = MemoryStore::new(Arc::new(ManualClock::new(now())));
    for d in days_ago {
      store
        .create_at(event(), now() - chrono::Duration::days(*d))
        .await
        .unwrap();
    }
    store
  }

  fn policy(days: u64, batch_size: u32) -> RetentionPolicy {
    RetentionPolicy { ttl: Duration::from_secs(days * 86_400), batch_size }
  }

  #[test]
  fn cutoff_subtracts_ttl() {
    let cutoff = expiry_cutoff(now(), Duration::from_secs(3600)).unwrap();
    assert_eq!(cutoff, now() - chrono::Duration::hours(1));
  }

  #[test]
  fn cutoff_rejects_unrepresentable_ttl() {
    let err = expiry_cutoff(now(), Duration::from_secs(u64::MAX)).unwrap_err();
    assert!(matches!(err, Error::TtlOutOfRange(_)));
  }

  #[test]
  fn default_policy_matches_handler_defaults() {
    let p = RetentionPolicy::default();
    assert_eq!(p.ttl, Duration::from_secs(7_776_000));
    assert_eq!(p.batch_size, 4098);
  }

  #[tokio::test]
  async fn prunes_all_expired_rows_in_bounded_batches() {
    let store = seeded(&[20, 19, 18, 17, 16, 1]).await;

    let report = prune_expired(&store, &policy(10, 2)).await.unwrap();

    assert_eq!(report, PruneReport { expired: 5, deleted: 5, batches: 3 });
    assert_eq!(store.len(), 1);
    let deletes = store.deletes.lock().unwrap().clone();
    assert!(deletes.iter().all(|&(max, batch)| max == 5 && batch == 2));
  }

  #[tokio::test]
  async fn nothing_expired_issues_no_delete() {
    let store = seeded(&[2, 1]).await;

    let report = prune_expired(&store, &policy(10, 2)).await.unwrap();

    assert_eq!(report, PruneReport::default());
    assert!(store.deletes.lock().unwrap().is_empty());
    assert_eq!(store.len(), 2);
  }

  #[tokio::test]
  async fn stops_when_a_batch_deletes_nothing() {
    let store = seeded(&[30, 29, 28, 1]).await;
    // Another worker prunes the expired rows between this cycle's expiry
    // computation and its first delete.
    let expiry = store.compute_expiry(policy(10, 1).ttl).await.unwrap();
    *store.stale.lock().unwrap() = expiry;
    store.prune_batch(3, 10).await.unwrap();
    store.deletes.lock().unwrap().clear();

    let report = prune_expired(&store, &policy(10, 1)).await.unwrap();

    assert_eq!(report, PruneReport { expired: 3, deleted: 0, batches: 1 });
    assert_eq!(store.deletes.lock().unwrap().len(), 1);
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn zero_batch_size_is_rejected() {
    let store = seeded(&[30]).await;
    let err = prune_expired(&store, &policy(10, 0)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidBatchSize));
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn rows_after_the_boundary_survive_clock_skew() {
    // The third row is older than the cutoff but was inserted after a
    // non-expired row, so it sits above the boundary and must be kept.
    let store = seeded(&[30, 1, 40]).await;

    let report = prune_expired(&store, &policy(10, 10)).await.unwrap();

    assert_eq!(report, PruneReport { expired: 1, deleted: 1, batches: 1 });
    let remaining: Vec<i64> = store
      .find_series("job-1", "ScalingReport")
      .await
      .unwrap()
      .into_iter()
      .map(|r| r.id)
      .collect();
    assert_eq!(remaining, vec![2, 3]);
  }
}
