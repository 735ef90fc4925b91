//! [`SqliteEventStore`] — the SQLite implementation of [`EventStore`].

use std::{path::Path, sync::Arc, time::Duration};

use autoscaler_events_core::{
  clock::{Clock, SystemClock},
  event::{EventRecord, ExpiredEvents, NewEvent},
  retention::expiry_cutoff,
  store::EventStore,
};
use chrono::{DateTime, Utc};
use rusqlite::{OpenFlags, OptionalExtension as _};

use crate::{
  encode::{encode_dt, RawEvent, EVENT_COLUMNS},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An autoscaler event store backed by SQLite.
///
/// Cloning is cheap — the inner connection and clock are reference-counted.
/// Several stores may share one database file; the only cross-store race
/// that matters, an update racing a prune, is detected by
/// [`Error::StateViolation`].
#[derive(Clone)]
pub struct SqliteEventStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
}

impl SqliteEventStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::from_connection(conn).await
  }

  /// Open a store whose database file must already exist. Used by read-only
  /// callers so a mistyped path fails instead of yielding an empty table.
  pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
      | OpenFlags::SQLITE_OPEN_URI
      | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = tokio_rusqlite::Connection::open_with_flags(path, flags).await?;
    Self::from_connection(conn).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::from_connection(conn).await
  }

  /// Wrap a connection owned by the caller. The schema is created if missing.
  pub async fn from_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let store = Self { conn, clock: Arc::new(SystemClock) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the clock used to stamp writes and compute expiry.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── EventStore impl ─────────────────────────────────────────────────────────

impl EventStore for SqliteEventStore {
  type Error = Error;

  // ── Lookups ───────────────────────────────────────────────────────────────

  async fn find_latest(
    &self,
    job_key:   &str,
    reason:    &str,
    event_key: &str,
  ) -> Result<Option<EventRecord>> {
    let job_key   = job_key.to_owned();
    let reason    = reason.to_owned();
    let event_key = event_key.to_owned();

    // Every row of the series is fetched and compared by id here; the
    // "ORDER BY id DESC LIMIT 1" shortcut is not portable across backends.
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM autoscaler_event_handler
           WHERE job_key = ?1 AND reason = ?2 AND event_key = ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![job_key, reason, event_key], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let records = raws
      .into_iter()
      .map(RawEvent::into_record)
      .collect::<Result<Vec<_>>>()?;

    Ok(EventRecord::latest(records))
  }

  async fn find_series(&self, job_key: &str, reason: &str) -> Result<Vec<EventRecord>> {
    let job_key = job_key.to_owned();
    let reason  = reason.to_owned();

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM autoscaler_event_handler
           WHERE job_key = ?1 AND reason = ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![job_key, reason], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_record).collect()
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn create(&self, event: NewEvent) -> Result<()> {
    self.create_at(event, self.clock.now()).await
  }

  async fn create_at(&self, event: NewEvent, at: DateTime<Utc>) -> Result<()> {
    let at_micros = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO autoscaler_event_handler (
             create_time, update_time, job_key, reason,
             event_type, message, event_count, event_key
           ) VALUES (?1, ?1, ?2, ?3, ?4, ?5, 1, ?6)",
          rusqlite::params![
            at_micros,
            event.job_key,
            event.reason,
            event.event_type,
            event.message,
            event.event_key,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update(&self, id: i64, message: String, event_count: u32) -> Result<()> {
    let updated_micros = encode_dt(self.clock.now());

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE autoscaler_event_handler
           SET update_time = ?1, message = ?2, event_count = ?3
           WHERE id = ?4",
          rusqlite::params![updated_micros, message, event_count, id],
        )?)
      })
      .await?;

    if affected != 1 {
      return Err(Error::StateViolation { id, affected });
    }
    tracing::debug!(id, event_count, "updated event");
    Ok(())
  }

  // ── Retention ─────────────────────────────────────────────────────────────

  async fn compute_expiry(&self, ttl: Duration) -> Result<Option<ExpiredEvents>> {
    let cutoff_micros = encode_dt(expiry_cutoff(self.clock.now(), ttl)?);

    // Boundary and aggregate share one statement, hence one snapshot. A row
    // older than the cutoff but above the boundary (clock skew between
    // writers) is left alone.
    let row: Option<(i64, Option<i64>)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "WITH boundary AS (
               SELECT MIN(id) AS id FROM autoscaler_event_handler
               WHERE create_time >= ?1
             )
             SELECT COUNT(1), MAX(e.id)
             FROM autoscaler_event_handler e, boundary b
             WHERE e.create_time < ?1
               AND (b.id IS NULL OR e.id < b.id)",
            rusqlite::params![cutoff_micros],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?)
      })
      .await?;

    Ok(row.map(|(count, max_id)| ExpiredEvents {
      expired_count:  u64::try_from(count).unwrap_or_default(),
      max_expired_id: max_id.unwrap_or_default(),
    }))
  }

  async fn prune_batch(&self, max_target_id: i64, batch_size: u32) -> Result<u64> {
    // `DELETE ... LIMIT` needs SQLITE_ENABLE_UPDATE_DELETE_LIMIT; bound the
    // id set in a subquery instead.
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM autoscaler_event_handler
           WHERE id IN (
             SELECT id FROM autoscaler_event_handler WHERE id <= ?1 LIMIT ?2
           )",
          rusqlite::params![max_target_id, batch_size],
        )?)
      })
      .await?;

    tracing::debug!(max_target_id, batch_size, deleted, "pruned event batch");
    Ok(deleted as u64)
  }

  fn now(&self) -> DateTime<Utc> { self.clock.now() }
}
