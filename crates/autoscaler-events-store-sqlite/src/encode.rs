//! Encoding and decoding helpers between the domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as INTEGER microseconds since the Unix epoch, so SQL
//! comparisons order them in time for every instant chrono can represent.
//! The expiry statement relies on that.

use autoscaler_events_core::event::EventRecord;
use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Columns selected for an [`EventRecord`], in [`RawEvent::from_row`] order.
pub const EVENT_COLUMNS: &str = "id, create_time, update_time, job_key, reason, \
                                 event_type, message, event_count, event_key";

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

// Sub-microsecond precision is dropped. Every `DateTime<Utc>` fits: chrono's
// range is roughly ±262 000 years, i64 micros cover ±292 000.
pub fn encode_dt(dt: DateTime<Utc>) -> i64 { dt.timestamp_micros() }

pub fn decode_dt(micros: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_micros(micros)
    .ok_or_else(|| Error::DateParse(format!("{micros} micros is out of range")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an event row.
pub struct RawEvent {
  pub id:          i64,
  pub create_time: i64,
  pub update_time: i64,
  pub job_key:     String,
  pub reason:      String,
  pub event_type:  String,
  pub message:     String,
  pub event_count: u32,
  pub event_key:   String,
}

impl RawEvent {
  /// Read a row selected with [`EVENT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawEvent {
      id:          row.get(0)?,
      create_time: row.get(1)?,
      update_time: row.get(2)?,
      job_key:     row.get(3)?,
      reason:      row.get(4)?,
      event_type:  row.get(5)?,
      message:     row.get(6)?,
      event_count: row.get(7)?,
      event_key:   row.get(8)?,
    })
  }

  pub fn into_record(self) -> Result<EventRecord> {
    Ok(EventRecord {
      id:          self.id,
      create_time: decode_dt(self.create_time)?,
      update_time: decode_dt(self.update_time)?,
      job_key:     self.job_key,
      reason:      self.reason,
      event_type:  self.event_type,
      message:     self.message,
      event_count: self.event_count,
      event_key:   self.event_key,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn encoded_timestamps_order_chronologically() {
    let whole = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let later = whole + chrono::Duration::milliseconds(500);
    let far_future = Utc.with_ymd_and_hms(10_000, 1, 1, 0, 0, 0).unwrap();
    let far_past = Utc.with_ymd_and_hms(-50, 1, 1, 0, 0, 0).unwrap();

    let mut encoded =
      vec![encode_dt(far_future), encode_dt(later), encode_dt(whole), encode_dt(far_past)];
    encoded.sort();

    assert_eq!(encoded, vec![
      encode_dt(far_past),
      encode_dt(whole),
      encode_dt(later),
      encode_dt(far_future),
    ]);
    assert_eq!(encode_dt(whole), 1_704_110_400_000_000);
  }

  #[test]
  fn decode_inverts_encode() {
    let at = Utc.with_ymd_and_hms(2023, 7, 14, 8, 30, 15).unwrap()
      + chrono::Duration::microseconds(123_456);
    assert_eq!(decode_dt(encode_dt(at)).unwrap(), at);

    let far = Utc.with_ymd_and_hms(10_000, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(decode_dt(encode_dt(far)).unwrap(), far);
  }

  #[test]
  fn decode_rejects_out_of_range_micros() {
    assert!(matches!(decode_dt(i64::MAX), Err(Error::DateParse(_))));
  }
}
