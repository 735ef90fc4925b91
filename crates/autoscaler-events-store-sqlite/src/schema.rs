//! SQL schema for the autoscaler event table.
//!
//! Executed once at connection startup. Migrations are out of scope; the
//! statements are idempotent thanks to `IF NOT EXISTS`.

/// Full schema DDL.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- AUTOINCREMENT keeps ids strictly increasing and never reuses the id of a
-- pruned row, so the largest id in a series is always its latest row.
CREATE TABLE IF NOT EXISTS autoscaler_event_handler (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    create_time  INTEGER NOT NULL,   -- microseconds since the Unix epoch, UTC
    update_time  INTEGER NOT NULL,
    job_key      TEXT    NOT NULL,
    reason       TEXT    NOT NULL,
    event_type   TEXT    NOT NULL,
    message      TEXT    NOT NULL,
    event_count  INTEGER NOT NULL,
    event_key    TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS event_series_idx
    ON autoscaler_event_handler(job_key, reason, event_key);
CREATE INDEX IF NOT EXISTS event_create_time_idx
    ON autoscaler_event_handler(create_time);
";
