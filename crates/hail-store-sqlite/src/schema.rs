//! SQL schema for the Hail SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated
//! on the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// The enum columns mirror the core enums but do not enforce the state
/// machine; guarded transitions in application logic do.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    contact      TEXT NOT NULL UNIQUE,
    credential   TEXT NOT NULL,   -- opaque; never interpreted here
    role         TEXT NOT NULL,   -- 'rider' | 'driver'
    created_at   TEXT NOT NULL
);

-- 1:1 extension of a user with role = 'driver'.
-- Deleting the user cascades the driver row.
CREATE TABLE IF NOT EXISTS drivers (
    driver_id  TEXT PRIMARY KEY REFERENCES users(user_id) ON DELETE CASCADE,
    vehicle    TEXT NOT NULL,
    license    TEXT NOT NULL,
    rating     REAL NOT NULL DEFAULT 4.5,
    status     TEXT NOT NULL DEFAULT 'offline',  -- 'offline' | 'idle' | 'reserved'
    lat        REAL,             -- NULL until the driver first comes online
    lng        REAL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rides (
    ride_id     TEXT PRIMARY KEY,
    rider_id    TEXT NOT NULL REFERENCES users(user_id),
    driver_id   TEXT REFERENCES drivers(driver_id) ON DELETE SET NULL,
    origin_lat  REAL NOT NULL,
    origin_lng  REAL NOT NULL,
    dest_lat    REAL NOT NULL,
    dest_lng    REAL NOT NULL,
    status      TEXT NOT NULL DEFAULT 'requested',
    fare        REAL,            -- NULL until computed at drop-off
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Ride events are strictly append-only.
-- No UPDATE is ever issued; rows go away only via the ride cascade.
CREATE TABLE IF NOT EXISTS ride_events (
    event_id    TEXT PRIMARY KEY,
    ride_id     TEXT NOT NULL REFERENCES rides(ride_id) ON DELETE CASCADE,
    kind        TEXT NOT NULL,   -- discriminant of the payload variant
    payload     TEXT NOT NULL,   -- JSON
    recorded_at TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

-- At most one payment per ride, created only at completion.
CREATE TABLE IF NOT EXISTS payments (
    payment_id    TEXT PRIMARY KEY,
    ride_id       TEXT NOT NULL REFERENCES rides(ride_id) ON DELETE CASCADE,
    amount        REAL NOT NULL,
    currency      TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending',
    processor_ref TEXT,
    created_at    TEXT NOT NULL,
    UNIQUE (ride_id)
);

CREATE INDEX IF NOT EXISTS drivers_status_idx   ON drivers(status);
CREATE INDEX IF NOT EXISTS rides_rider_idx      ON rides(rider_id);
CREATE INDEX IF NOT EXISTS rides_driver_idx     ON rides(driver_id);
CREATE INDEX IF NOT EXISTS rides_status_idx     ON rides(status);
CREATE INDEX IF NOT EXISTS ride_events_ride_idx ON ride_events(ride_id, recorded_at);

PRAGMA user_version = 1;
";
