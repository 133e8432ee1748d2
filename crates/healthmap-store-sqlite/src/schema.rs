//! SQL schema for the healthmap SQLite store.
//!
//! Executed at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`, which is written only while it is still 0.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Facilities are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS facilities (
    id          INTEGER PRIMARY KEY,
    natural_id  TEXT NOT NULL UNIQUE CHECK (length(natural_id) > 0),
    name        TEXT NOT NULL,
    region      TEXT NOT NULL,
    locality    TEXT NOT NULL,
    latitude    REAL,
    longitude   REAL,
    ingested_at TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

-- Spatial index over located facilities; `id` mirrors facilities.id.
-- Points are stored as degenerate boxes (min = max).
CREATE VIRTUAL TABLE IF NOT EXISTS facility_locations USING rtree(
    id,
    min_lon, max_lon,
    min_lat, max_lat
);
";

/// Value stored in `PRAGMA user_version` for this schema.
pub const SCHEMA_VERSION: i64 = 1;

/// Name of the scalar SQL function registered on every connection:
/// `geodesic_distance(lat1, lon1, lat2, lon2)` in metres.
pub const GEODESIC_DISTANCE_FN: &str = "geodesic_distance";
