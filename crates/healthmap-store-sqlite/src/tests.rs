//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use healthmap_core::{
  facility::{GeoPoint, NewFacility},
  store::{FacilityStore, RadiusQuery},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn query(lat: f64, lon: f64, radius_m: f64) -> RadiusQuery {
  RadiusQuery { center: GeoPoint::new(lon, lat), radius_m, limit: 50 }
}

// ─── Inserts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_by_natural_id() {
  let s = store().await;

  let mut input = NewFacility::new("2077485").at(-23.5573, -46.6699);
  input.name = "HOSPITAL DAS CLINICAS".into();
  input.region = "35".into();
  input.locality = "355030".into();

  let saved = s.insert(input.clone()).await.unwrap();
  assert!(saved.id > 0);

  let fetched = s.find_by_natural_id("2077485").await.unwrap().unwrap();
  assert_eq!(fetched.id, saved.id);
  assert_eq!(fetched.name, "HOSPITAL DAS CLINICAS");
  assert_eq!(fetched.region, "35");
  assert_eq!(fetched.locality, "355030");
  assert_eq!(fetched.location, input.location);
  assert_eq!(fetched.ingested_at, saved.ingested_at);
}

#[tokio::test]
async fn find_missing_returns_none() {
  let s = store().await;
  assert!(s.find_by_natural_id("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn exists_reflects_inserts() {
  let s = store().await;
  assert!(!s.exists("1").await.unwrap());
  s.insert(NewFacility::new("1")).await.unwrap();
  assert!(s.exists("1").await.unwrap());
  assert!(!s.exists("2").await.unwrap());
}

#[tokio::test]
async fn duplicate_insert_is_constraint_violation() {
  let s = store().await;
  s.insert(NewFacility::new("1").at(-23.5, -46.6)).await.unwrap();

  let err = s.insert(NewFacility::new("1")).await.unwrap_err();
  assert!(
    matches!(err, Error::ConstraintViolation { ref natural_id } if natural_id == "1"),
    "{err:?}"
  );
  assert_eq!(s.count().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_natural_id_is_refused() {
  let s = store().await;
  let err = s.insert(NewFacility::new("")).await.unwrap_err();
  assert!(matches!(err, Error::Database(_)), "{err:?}");
  assert_eq!(s.count().await.unwrap(), 0);
}

#[tokio::test]
async fn record_without_location_roundtrips() {
  let s = store().await;
  s.insert(NewFacility::new("bare")).await.unwrap();
  let f = s.find_by_natural_id("bare").await.unwrap().unwrap();
  assert!(f.location.is_none());
  assert!(f.latitude().is_none() && f.longitude().is_none());
}

// ─── Batch commits ───────────────────────────────────────────────────────────

#[tokio::test]
async fn commit_batch_saves_everything() {
  let s = store().await;
  let batch = (0..10).map(|i| NewFacility::new(format!("id-{i}"))).collect();
  let report = s.commit_batch(batch).await.unwrap();
  assert_eq!(report.saved, 10);
  assert!(report.rejected.is_empty());
  assert_eq!(s.count().await.unwrap(), 10);
}

#[tokio::test]
async fn commit_batch_isolates_faulty_record() {
  let s = store().await;
  s.insert(NewFacility::new("taken")).await.unwrap();

  let batch = vec![
    NewFacility::new("a").at(-23.5, -46.6),
    NewFacility::new("taken").at(-23.5, -46.6),
    NewFacility::new("b").at(-23.5, -46.6),
    NewFacility::new("a"),
    NewFacility::new("c"),
  ];
  let report = s.commit_batch(batch).await.unwrap();

  assert_eq!(report.saved, 3);
  let rejected: Vec<_> = report.rejected.iter().map(|r| r.natural_id.as_str()).collect();
  assert_eq!(rejected, ["taken", "a"]);

  for id in ["taken", "a", "b", "c"] {
    assert!(s.exists(id).await.unwrap(), "{id}");
  }
  assert_eq!(s.count().await.unwrap(), 4);

  // The rolled-back duplicate left no stray spatial index entry behind.
  let near = s.find_within_radius(query(-23.5, -46.6, 10.0)).await.unwrap();
  let ids: Vec<_> = near.iter().map(|f| f.natural_id.as_str()).collect();
  assert_eq!(ids, ["a", "b"]);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
  let s = store().await;
  let report = s.commit_batch(Vec::new()).await.unwrap();
  assert_eq!(report.saved, 0);
  assert_eq!(s.count().await.unwrap(), 0);
}

// ─── Radius queries ──────────────────────────────────────────────────────────

#[tokio::test]
async fn radius_query_separates_distant_facilities() {
  let s = store().await;
  s.insert(NewFacility::new("sao-paulo").at(-23.5, -46.6)).await.unwrap();
  s.insert(NewFacility::new("new-york").at(40.7, -74.0)).await.unwrap();

  let found = s.find_within_radius(query(-23.5, -46.6, 1000.0)).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].natural_id, "sao-paulo");
}

#[tokio::test]
async fn radius_is_geodesic_not_degrees() {
  let s = store().await;
  // 0.05° of longitude at 60°N is ~2.8 km; at the equator it is ~5.6 km.
  s.insert(NewFacility::new("north").at(60.0, 10.05)).await.unwrap();
  s.insert(NewFacility::new("equator").at(0.0, 10.05)).await.unwrap();

  let north = s.find_within_radius(query(60.0, 10.0, 3_000.0)).await.unwrap();
  assert_eq!(north.len(), 1);
  assert_eq!(north[0].natural_id, "north");

  let equator = s.find_within_radius(query(0.0, 10.0, 3_000.0)).await.unwrap();
  assert!(equator.is_empty());
}

#[tokio::test]
async fn radius_query_skips_unlocated_records() {
  let s = store().await;
  s.insert(NewFacility::new("bare")).await.unwrap();
  let found = s.find_within_radius(query(0.0, 0.0, 2.0e7)).await.unwrap();
  assert!(found.is_empty());
}

#[tokio::test]
async fn radius_query_respects_limit_and_insertion_order() {
  let s = store().await;
  for i in 0..5 {
    let offset = f64::from(i) * 0.001;
    s.insert(NewFacility::new(format!("f{i}")).at(-23.5 + offset, -46.6)).await.unwrap();
  }

  let mut q = query(-23.5, -46.6, 5_000.0);
  q.limit = 3;
  let found = s.find_within_radius(q).await.unwrap();
  let ids: Vec<_> = found.iter().map(|f| f.natural_id.as_str()).collect();
  assert_eq!(ids, ["f0", "f1", "f2"]);
}

#[tokio::test]
async fn radius_query_across_antimeridian() {
  let s = store().await;
  s.insert(NewFacility::new("fiji-east").at(-17.0, 179.99)).await.unwrap();
  s.insert(NewFacility::new("fiji-west").at(-17.0, -179.99)).await.unwrap();

  let found = s.find_within_radius(query(-17.0, 179.995, 5_000.0)).await.unwrap();
  assert_eq!(found.len(), 2);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopening_keeps_schema_and_data() {
  let path = std::env::temp_dir().join(format!("healthmap-{}.db", uuid::Uuid::new_v4()));

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.insert(NewFacility::new("persisted").at(-23.5, -46.6)).await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.exists("persisted").await.unwrap());
  let found = s.find_within_radius(query(-23.5, -46.6, 100.0)).await.unwrap();
  assert_eq!(found.len(), 1);

  drop(s);
  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}

#[tokio::test]
async fn reopening_does_not_wait_for_a_concurrent_writer() {
  let path = std::env::temp_dir().join(format!("healthmap-{}.db", uuid::Uuid::new_v4()));
  let first = SqliteStore::open(&path).await.unwrap();

  let writer = rusqlite::Connection::open(&path).unwrap();
  writer.execute_batch("BEGIN IMMEDIATE").unwrap();

  let second = tokio::time::timeout(Duration::from_secs(2), SqliteStore::open(&path))
    .await
    .expect("open blocked on the writer's lock")
    .unwrap();
  assert_eq!(second.count().await.unwrap(), 0);

  writer.execute_batch("ROLLBACK").unwrap();
  let version: i64 = writer.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
  assert_eq!(version, 1);

  drop((first, second, writer));
  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}
