//! Unit tests for `NodeResourceRepo`.

use std::sync::Arc;

use vpar_control::models::node::NodeResource;
use vpar_control::persistence::db;
use vpar_control::persistence::node_repo::{NodeResourceRepo, UpsertOutcome};
use vpar_control::AppError;

fn sample(address: &str) -> NodeResource {
    NodeResource::from_observation(
        address.into(),
        Some(format!("{address}-host")),
        "ia64 hp Integrity BL890c i4 nPar".into(),
        8,
        5,
        65424,
        55936,
        557,
        91,
    )
}

#[tokio::test]
async fn create_then_get_round_trips_fields() {
    let repo = NodeResourceRepo::new(Arc::new(db::connect_memory().await.expect("db")));
    let node = sample("192.168.169.100");
    repo.create(&node).await.expect("create");

    let stored = repo
        .get_by_address("192.168.169.100")
        .await
        .expect("get")
        .expect("present");
    assert_eq!(stored, node);
    assert_eq!(stored.vcpus_used, 3);
    assert_eq!(stored.disk_gb_used, 466);
}

#[tokio::test]
async fn get_missing_returns_none() {
    let repo = NodeResourceRepo::new(Arc::new(db::connect_memory().await.expect("db")));
    assert!(repo.get_by_address("10.0.0.1").await.expect("get").is_none());
}

#[tokio::test]
async fn list_all_keeps_insertion_order() {
    let repo = NodeResourceRepo::new(Arc::new(db::connect_memory().await.expect("db")));
    for address in ["10.0.0.3", "10.0.0.1", "10.0.0.2"] {
        repo.create(&sample(address)).await.expect("create");
    }
    let addresses: Vec<String> = repo
        .list_all()
        .await
        .expect("list")
        .into_iter()
        .map(|n| n.address)
        .collect();
    assert_eq!(addresses, vec!["10.0.0.3", "10.0.0.1", "10.0.0.2"]);
}

#[tokio::test]
async fn update_missing_is_not_found() {
    let repo = NodeResourceRepo::new(Arc::new(db::connect_memory().await.expect("db")));
    let err = repo.update(&sample("10.0.0.9")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn upsert_writes_only_on_change() {
    let repo = NodeResourceRepo::new(Arc::new(db::connect_memory().await.expect("db")));
    let mut node = sample("10.0.0.1");

    assert_eq!(repo.upsert_if_changed(&node).await.unwrap(), UpsertOutcome::Created);
    assert_eq!(repo.upsert_if_changed(&node).await.unwrap(), UpsertOutcome::Unchanged);

    node.memory_mb_used += 1024;
    assert_eq!(repo.upsert_if_changed(&node).await.unwrap(), UpsertOutcome::Updated);
    let stored = repo.get_by_address("10.0.0.1").await.unwrap().unwrap();
    assert_eq!(stored.memory_mb_used, node.memory_mb_used);

    assert!(!UpsertOutcome::Unchanged.wrote());
    assert!(UpsertOutcome::Updated.wrote());
}

#[tokio::test]
async fn file_database_is_created_on_connect() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("vpar.db");
    let pool = db::connect(&path).await.expect("connect");
    let repo = NodeResourceRepo::new(Arc::new(pool));
    repo.create(&sample("10.0.0.1")).await.expect("create");
    assert!(path.exists());
}
