//! Library Manager Integration Tests
//!
//! Authorization, refresh, deletion and change notification through the
//! manager.

mod common;

use std::sync::Arc;

use common::{as_sink, image, sized_asset, RecordingSink, ScriptedSource};
use medialib::{
    AssetId, AuthorizationStatus, EntryState, LibraryError, LibraryManager, PixelSize, SortKey,
    SortOrder,
};

fn library(assets: Vec<medialib::Asset>) -> (Arc<ScriptedSource>, LibraryManager) {
    let source = Arc::new(ScriptedSource::new(assets));
    let manager = LibraryManager::new(source.clone());
    (source, manager)
}

#[tokio::test]
async fn test_denied_source_is_unavailable() {
    let source = Arc::new(
        ScriptedSource::new(vec![sized_asset("a", 1)])
            .with_authorization(AuthorizationStatus::Denied, AuthorizationStatus::Authorized),
    );
    let manager = LibraryManager::new(source.clone());

    let err = manager.refresh().await.unwrap_err();

    assert!(matches!(err, LibraryError::ProviderUnavailable(_)));
    assert_eq!(source.authorization_requests(), 0);
    assert!(manager.snapshot().is_empty());
}

#[tokio::test]
async fn test_undetermined_source_is_asked_once() {
    let source = Arc::new(
        ScriptedSource::new(vec![sized_asset("a", 1)]).with_authorization(
            AuthorizationStatus::NotDetermined,
            AuthorizationStatus::Authorized,
        ),
    );
    let manager = LibraryManager::new(source.clone());

    assert_eq!(manager.refresh().await.unwrap(), 1);
    assert_eq!(manager.refresh().await.unwrap(), 1);
    assert_eq!(source.authorization_requests(), 1);
}

#[tokio::test]
async fn test_refused_request_is_unavailable() {
    let source = Arc::new(ScriptedSource::new(Vec::new()).with_authorization(
        AuthorizationStatus::NotDetermined,
        AuthorizationStatus::Restricted,
    ));
    let manager = LibraryManager::new(source.clone());

    assert!(matches!(
        manager.refresh().await,
        Err(LibraryError::ProviderUnavailable(_))
    ));
    assert_eq!(source.authorization_requests(), 1);
}

#[tokio::test]
async fn test_subscribers_see_every_change() {
    let (_source, manager) = library(vec![sized_asset("a", 2), sized_asset("b", 1)]);
    let mut updates = manager.subscribe();

    manager.refresh().await.unwrap();
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().len(), 2);

    manager.select(&AssetId::new("b")).unwrap();
    assert!(updates.has_changed().unwrap());
    assert_eq!(
        updates.borrow_and_update().selected_ids(),
        vec![AssetId::new("b")]
    );

    manager.sort(SortKey::Size, SortOrder::Ascending);
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.assets[0].id, AssetId::new("b"));
    assert!(snapshot.selected_ids().is_empty());

    // Failed mutations publish nothing
    assert!(manager.select(&AssetId::new("ghost")).is_err());
    assert!(!updates.has_changed().unwrap());
}

#[tokio::test]
async fn test_cached_thumbnails_survive_refresh() {
    let (source, manager) = library(vec![sized_asset("a", 2), sized_asset("b", 1)]);
    manager.refresh().await.unwrap();

    let id = AssetId::new("a");
    let target = PixelSize::new(64, 64);
    let sink = RecordingSink::new();
    manager
        .request_thumbnail(&id, target, &as_sink(&sink))
        .unwrap();
    source.wait_for_fetch(&id, target).await;
    source.answer_fetch(&id, target, Some(image(64, 64)));
    common::eventually(|| sink.count() == 1).await;

    source.set_assets(vec![sized_asset("a", 2)]);
    manager.refresh().await.unwrap();

    assert_eq!(
        manager.thumbnails().entry_state(&id),
        Some(EntryState::Idle { has_image: true })
    );
    assert!(manager.thumbnails().entry_state(&AssetId::new("b")).is_none());
    assert_eq!(manager.thumbnails().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refreshes_keep_entries_in_step() {
    let (source, manager) = library(vec![sized_asset("a", 2), sized_asset("b", 1)]);
    source.alternate_with(vec![sized_asset("c", 3)]);
    let manager = Arc::new(manager);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                manager.refresh().await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let snapshot = manager.snapshot();
    assert_eq!(manager.thumbnails().len(), snapshot.len());
    for asset in &snapshot.assets {
        assert!(manager.thumbnails().entry_state(&asset.id).is_some());
    }
}

#[tokio::test]
async fn test_delete_removes_from_source_and_catalog() {
    let (source, manager) = library(vec![
        sized_asset("a", 3),
        sized_asset("b", 2),
        sized_asset("c", 1),
    ]);
    manager.refresh().await.unwrap();
    manager.select(&AssetId::new("c")).unwrap();

    let removed = manager
        .delete(&[AssetId::new("b"), AssetId::new("ghost")])
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(source.deleted(), vec![AssetId::new("b")]);
    assert_eq!(manager.snapshot().len(), 2);
    assert_eq!(manager.selected_ids(), vec![AssetId::new("c")]);
    assert!(manager.thumbnails().entry_state(&AssetId::new("b")).is_none());
}

#[tokio::test]
async fn test_failed_delete_keeps_catalog() {
    let (source, manager) = library(vec![sized_asset("a", 1)]);
    manager.refresh().await.unwrap();
    source.fail_deletes();

    let err = manager.delete(&[AssetId::new("a")]).await.unwrap_err();

    assert!(matches!(err, LibraryError::DeleteFailed(_)));
    assert_eq!(manager.snapshot().len(), 1);
}

#[tokio::test]
async fn test_export_selected_skips_unselected() {
    let (source, manager) = library(vec![
        sized_asset("a", 3),
        sized_asset("b", 2),
        sized_asset("c", 1),
    ]);
    manager.refresh().await.unwrap();
    manager.select(&AssetId::new("a")).unwrap();
    manager
        .select_range(&AssetId::new("a"), &AssetId::new("b"))
        .unwrap();

    let report = manager
        .export_selected("/out", |_| {}, |_| {})
        .wait()
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(
        source.written(),
        vec![
            std::path::PathBuf::from("/out/a.jpg"),
            std::path::PathBuf::from("/out/b.jpg"),
        ]
    );
}

#[tokio::test]
async fn test_cancel_all_through_manager() {
    let (source, manager) = library(vec![sized_asset("a", 1)]);
    manager.refresh().await.unwrap();

    let id = AssetId::new("a");
    let sink = RecordingSink::new();
    manager
        .request_thumbnail(&id, PixelSize::new(32, 32), &as_sink(&sink))
        .unwrap();
    manager.cancel_all_thumbnails();
    common::settle().await;

    source.answer_fetch(&id, PixelSize::new(32, 32), Some(image(32, 32)));
    common::settle().await;

    assert_eq!(sink.count(), 0);
    assert_eq!(
        manager.thumbnails().entry_state(&id),
        Some(EntryState::Idle { has_image: false })
    );
}
