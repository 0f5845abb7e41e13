//! Integration tests for subtree deletes.

mod helpers;

use canopy_core::{ErrorKind, LocationId};
use canopy_database::query::QueryTarget;
use canopy_database::repositories::LocationRepository;
use canopy_entity::ContentKind;

#[tokio::test]
async fn test_delete_root_node_removes_whole_tree() {
    let app = helpers::TestApp::new().await;
    let f1 = app.root_folder("f1").await;
    let a1 = app.article(f1.location.id, "a1").await;
    let f2 = app.folder(a1.location.id, "f2").await;

    assert_eq!(
        app.repo.slugs(f2.location.id).await.unwrap(),
        vec!["f1", "a1", "f2"]
    );

    let outcome = app.repo.delete(f1.content.id).await.unwrap();
    assert_eq!(outcome.locations_removed, 3);
    assert_eq!(outcome.contents_removed, 3);

    assert_eq!(app.repo.query(QueryTarget::all()).count().await.unwrap(), 0);
    assert_eq!(app.repo.query(ContentKind::Article).count().await.unwrap(), 0);
    assert_eq!(app.repo.query(ContentKind::Folder).count().await.unwrap(), 0);
    assert_eq!(app.count_rows("content").await, 0);
    assert_eq!(app.count_rows("path").await, 0);
}

#[tokio::test]
async fn test_delete_secondary_location_keeps_node() {
    let app = helpers::TestApp::new().await;
    let root = app.root_folder("root").await;
    let l1 = root.location;
    let l2 = app.repo.add_location(root.content.id, None, false).await.unwrap();
    let child = app.article(l2.id, "child").await;

    let paths_before = app.count_rows("path").await;
    let closure_size = LocationRepository::new(app.pool().clone())
        .subtree_closure_size(l2.id)
        .await
        .unwrap();
    // (l2, l2), (l2, child), (child, child)
    assert_eq!(closure_size, 3);

    let outcome = app.repo.delete(l2.id).await.unwrap();
    assert_eq!(outcome.locations_removed, 2);
    assert_eq!(outcome.contents_removed, 1);

    assert!(app.repo.find_content(root.content.id).await.unwrap().is_some());
    assert!(app.repo.find_content(child.content.id).await.unwrap().is_none());
    assert_eq!(app.repo.main_location(root.content.id).await.unwrap().id, l1.id);
    assert_eq!(app.count_rows("path").await, paths_before - closure_size);
    assert_eq!(app.self_paths(l1.id).await, 1);
}

#[tokio::test]
async fn test_delete_location_removes_every_descendant_location() {
    let app = helpers::TestApp::new().await;
    let root = app.root_folder("root").await;
    let a = app.folder(root.location.id, "a").await;
    let b = app.folder(a.location.id, "b").await;
    app.article(b.location.id, "c").await;
    app.article(a.location.id, "d").await;
    let locations_before = app.count_rows("location").await;

    // a has three descendant locations
    let outcome = app.repo.delete(a.location.id).await.unwrap();
    assert_eq!(outcome.locations_removed, 4);
    assert_eq!(app.count_rows("location").await, locations_before - 4);
    assert_eq!(app.count_rows("content").await, 1);
    assert_eq!(app.count_rows("path").await, 1);
    app.assert_closure_consistent().await;
}

#[tokio::test]
async fn test_multi_homed_descendant_survives_and_gets_new_main() {
    let app = helpers::TestApp::new().await;
    let left = app.root_folder("left").await;
    let right = app.root_folder("right").await;
    let shared = app.article(left.location.id, "shared").await;
    let other = app
        .repo
        .add_location(shared.content.id, Some(right.location.id.into()), false)
        .await
        .unwrap();

    app.repo.delete(left.content.id).await.unwrap();

    assert!(app.repo.find_content(shared.content.id).await.unwrap().is_some());
    let main = app.repo.main_location(shared.content.id).await.unwrap();
    assert_eq!(main.id, other.id);
    assert_eq!(app.main_count(shared.content.id).await, 1);
    assert_eq!(app.repo.slugs(shared.content.id).await.unwrap(), vec!["right", "shared"]);
}

#[tokio::test]
async fn test_deleting_main_location_promotes_oldest_remaining() {
    let app = helpers::TestApp::new().await;
    let f1 = app.root_folder("f1").await;
    let f2 = app.root_folder("f2").await;
    let f3 = app.root_folder("f3").await;
    let a1 = app.article(f1.location.id, "a1").await;
    let second = app
        .repo
        .add_location(a1.content.id, Some(f2.location.id.into()), false)
        .await
        .unwrap();
    app.repo
        .add_location(a1.content.id, Some(f3.location.id.into()), false)
        .await
        .unwrap();

    app.repo.delete(a1.location.id).await.unwrap();

    assert_eq!(app.main_count(a1.content.id).await, 1);
    assert_eq!(app.repo.main_location(a1.content.id).await.unwrap().id, second.id);
}

#[tokio::test]
async fn test_delete_node_spares_content_placed_elsewhere() {
    let app = helpers::TestApp::new().await;
    let f1 = app.root_folder("f1").await;
    let f2 = app.root_folder("f2").await;
    let a1 = app.article(f1.location.id, "a1").await;
    app.repo
        .add_location(a1.content.id, Some(f2.location.id.into()), false)
        .await
        .unwrap();

    // Deleting the node itself removes every placement.
    app.repo.delete(a1.content.id).await.unwrap();
    assert!(app.repo.find_content(a1.content.id).await.unwrap().is_none());
    assert!(app.repo.find_content(f2.content.id).await.unwrap().is_some());
    assert_eq!(app.count_rows("location").await, 2);
}

#[tokio::test]
async fn test_delete_missing_subject_is_not_found() {
    let app = helpers::TestApp::new().await;

    let err = app.repo.delete(LocationId(12)).await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));

    let err = app
        .repo
        .delete(canopy_core::ContentId(12))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_delete_clears_cached_rows() {
    let app = helpers::TestApp::new().await;
    let f1 = app.root_folder("f1").await;
    let a1 = app.article(f1.location.id, "a1").await;

    // warm the cache
    app.repo.content(a1.content.id).await.unwrap();
    app.repo.delete(f1.location.id).await.unwrap();

    let err = app.repo.content(a1.content.id).await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_delete_subtree_wider_than_bind_limit() {
    let app = helpers::TestApp::new().await;
    let root = app.root_folder("root").await;
    app.seed_children(root.location.id, 33_000).await;

    let outcome = app.repo.delete(root.content.id).await.unwrap();
    assert_eq!(outcome.locations_removed, 33_001);
    assert_eq!(outcome.contents_removed, 33_001);
    assert_eq!(app.count_rows("content").await, 0);
    assert_eq!(app.count_rows("path").await, 0);
}
