//! Integration tests for subtree moves.

mod helpers;

use canopy_core::{ErrorKind, LocationId};

#[tokio::test]
async fn test_move_relinks_subtree_under_new_root() {
    let app = helpers::TestApp::new().await;
    let root = app.root_folder("root").await;
    let a = app.folder(root.location.id, "a").await;
    let b = app.article(a.location.id, "b").await;
    let root2 = app.root_folder("root2").await;

    let outcome = app
        .repo
        .move_subject(a.location.id)
        .to(root2.location.id)
        .await
        .unwrap();
    // (root, a) and (root, b) detached; (root2, a) and (root2, b) attached
    assert_eq!(outcome.paths_detached, 2);
    assert_eq!(outcome.paths_attached, 2);

    let parent = app.repo.parent(a.location.id).await.unwrap().unwrap();
    assert_eq!(parent.id, root2.location.id);

    let lineage: Vec<LocationId> = app
        .repo
        .lineage(b.location.id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    assert_eq!(lineage, vec![root2.location.id, a.location.id, b.location.id]);

    assert_eq!(app.path_length(root.location.id, a.location.id).await, None);
    assert_eq!(app.path_length(root.location.id, b.location.id).await, None);
    assert_eq!(app.path_length(a.location.id, b.location.id).await, Some(1));
    assert_eq!(
        app.repo.slugs(b.content.id).await.unwrap(),
        vec!["root2", "a", "b"]
    );
    app.assert_closure_consistent().await;
}

#[tokio::test]
async fn test_move_deeper_adjusts_lengths() {
    let app = helpers::TestApp::new().await;
    let root = app.root_folder("root").await;
    let x = app.folder(root.location.id, "x").await;
    let y = app.folder(x.location.id, "y").await;
    let a = app.folder(root.location.id, "a").await;
    let b = app.article(a.location.id, "b").await;

    app.repo
        .move_subject(a.content.id)
        .to(y.content.id)
        .await
        .unwrap();

    assert_eq!(app.path_length(root.location.id, b.location.id).await, Some(4));
    assert_eq!(app.path_length(y.location.id, b.location.id).await, Some(2));
    assert_eq!(app.path_length(x.location.id, a.location.id).await, Some(2));
    app.assert_closure_consistent().await;
}

#[tokio::test]
async fn test_move_under_own_descendant_is_rejected() {
    let app = helpers::TestApp::new().await;
    let root = app.root_folder("root").await;
    let a = app.folder(root.location.id, "a").await;
    let b = app.folder(a.location.id, "b").await;
    let paths_before = app.count_rows("path").await;

    let err = app
        .repo
        .move_subject(a.location.id)
        .to(b.location.id)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::IntegrityViolation));

    let err = app
        .repo
        .move_subject(a.location.id)
        .to(a.location.id)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::IntegrityViolation));

    assert_eq!(app.count_rows("path").await, paths_before);
    assert_eq!(
        app.repo.parent(b.location.id).await.unwrap().map(|l| l.id),
        Some(a.location.id)
    );
}

#[tokio::test]
async fn test_move_to_missing_location_is_not_found() {
    let app = helpers::TestApp::new().await;
    let root = app.root_folder("root").await;
    let a = app.folder(root.location.id, "a").await;

    let err = app
        .repo
        .move_subject(a.location.id)
        .to(LocationId(999))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));

    let err = app
        .repo
        .move_subject(LocationId(999))
        .to(root.location.id)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_move_marks_earlier_reads_stale() {
    let app = helpers::TestApp::new().await;
    let root = app.root_folder("root").await;
    let a = app.folder(root.location.id, "a").await;
    let root2 = app.root_folder("root2").await;

    let seen = app.repo.revision();
    app.repo.ensure_current(seen).unwrap();

    app.repo
        .move_subject(a.location.id)
        .to(root2.location.id)
        .await
        .unwrap();

    let err = app.repo.ensure_current(seen).unwrap_err();
    assert!(err.is(ErrorKind::ConcurrentModification));
    app.repo.ensure_current(app.repo.revision()).unwrap();
}

#[tokio::test]
async fn test_moving_secondary_location_leaves_main_in_place() {
    let app = helpers::TestApp::new().await;
    let f1 = app.root_folder("f1").await;
    let f2 = app.root_folder("f2").await;
    let f3 = app.root_folder("f3").await;
    let a1 = app.article(f1.location.id, "a1").await;
    let extra = app
        .repo
        .add_location(a1.content.id, Some(f2.location.id.into()), false)
        .await
        .unwrap();

    app.repo.move_subject(extra.id).to(f3.location.id).await.unwrap();

    assert_eq!(app.repo.slugs(extra.id).await.unwrap(), vec!["f3", "a1"]);
    assert_eq!(app.repo.slugs(a1.content.id).await.unwrap(), vec!["f1", "a1"]);
    app.assert_closure_consistent().await;
}
