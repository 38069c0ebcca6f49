//! Tests for the caller directory.

use super::{CallerDirectory, DirectoryError, SubmissionData};
use crate::identity::hash_national_id;
use crate::storage::CallerDatabase;

async fn directory() -> CallerDirectory {
    CallerDirectory::new(CallerDatabase::open_in_memory().await.unwrap(), 3)
}

fn submission(national_id: &str) -> SubmissionData {
    SubmissionData {
        national_id: national_id.into(),
        name: "Ali".into(),
        phone: "555".into(),
        is_family: false,
        origin_address: Some("9.9.9.9".into()),
        force_new: false,
        increment_if_exists: false,
    }
}

async fn rows_for(dir: &CallerDirectory, national_id: &str) -> i64 {
    dir.database()
        .count_callers_with_hash(&hash_national_id(national_id))
        .await
        .unwrap()
}

#[tokio::test]
async fn create_then_increment() {
    let dir = directory().await;

    let (created, was_created) = dir.create_or_increment(&submission("123")).await.unwrap();
    assert!(was_created);
    assert_eq!(created.participation_count, 1);
    assert_eq!(created.national_id, "123");

    let (again, was_created) = dir.create_or_increment(&submission("123")).await.unwrap();
    assert!(!was_created);
    assert_eq!(again.id, created.id);
    assert_eq!(again.participation_count, 2);
}

#[tokio::test]
async fn family_flag_set_at_creation() {
    let dir = directory().await;
    let mut input = submission("123");
    input.is_family = true;

    let (caller, _) = dir.create_or_increment(&input).await.unwrap();
    assert!(caller.is_family);
}

#[tokio::test]
async fn find_by_national_id() {
    let dir = directory().await;
    assert!(dir.find_by_national_id("123").await.unwrap().is_none());

    dir.create_or_increment(&submission("123")).await.unwrap();
    let found = dir.find_by_national_id("123").await.unwrap().unwrap();
    assert_eq!(found.participation_count, 1);
    assert!(dir.find_by_national_id("124").await.unwrap().is_none());
}

#[tokio::test]
async fn stated_intent_never_creates_a_second_row() {
    let dir = directory().await;
    dir.create_or_increment(&submission("123")).await.unwrap();

    for (force_new, increment_if_exists) in [(true, false), (true, true), (false, true), (false, false)] {
        let mut input = submission("123");
        input.force_new = force_new;
        input.increment_if_exists = increment_if_exists;
        let (_, created) = dir.create_or_increment(&input).await.unwrap();
        assert!(!created);
    }

    assert_eq!(rows_for(&dir, "123").await, 1);
    let caller = dir.find_by_national_id("123").await.unwrap().unwrap();
    assert_eq!(caller.participation_count, 5);
}

#[tokio::test]
async fn counter_matches_accepted_submissions() {
    let dir = directory().await;
    for k in 1..=7 {
        let (caller, _) = dir.create_or_increment(&submission("123")).await.unwrap();
        assert_eq!(caller.participation_count, k);
    }
}

async fn race_same_identity(dir: CallerDirectory, n: i64) {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let dir = dir.clone();
            tokio::spawn(async move { dir.create_or_increment(&submission("555000")).await })
        })
        .collect();

    let mut creations = 0;
    for handle in handles {
        let (_, created) = handle.await.unwrap().unwrap();
        if created {
            creations += 1;
        }
    }

    assert_eq!(creations, 1, "exactly one submission creates");
    assert_eq!(rows_for(&dir, "555000").await, 1);
    let caller = dir.find_by_national_id("555000").await.unwrap().unwrap();
    assert_eq!(caller.participation_count, n);
}

/// Pooled file database, so concurrent writers really contend. The default
/// retry budget applies.
async fn file_directory() -> (tempfile::TempDir, CallerDirectory) {
    let tmp = tempfile::tempdir().unwrap();
    let db = CallerDatabase::open(&tmp.path().join("callers.db")).await.unwrap();
    (tmp, CallerDirectory::new(db, 3))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_identity_two() {
    let (_tmp, dir) = file_directory().await;
    race_same_identity(dir, 2).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_identity_ten() {
    let (_tmp, dir) = file_directory().await;
    race_same_identity(dir, 10).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_identity_fifty() {
    let (_tmp, dir) = file_directory().await;
    race_same_identity(dir, 50).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_identity_in_memory() {
    race_same_identity(directory().await, 10).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_identities_are_independent() {
    let dir = directory().await;
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let dir = dir.clone();
            tokio::spawn(async move { dir.create_or_increment(&submission(&format!("id-{i}"))).await })
        })
        .collect();

    for handle in handles {
        let (caller, created) = handle.await.unwrap().unwrap();
        assert!(created);
        assert_eq!(caller.participation_count, 1);
    }
    assert_eq!(dir.total_hits().await.unwrap(), 20);
}

#[tokio::test]
async fn confirm_winner_requires_selection() {
    let dir = directory().await;
    let (caller, _) = dir.create_or_increment(&submission("123")).await.unwrap();

    let err = dir.confirm_winner(&caller.id).await.unwrap_err();
    assert!(matches!(err, DirectoryError::NotSelected(_)));

    assert!(dir.mark_selected(&caller.id).await.unwrap());
    let winner = dir.confirm_winner(&caller.id).await.unwrap();
    assert!(winner.is_selected);
    assert!(winner.is_winner);

    let err = dir.confirm_winner("missing").await.unwrap_err();
    assert!(matches!(err, DirectoryError::NotFound(_)));
}

#[test]
fn database_errors_map_to_directory_errors() {
    use crate::storage::DatabaseError;

    assert!(matches!(
        DirectoryError::from(DatabaseError::Conflict("x".into())),
        DirectoryError::ConcurrentModification
    ));
    assert!(matches!(
        DirectoryError::from(DatabaseError::Connection("x".into())),
        DirectoryError::PersistenceUnavailable(_)
    ));
    assert!(matches!(
        DirectoryError::from(DatabaseError::Query("x".into())),
        DirectoryError::Storage(_)
    ));
}
