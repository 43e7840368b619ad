use progress_core::model::{CourseId, CourseProgress, LectureId, SubLectureId, UserId};
use progress_core::time::fixed_now;
use storage::repository::{ProgressRepository, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn lid(s: &str) -> LectureId {
    LectureId::new(s).unwrap()
}

fn sid(s: &str) -> SubLectureId {
    SubLectureId::new(s).unwrap()
}

fn ids() -> (UserId, CourseId) {
    (UserId::new("user-1").unwrap(), CourseId::new("course-1").unwrap())
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_nested_order() {
    let repo = connect("memdb_progress_roundtrip").await;
    let (user, course) = ids();

    let mut record = CourseProgress::empty(user.clone(), course.clone(), fixed_now());
    record.set_sub_lecture_viewed(&lid("B"), &sid("b2"), true);
    record.set_sub_lecture_viewed(&lid("B"), &sid("b1"), false);
    record.set_sub_lecture_viewed(&lid("A"), &sid("a1"), true);

    assert_eq!(repo.upsert(&record).await.unwrap(), 1);

    let loaded = repo.load(&user, &course).await.unwrap().expect("stored");
    assert_eq!(loaded.version(), 1);
    assert!(loaded.same_progress(&record));

    let lecture_ids: Vec<_> = loaded.lectures().iter().map(|l| l.lecture_id().as_str()).collect();
    assert_eq!(lecture_ids, ["B", "A"]);
    let b_subs: Vec<_> = loaded.lectures()[0]
        .sub_lectures()
        .iter()
        .map(|s| (s.sub_lecture_id.as_str(), s.viewed))
        .collect();
    assert_eq!(b_subs, [("b2", true), ("b1", false)]);
}

#[tokio::test]
async fn sqlite_load_returns_none_when_absent() {
    let repo = connect("memdb_progress_absent").await;
    let (user, course) = ids();
    assert!(repo.load(&user, &course).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_versioned_replace_rejects_stale_writers() {
    let repo = connect("memdb_progress_versions").await;
    let (user, course) = ids();

    let fresh = CourseProgress::empty(user.clone(), course.clone(), fixed_now());
    repo.upsert(&fresh).await.unwrap();
    assert!(matches!(
        repo.upsert(&fresh).await.unwrap_err(),
        StorageError::Conflict
    ));

    // Two writers read version 1; only the first replace wins.
    let mut first = repo.load(&user, &course).await.unwrap().unwrap();
    let mut second = first.clone();
    first.set_sub_lecture_viewed(&lid("A"), &sid("a1"), true);
    second.set_sub_lecture_viewed(&lid("A"), &sid("a2"), true);

    assert_eq!(repo.upsert(&first).await.unwrap(), 2);
    assert!(matches!(
        repo.upsert(&second).await.unwrap_err(),
        StorageError::Conflict
    ));

    let stored = repo.load(&user, &course).await.unwrap().unwrap();
    assert!(stored.same_progress(&first));
}

#[tokio::test]
async fn sqlite_replace_drops_pruned_entries() {
    let repo = connect("memdb_progress_prune").await;
    let (user, course) = ids();

    let mut record = CourseProgress::empty(user.clone(), course.clone(), fixed_now());
    record.set_sub_lecture_viewed(&lid("A"), &sid("a1"), true);
    record.set_sub_lecture_viewed(&lid("C"), &sid("c1"), true);
    repo.upsert(&record).await.unwrap();

    let stored = repo.load(&user, &course).await.unwrap().unwrap();
    let mut smaller = CourseProgress::empty(user.clone(), course.clone(), fixed_now())
        .with_version(stored.version());
    smaller.set_sub_lecture_viewed(&lid("A"), &sid("a1"), true);
    repo.upsert(&smaller).await.unwrap();

    let reloaded = repo.load(&user, &course).await.unwrap().unwrap();
    assert!(reloaded.lecture(&lid("C")).is_none());
    assert_eq!(reloaded.lectures().len(), 1);
}

#[tokio::test]
async fn sqlite_delete_cascades_and_is_idempotent() {
    let repo = connect("memdb_progress_delete").await;
    let (user, course) = ids();

    let mut record = CourseProgress::empty(user.clone(), course.clone(), fixed_now());
    record.set_sub_lecture_viewed(&lid("A"), &sid("a1"), true);
    repo.upsert(&record).await.unwrap();

    assert!(repo.delete(&user, &course).await.unwrap());
    assert!(!repo.delete(&user, &course).await.unwrap());
    assert!(repo.load(&user, &course).await.unwrap().is_none());

    // Recreating after deletion starts again from version 1.
    assert_eq!(repo.upsert(&record).await.unwrap(), 1);
    let reloaded = repo.load(&user, &course).await.unwrap().unwrap();
    assert_eq!(reloaded.lectures()[0].sub_lectures().len(), 1);
}
