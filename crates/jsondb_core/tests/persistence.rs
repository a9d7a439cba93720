//! Durability: reopening, checkpoints, locking and recovery.

use jsondb_core::{Config, CoreError, Database, DocumentId, ModifyOutcome};
use jsondb_storage::{InMemoryBackend, StorageBackend};
use jsondb_testkit::{doc, game_scores, TestDatabase};
use std::fs;
use tempfile::TempDir;

#[test]
fn committed_writes_survive_reopen() {
    let test_db = TestDatabase::file();
    let scores = game_scores(&test_db);
    scores
        .find(&doc(r#"{"name": "Ann"}"#))
        .unwrap()
        .first_and_modify(|d| {
            d.insert("score", 99);
            ModifyOutcome::UPDATE
        })
        .unwrap();
    drop(scores);

    let test_db = test_db.reopen();
    let scores = test_db.collection("scores").unwrap();
    assert_eq!(scores.len().unwrap(), 2);
    let high = scores.find(&doc(r#"{"score": {"$gt": 50}}"#)).unwrap();
    assert_eq!(high.ids().unwrap(), vec![DocumentId::from("ann")]);
}

#[test]
fn aborted_writes_do_not_survive_reopen() {
    let test_db = TestDatabase::file();
    game_scores(&test_db);
    let result = test_db
        .collection("scores")
        .unwrap()
        .all()
        .unwrap()
        .all_and_modify(|_| ModifyOutcome::REMOVE | ModifyOutcome::ROLLBACK);
    assert!(result.is_err());

    let test_db = test_db.reopen();
    assert_eq!(test_db.collection("scores").unwrap().len().unwrap(), 2);
}

#[test]
fn checkpoint_then_more_writes() {
    let test_db = TestDatabase::file();
    let scores = game_scores(&test_db);
    let seq = test_db.checkpoint().unwrap();
    scores.put("cid", &doc(r#"{"name": "Cid", "score": 5}"#)).unwrap();
    scores.remove("ann").unwrap();
    drop(scores);

    let path = test_db.path().unwrap();
    assert!(fs::metadata(path.join("snapshot.dat")).unwrap().len() > 0);

    let test_db = test_db.reopen();
    assert!(test_db.committed_seq() > seq);
    let scores = test_db.collection("scores").unwrap();
    let mut ids = scores.ids().unwrap();
    ids.sort();
    assert_eq!(ids, vec![DocumentId::from("bob"), DocumentId::from("cid")]);
}

#[test]
fn directory_is_locked_while_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let db = Database::open(&path).unwrap();
    assert_eq!(db.path(), Some(path.as_path()));
    assert!(matches!(
        Database::open(&path),
        Err(CoreError::DatabaseLocked)
    ));
    db.close().unwrap();
    drop(db);
    assert!(Database::open(&path).is_ok());
}

#[test]
fn open_options_are_honoured() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let strict = Config::default().create_if_missing(false);
    assert!(Database::open_with_config(&path, strict).is_err());

    let db = Database::open(&path).unwrap();
    game_scores(&db);
    drop(db);

    let exclusive = Config::default().error_if_exists(true);
    assert!(matches!(
        Database::open_with_config(&path, exclusive),
        Err(CoreError::InvalidOperation { .. })
    ));
}

#[test]
fn corrupt_records_fail_the_open() {
    let wal = InMemoryBackend::new();
    let db = Database::open_with_backends(
        Config::default(),
        Box::new(wal.clone()),
        Box::new(InMemoryBackend::new()),
    )
    .unwrap();
    game_scores(&db);
    drop(db);

    let mut image = wal.snapshot();
    let last = image.len() - 1;
    image[last] ^= 0xff;
    let result = Database::open_with_backends(
        Config::default(),
        Box::new(InMemoryBackend::with_data(image)),
        Box::new(InMemoryBackend::new()),
    );
    assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
}

#[test]
fn recovery_ignores_a_torn_tail() {
    let wal = InMemoryBackend::new();
    let snapshot = InMemoryBackend::new();
    let open = || {
        Database::open_with_backends(
            Config::default(),
            Box::new(wal.clone()),
            Box::new(snapshot.clone()),
        )
        .unwrap()
    };

    let db = open();
    game_scores(&db);
    drop(db);

    let intact = wal.size().unwrap();
    // A Put header promising 64 payload bytes, followed by only a few.
    let mut torn = b"JWAL\x01\x00\x03".to_vec();
    torn.extend_from_slice(&64u32.to_le_bytes());
    torn.extend_from_slice(b"part");
    wal.clone().append(&torn).unwrap();

    let db = open();
    assert_eq!(db.collection("scores").unwrap().len().unwrap(), 2);
    assert_eq!(wal.size().unwrap(), intact);

    // Appends after recovery land on a clean boundary.
    db.collection("scores").unwrap().remove("bob").unwrap();
    drop(db);
    let db = open();
    assert_eq!(db.collection("scores").unwrap().len().unwrap(), 1);
}
