//! Atomic find-and-modify behavior.

use jsondb_core::{CoreError, ModifyOutcome, Value};
use jsondb_testkit::{doc, game_scores, scenarios, with_temp_db};

fn score(document: &Value) -> i64 {
    document.get("score").and_then(Value::as_i64).unwrap()
}

fn bump(document: &mut Value) {
    let next = score(document) + 1;
    document.insert("score", next);
}

#[test]
fn rollback_on_the_third_document_changes_nothing() {
    let test_db = scenarios::players(5);
    let players = test_db.collection("players").unwrap();
    let before = players.all().unwrap().all().unwrap();
    let seq = test_db.committed_seq();

    let mut seen = 0;
    let result = players.all().unwrap().all_and_modify(|player| {
        seen += 1;
        bump(player);
        if seen == 3 {
            ModifyOutcome::ROLLBACK
        } else {
            ModifyOutcome::UPDATE
        }
    });

    assert!(matches!(result, Err(CoreError::CallbackAbort)));
    assert_eq!(seen, 3);
    assert_eq!(players.all().unwrap().all().unwrap(), before);
    assert_eq!(test_db.committed_seq(), seq);
}

#[test]
fn return_flags_select_old_and_new() {
    with_temp_db(|db| {
        let scores = game_scores(db);
        let bob = scores.find(&doc(r#"{"name": "Bob"}"#)).unwrap();

        let old = bob
            .first_and_modify(|d| {
                bump(d);
                ModifyOutcome::UPDATE | ModifyOutcome::RETURN_OLD
            })
            .unwrap()
            .unwrap();
        assert_eq!(score(&old), 20);
        assert_eq!(score(&scores.get("bob").unwrap().unwrap()), 21);

        let both = bob
            .all_and_modify(|d| {
                bump(d);
                ModifyOutcome::UPDATE | ModifyOutcome::RETURN_OLD | ModifyOutcome::RETURN_NEW
            })
            .unwrap();
        assert_eq!(both.iter().map(score).collect::<Vec<_>>(), [21, 22]);

        // Without UPDATE the callback's edits are discarded.
        let untouched = bob
            .all_and_modify(|d| {
                bump(d);
                ModifyOutcome::RETURN_NEW
            })
            .unwrap();
        assert_eq!(untouched.iter().map(score).collect::<Vec<_>>(), [22]);

        // A removed document contributes nothing new.
        let removed = bob
            .all_and_modify(|_| {
                ModifyOutcome::REMOVE | ModifyOutcome::RETURN_OLD | ModifyOutcome::RETURN_NEW
            })
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert!(scores.get("bob").unwrap().is_none());
    });
}

#[test]
fn stop_ends_the_loop() {
    let test_db = scenarios::players(6);
    let players = test_db.collection("players").unwrap();
    let query = players.find_sorted(&Value::Null, &doc(r#"["-score"]"#)).unwrap();

    let mut calls = 0;
    let returned = query
        .all_and_modify(|d| {
            calls += 1;
            bump(d);
            let outcome = ModifyOutcome::UPDATE | ModifyOutcome::RETURN_NEW;
            if calls == 2 {
                outcome | ModifyOutcome::STOP
            } else {
                outcome
            }
        })
        .unwrap();
    assert_eq!(calls, 2);
    // Highest scores: 35 and 28; both bumped.
    assert_eq!(returned.iter().map(score).collect::<Vec<_>>(), [36, 29]);
    assert_eq!(score(&players.get(0).unwrap().unwrap()), 0);
}

#[test]
fn update_with_remove_aborts() {
    with_temp_db(|db| {
        let scores = game_scores(db);
        let all = scores.all().unwrap();
        let result = all.all_and_modify(|_| ModifyOutcome::UPDATE | ModifyOutcome::REMOVE);
        assert!(matches!(result, Err(CoreError::InvalidOutcome { .. })));
        assert_eq!(scores.len().unwrap(), 2);
    });
}

#[test]
fn changing_the_identifier_is_a_conflict() {
    with_temp_db(|db| {
        let scores = game_scores(db);
        let result = scores.all().unwrap().first_and_modify(|d| {
            d.insert("_id", "zed");
            ModifyOutcome::UPDATE
        });
        assert!(matches!(result, Err(CoreError::WriteConflict { .. })));
        assert!(scores.get("zed").unwrap().is_none());
        assert!(scores.get("ann").unwrap().is_some());
    });
}

#[test]
fn windows_limit_what_is_modified() {
    let test_db = scenarios::players(10);
    let players = test_db.collection("players").unwrap();
    let by_score = players.find_sorted(&Value::Null, &doc(r#"["score"]"#)).unwrap();

    let changed = by_score
        .all_in_range_and_modify(1..3, |d| {
            d.insert("picked", true);
            ModifyOutcome::UPDATE | ModifyOutcome::RETURN_NEW
        })
        .unwrap();
    assert_eq!(changed.iter().map(score).collect::<Vec<_>>(), [7, 14]);
    let picked = players.find(&doc(r#"{"picked": true}"#)).unwrap();
    assert_eq!(picked.count().unwrap(), 2);

    assert_eq!(by_score.remove_all_in_range(8..20).unwrap(), 2);
    assert_eq!(by_score.remove_first().unwrap(), 1);
    assert_eq!(players.len().unwrap(), 7);
    assert_eq!(picked.remove_all().unwrap(), 2);
    assert_eq!(players.len().unwrap(), 5);
    assert_eq!(picked.remove_first().unwrap(), 0);
}

#[test]
fn shared_transactions_commit_together() {
    with_temp_db(|db| {
        let scores = game_scores(db);
        let ann = scores.find(&doc(r#"{"name": "Ann"}"#)).unwrap();
        let bob = scores.find(&doc(r#"{"name": "Bob"}"#)).unwrap();

        db.transaction(|txn| {
            ann.first_and_modify_in(txn, |d| {
                bump(d);
                ModifyOutcome::UPDATE
            })?;
            // The second operation sees the first one's pending write.
            let seen = ann.first_and_modify_in(txn, |_| ModifyOutcome::RETURN_OLD)?;
            assert_eq!(seen.as_ref().map(score), Some(11));
            bob.remove_all_in(txn)?;
            Ok(())
        })
        .unwrap();

        assert_eq!(score(&scores.get("ann").unwrap().unwrap()), 11);
        assert!(scores.get("bob").unwrap().is_none());
    });
}

#[test]
fn a_rollback_aborts_the_shared_transaction() {
    with_temp_db(|db| {
        let scores = game_scores(db);
        let all = scores.all().unwrap();
        let mut txn = db.begin_write().unwrap();
        scores.put_in(&mut txn, "cid", &doc(r#"{"name": "Cid", "score": 1}"#)).unwrap();

        let result = all.all_in_range_and_modify_in(&mut txn, 0..1, |_| ModifyOutcome::ROLLBACK);
        assert!(matches!(result, Err(CoreError::CallbackAbort)));
        assert!(!txn.is_active());
        assert!(all.remove_first_in(&mut txn).is_err());
        drop(txn);

        assert_eq!(scores.len().unwrap(), 2);
        assert!(scores.get("cid").unwrap().is_none());
    });
}

#[test]
fn modify_in_a_closed_database_fails() {
    with_temp_db(|db| {
        let scores = game_scores(db);
        let all = scores.all().unwrap();
        db.close().unwrap();
        assert!(matches!(all.remove_all(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(all.count(), Err(CoreError::DatabaseClosed)));
    });
}
