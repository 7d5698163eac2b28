use std::sync::Arc;
use std::time::Duration;

use embedded_sql_adapter::prelude::*;
use tempfile::tempdir;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(5);

async fn setup(dir: &std::path::Path) -> Result<ConnectionAdapter, AdapterError> {
    let factory = AdapterOptions::builder("file:tx.db").base_dir(dir).build()?;
    let adapter = factory.connect().await?;
    adapter
        .execute_script(
            "CREATE TABLE ledger (id INTEGER PRIMARY KEY, note TEXT NOT NULL);
             CREATE TABLE counter (id INTEGER PRIMARY KEY, n INTEGER NOT NULL);
             INSERT INTO counter (id, n) VALUES (1, 0);",
        )
        .await?;
    Ok(adapter)
}

async fn ledger_count(adapter: &ConnectionAdapter) -> Result<i64, AdapterError> {
    let rs = adapter
        .query_raw(&SqlQuery::new("SELECT COUNT(*) AS cnt FROM ledger"))
        .await?;
    Ok(rs.get(0, "cnt").and_then(SqlValue::as_int).unwrap_or(-1))
}

fn insert_note(id: i64, note: &str) -> SqlQuery {
    SqlQuery::new("INSERT INTO ledger (id, note) VALUES (?, ?)")
        .arg(SqlValue::Int(id))
        .arg(SqlValue::Text(note.into()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn commit_and_rollback_release_the_lock() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let adapter = setup(dir.path()).await?;

    let tx = timeout(STEP, adapter.start_transaction(None)).await??;
    assert_eq!(tx.execute_raw(&insert_note(1, "kept")).await?, 1);
    let inside = tx
        .query_raw(&SqlQuery::new("SELECT note FROM ledger WHERE id = 1"))
        .await?;
    assert_eq!(inside.rows, vec![vec![SqlValue::Text("kept".into())]]);
    tx.commit().await?;

    let tx = timeout(STEP, adapter.start_transaction(None)).await??;
    tx.execute_raw(&insert_note(2, "discarded")).await?;
    tx.rollback().await?;

    let tx = timeout(STEP, adapter.start_transaction(None)).await??;
    tx.rollback().await?;

    assert_eq!(timeout(STEP, ledger_count(&adapter)).await??, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transaction_blocks_other_callers_until_finished() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let adapter = Arc::new(setup(dir.path()).await?);

    let tx = adapter.start_transaction(None).await?;
    tx.execute_raw(&insert_note(1, "pending")).await?;

    let reader = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { ledger_count(&adapter).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!reader.is_finished(), "reader ran while the transaction held the lock");

    tx.commit().await?;
    assert_eq!(timeout(STEP, reader).await???, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_isolation_levels_fail_fast() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let adapter = setup(dir.path()).await?;

    // Holding a transaction proves the rejection happens before the lock is requested.
    let held = adapter.start_transaction(Some(IsolationLevel::Serializable)).await?;
    for level in [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Snapshot,
    ] {
        let err = timeout(STEP, adapter.start_transaction(Some(level)))
            .await?
            .expect_err("non-serializable level");
        assert!(matches!(err, AdapterError::InvalidIsolationLevel(l) if l == level));
    }
    held.rollback().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_begin_releases_the_lock() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let adapter = setup(dir.path()).await?;

    // Leave a transaction open on the connection so the next BEGIN is rejected by SQLite.
    adapter.execute_script("BEGIN;").await?;
    let err = timeout(STEP, adapter.start_transaction(None))
        .await?
        .expect_err("nested BEGIN");
    assert!(matches!(err, AdapterError::SqliteError(_)));

    timeout(STEP, adapter.execute_script("COMMIT;")).await??;
    let tx = timeout(STEP, adapter.start_transaction(None)).await??;
    tx.commit().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_commit_still_releases_the_lock() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let adapter = setup(dir.path()).await?;

    let tx = adapter.start_transaction(None).await?;
    // Ending the transaction from inside makes the explicit COMMIT fail.
    tx.execute_raw(&SqlQuery::new("COMMIT")).await?;
    assert!(tx.commit().await.is_err());

    let tx = timeout(STEP, adapter.start_transaction(None)).await??;
    tx.rollback().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_callers_do_not_release_the_lock_early() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let adapter = setup(dir.path()).await?;

    // A second connection holds the file so the adapter's engine calls stall on SQLite's busy
    // handler while their callers give up.
    let outside = rusqlite::Connection::open(dir.path().join("tx.db"))?;
    outside.execute_batch("BEGIN EXCLUSIVE")?;

    let short = Duration::from_millis(100);
    assert!(timeout(short, adapter.execute_raw(&insert_note(1, "late"))).await.is_err());
    assert!(timeout(short, adapter.start_transaction(None)).await.is_err());

    outside.execute_batch("COMMIT")?;
    drop(outside);

    // The stalled INSERT finishes under the lock; the BEGIN was cancelled while still queued.
    let tx = timeout(STEP, adapter.start_transaction(None)).await??;
    tx.execute_raw(&insert_note(2, "fresh")).await?;
    tx.commit().await?;
    assert_eq!(timeout(STEP, ledger_count(&adapter)).await??, 2);

    let tx = timeout(STEP, adapter.start_transaction(None)).await??;
    tx.rollback().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_transaction_is_rolled_back() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let adapter = setup(dir.path()).await?;

    {
        let tx = adapter.start_transaction(None).await?;
        tx.execute_raw(&insert_note(1, "abandoned")).await?;
    }

    assert_eq!(timeout(STEP, ledger_count(&adapter)).await??, 0);
    let tx = timeout(STEP, adapter.start_transaction(None)).await??;
    tx.commit().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transactions_serialize() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let adapter = Arc::new(setup(dir.path()).await?);

    let mut handles = Vec::new();
    for i in 0..40_i64 {
        let adapter = Arc::clone(&adapter);
        handles.push(tokio::spawn(async move {
            let tx = adapter.start_transaction(None).await?;
            let rs = tx
                .query_raw(&SqlQuery::new("SELECT n FROM counter WHERE id = 1"))
                .await?;
            let n = rs.rows[0][0].as_int().unwrap_or_default();
            tokio::task::yield_now().await;
            tx.execute_raw(
                &SqlQuery::new("UPDATE counter SET n = ? WHERE id = 1").arg(SqlValue::Int(n + 1)),
            )
            .await?;
            if i % 4 == 0 {
                // A failing statement inside the transaction must not poison the schedule.
                let dupe = tx.execute_raw(&insert_note(0, "dupe")).await;
                let again = tx.execute_raw(&insert_note(0, "dupe")).await;
                assert!(dupe.is_ok() && again.is_err());
                tx.rollback().await?;
                return Ok::<bool, AdapterError>(false);
            }
            tx.commit().await?;
            Ok(true)
        }));
    }

    let mut committed = 0;
    for h in handles {
        if timeout(STEP, h).await??? {
            committed += 1;
        }
    }

    let rs = adapter
        .query_raw(&SqlQuery::new("SELECT n FROM counter WHERE id = 1"))
        .await?;
    assert_eq!(rs.rows[0][0], SqlValue::Int(committed));
    assert_eq!(ledger_count(&adapter).await?, 0);
    Ok(())
}
