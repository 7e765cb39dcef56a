//! End-to-end tests for the spooling batching writer.
//!
//! Sessions go through the real actor, its timers and spool files on a
//! temporary directory. The child writer is either a recording mock or the
//! direct writer over the in-memory warehouse.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use engine_core::{Error, Session};
use integration_tests::fixtures::{self, PROPERTY_ID};
use integration_tests::mocks::MockSessionWriter;
use integration_tests::setup::{
    batching_writer, fast_batching_config, wait_until, PipelineOptions, TestContext,
    EVENTS_TABLE,
};
use sessions::spool::read_records;
use sessions::{BatchingConfig, CloserConfig, Encoding, ProtosessionCloser, SessionWriter};

const WAIT: Duration = Duration::from_secs(5);

fn session(property_id: &str) -> Session {
    fixtures::session(property_id, 1)
}

fn spool_file(dir: &Path, property_id: &str) -> std::path::PathBuf {
    dir.join(format!("property_{}.spool", property_id))
}

async fn spooled_sessions(path: &Path, encoding: Encoding) -> Vec<Session> {
    let codec = encoding.codec();
    let mut sessions = Vec::new();
    for record in read_records(path).await.unwrap() {
        sessions.extend(codec.decode(&record).unwrap());
    }
    sessions
}

#[tokio::test]
async fn test_spool_discarded_after_consecutive_failures() {
    let dir = tempfile::tempdir().unwrap();
    let child = MockSessionWriter::failing();
    let config = BatchingConfig {
        max_consecutive_child_write_failures: 2,
        ..fast_batching_config(dir.path())
    };
    let (writer, _parent) = batching_writer(Arc::new(child.clone()), config)
        .await
        .unwrap();
    let spool = spool_file(dir.path(), PROPERTY_ID);

    writer.write(vec![session(PROPERTY_ID)]).await.unwrap();

    // L1 age flush creates the spool file
    assert!(wait_until(WAIT, || spool.exists()).await);

    // First drain fails, the file stays
    assert!(wait_until(WAIT, || child.call_count() >= 1).await);
    assert!(spool.exists());

    // Second drain fails, the file is discarded
    assert!(wait_until(WAIT, || child.call_count() >= 2).await);
    assert!(wait_until(WAIT, || !spool.exists()).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(child.call_count(), 2);

    writer.cleanup().await;
}

#[tokio::test]
async fn test_success_removes_spool_and_resets_failures() {
    let dir = tempfile::tempdir().unwrap();
    let child = MockSessionWriter::failing();
    let config = BatchingConfig {
        max_consecutive_child_write_failures: 2,
        ..fast_batching_config(dir.path())
    };
    let (writer, _parent) = batching_writer(Arc::new(child.clone()), config)
        .await
        .unwrap();
    let spool = spool_file(dir.path(), PROPERTY_ID);

    writer.write(vec![session(PROPERTY_ID)]).await.unwrap();
    assert!(wait_until(WAIT, || child.call_count() >= 1).await);
    child.set_should_fail(false);

    assert!(wait_until(WAIT, || child.session_count() == 1).await);
    assert!(wait_until(WAIT, || !spool.exists()).await);

    // A fresh spool starts counting from zero: one failure keeps it
    child.set_should_fail(true);
    let calls = child.call_count();
    writer.write(vec![session(PROPERTY_ID)]).await.unwrap();
    assert!(wait_until(WAIT, || child.call_count() > calls).await);
    assert!(spool.exists());

    writer.cleanup().await;
}

#[tokio::test]
async fn test_cleanup_spools_buffers_without_draining() {
    let dir = tempfile::tempdir().unwrap();
    let child = MockSessionWriter::new();
    let config = BatchingConfig {
        spool_dir: dir.path().to_path_buf(),
        lvl1_max_age_ms: 60_000,
        lvl2_flush_interval_ms: 60_000,
        ..Default::default()
    };
    let (writer, _parent) = batching_writer(Arc::new(child.clone()), config.clone())
        .await
        .unwrap();

    writer
        .write(vec![session("prop1"), session("prop1")])
        .await
        .unwrap();
    writer.write(vec![session("prop2")]).await.unwrap();
    writer.cleanup().await;

    assert_eq!(
        spooled_sessions(&spool_file(dir.path(), "prop1"), config.encoding).await.len(),
        2
    );
    assert_eq!(
        spooled_sessions(&spool_file(dir.path(), "prop2"), config.encoding).await.len(),
        1
    );
    assert_eq!(child.call_count(), 0);

    assert!(matches!(
        writer.write(vec![session("prop1")]).await,
        Err(Error::Stopped)
    ));
    assert_eq!(child.call_count(), 0);
}

#[tokio::test]
async fn test_json_spool_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let child = MockSessionWriter::new();
    let config = BatchingConfig {
        spool_dir: dir.path().to_path_buf(),
        lvl1_max_age_ms: 60_000,
        lvl2_flush_interval_ms: 60_000,
        encoding: Encoding::Json,
        ..Default::default()
    };
    let (writer, _parent) = batching_writer(Arc::new(child), config).await.unwrap();

    let original = session(PROPERTY_ID);
    writer.write(vec![original.clone()]).await.unwrap();
    writer.cleanup().await;

    let spooled = spooled_sessions(&spool_file(dir.path(), PROPERTY_ID), Encoding::Json).await;
    assert_eq!(spooled, vec![original]);
}

#[tokio::test]
async fn test_parent_cancel_stops_writes() {
    let dir = tempfile::tempdir().unwrap();
    let (writer, parent) =
        batching_writer(Arc::new(MockSessionWriter::new()), fast_batching_config(dir.path()))
            .await
            .unwrap();

    parent.cancel();
    let result = writer.write(vec![session(PROPERTY_ID)]).await;
    assert!(matches!(result, Err(Error::Canceled) | Err(Error::Stopped)));
    writer.cleanup().await;
}

#[tokio::test]
async fn test_full_chain_into_warehouse() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = TestContext::new().await.unwrap();
    let (writer, _parent) = batching_writer(ctx.writer.clone(), fast_batching_config(dir.path()))
        .await
        .unwrap();
    let writer = Arc::new(writer);
    let closer = ProtosessionCloser::new(
        writer.clone(),
        &CloserConfig {
            failure_sleep_ms: 0,
            ..Default::default()
        },
    );

    closer
        .close(vec![
            fixtures::page_views(PROPERTY_ID, 3),
            fixtures::page_views(PROPERTY_ID, 2),
        ])
        .await
        .unwrap();

    assert!(wait_until(WAIT, || ctx.event_rows().len() == 5).await);
    assert!(wait_until(WAIT, || !spool_file(dir.path(), PROPERTY_ID).exists()).await);
    assert_eq!(ctx.rows_by_session().len(), 2);

    writer.cleanup().await;
}

#[tokio::test]
async fn test_unguarded_property_reaches_warehouse() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = TestContext::with_options(PipelineOptions {
        lazy_tables: true,
        ..Default::default()
    })
    .await
    .unwrap();
    let (writer, _parent) = batching_writer(ctx.writer.clone(), fast_batching_config(dir.path()))
        .await
        .unwrap();

    writer
        .write(vec![fixtures::session(PROPERTY_ID, 2)])
        .await
        .unwrap();
    assert!(wait_until(WAIT, || ctx.event_rows().len() == 2).await);
    assert!(wait_until(WAIT, || !spool_file(dir.path(), PROPERTY_ID).exists()).await);
    writer.cleanup().await;

    assert!(ctx.driver.fields(EVENTS_TABLE).is_some());
    assert_eq!(ctx.event_rows().len(), 2);
}
