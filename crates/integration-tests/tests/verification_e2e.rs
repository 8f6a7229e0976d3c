//! End-to-end verification through the real adapters
//!
//! SQLite record store, the gdrive runner driving a fake tool script, the
//! filesystem comparator and local download storage.

#![cfg(unix)]

mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::TestEnv;
use mirrorcheck_core::application::constants::JOB_KEY_PREFIX;
use mirrorcheck_core::application::VerifierConfig;
use mirrorcheck_core::domain::{ExecutionMode, VerifyState};
use mirrorcheck_core::error::AppError;
use mirrorcheck_core::port::KeyValueStore;

const POLL: Duration = Duration::from_millis(20);
const TIMEOUT: Option<Duration> = Some(Duration::from_secs(30));

#[tokio::test]
async fn test_identical_trees_succeed() {
    let env = TestEnv::new();
    let files = [("a.txt", "alpha"), ("docs/b.md", "# b"), ("docs/deep/c.bin", "ccc")];
    env.remote_folder("SRC1", &files);
    env.remote_folder("DST1", &files);
    let (service, _pool) = env.service(VerifierConfig::default()).await;

    let id = service
        .register(
            "https://drive.google.com/drive/folders/SRC1?usp=sharing",
            "https://drive.google.com/open?id=DST1",
            ExecutionMode::Inline,
        )
        .await
        .unwrap();

    let record = service.get_state(&id).await.unwrap();
    assert_eq!(record.state, Some(VerifyState::Success));
    assert_eq!(record.download_count, Some(6));
    assert_eq!(record.src_folder_id.as_deref(), Some("SRC1"));
    assert_eq!(record.dst_folder_id.as_deref(), Some("DST1"));
    assert!(record.diff.unwrap().is_empty());

    // Downloads are removed once compared
    assert!(env.leftover_files().is_empty());
    assert!(!PathBuf::from(record.src_folder_path.unwrap()).exists());
}

#[tokio::test]
async fn test_differences_are_reported() {
    let env = TestEnv::new();
    env.remote_folder("SRC", &[("same.txt", "1"), ("changed.txt", "old"), ("only-src.txt", "s")]);
    env.remote_folder(
        "DST",
        &[("same.txt", "1"), ("changed.txt", "new"), ("extra/x.txt", "x")],
    );
    let (service, pool) = env.service(VerifierConfig::default()).await;

    let id = service
        .register("SRC", "DST", ExecutionMode::Background)
        .await
        .unwrap();
    let record = service
        .wait_until_settled(&id, POLL, TIMEOUT, |_| {})
        .await
        .unwrap();
    pool.drain().await;

    assert_eq!(record.state, Some(VerifyState::Failed));
    let diff = record.diff.unwrap();
    assert_eq!(diff.missing, vec!["extra"]);
    assert_eq!(diff.mismatch, vec!["changed.txt"]);
    assert!(env.leftover_files().is_empty());
}

#[tokio::test]
async fn test_malformed_url_creates_no_job() {
    let env = TestEnv::new();
    let (service, _pool) = env.service(VerifierConfig::default()).await;

    let err = service
        .register("SRC", "https://drive.google.com/drive/folders/", ExecutionMode::Inline)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    let kv = env.open_store().await;
    assert!(kv.keys_with_prefix(JOB_KEY_PREFIX).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tool_failure_ends_in_error_and_cleans_up() {
    let env = TestEnv::new();
    env.remote_folder("SRC", &[("a.txt", "a")]);
    // DST does not exist remotely: the tool exits 1
    let (service, _pool) = env.service(VerifierConfig::default()).await;

    let id = service
        .register("SRC", "DST", ExecutionMode::Inline)
        .await
        .unwrap();

    let record = service.get_state(&id).await.unwrap();
    assert_eq!(record.state, Some(VerifyState::Error));
    assert!(record.comment.unwrap().contains("status 1"));
    assert_eq!(record.download_count, Some(1));
    assert!(env.leftover_files().is_empty());
}

#[tokio::test]
async fn test_error_keeps_downloads_when_cleanup_disabled() {
    let env = TestEnv::new();
    env.remote_folder("SRC", &[("a.txt", "a")]);
    let config = VerifierConfig {
        cleanup_on_error: false,
        ..VerifierConfig::default()
    };
    let (service, _pool) = env.service(config).await;

    let id = service
        .register("SRC", "MISSING", ExecutionMode::Inline)
        .await
        .unwrap();

    let record = service.get_state(&id).await.unwrap();
    assert_eq!(record.state, Some(VerifyState::Error));
    let src_path = PathBuf::from(record.src_folder_path.unwrap());
    assert!(src_path.join("a.txt").exists());
}

#[tokio::test]
async fn test_keep_downloads_reuses_cache() {
    let env = TestEnv::new();
    env.remote_folder("SRC", &[("a.txt", "a"), ("b.txt", "b")]);
    env.remote_folder("DST", &[("a.txt", "a")]);
    let config = VerifierConfig {
        keep_downloads: true,
        ..VerifierConfig::default()
    };
    let (service, _pool) = env.service(config).await;

    let first = service
        .register("SRC", "DST", ExecutionMode::Inline)
        .await
        .unwrap();
    let record = service.get_state(&first).await.unwrap();
    assert_eq!(record.state, Some(VerifyState::Success));
    assert_eq!(record.download_count, Some(3));
    assert_eq!(env.leftover_files().len(), 3);

    // Second job is served entirely from the cache
    let second = service
        .register("SRC", "DST", ExecutionMode::Inline)
        .await
        .unwrap();
    let record = service.get_state(&second).await.unwrap();
    assert_eq!(record.state, Some(VerifyState::Success));
    assert_eq!(record.download_count, Some(0));
}

#[tokio::test]
async fn test_readiness_probe() {
    let env = TestEnv::new();
    let (service, _pool) = env.service(VerifierConfig::default()).await;
    assert!(service.ready().await);

    let (service, _pool) = env
        .service_with_binary(VerifierConfig::default(), env.dir.path().join("no-such-tool"))
        .await;
    assert!(!service.ready().await);
}

#[tokio::test]
async fn test_clear_jobs() {
    let env = TestEnv::new();
    env.remote_folder("SRC", &[("a.txt", "a")]);
    env.remote_folder("DST", &[("a.txt", "a")]);
    let (service, _pool) = env.service(VerifierConfig::default()).await;

    for _ in 0..3 {
        service
            .register("SRC", "DST", ExecutionMode::Inline)
            .await
            .unwrap();
    }

    assert_eq!(service.clear_jobs().await.unwrap(), 3);
    assert_eq!(service.clear_jobs().await.unwrap(), 0);
}
