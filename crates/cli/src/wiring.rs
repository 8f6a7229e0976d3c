// Composition root: concrete adapters behind the core ports

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use mirrorcheck_core::application::{VerificationService, WorkerPool};
use mirrorcheck_core::port::id_provider::UuidProvider;
use mirrorcheck_core::port::time_provider::SystemTimeProvider;
use mirrorcheck_infra_sqlite::{create_pool, database_url, run_migrations, SqliteKvStore};
use mirrorcheck_infra_system::{FsTreeComparator, GdriveConfig, GdriveRunner, LocalDownloadStorage};

use crate::config::Settings;

/// Everything a command needs
pub struct App {
    pub service: VerificationService,
    pub pool: Arc<WorkerPool>,
}

pub async fn build(settings: &Settings) -> Result<App> {
    let config = settings.verifier_config();
    config.validate().context("Invalid verifier configuration")?;

    // 1. Job record store
    let db_path = settings.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    info!(db_path = %db_path.display(), "Opening job record store");

    let db = create_pool(&database_url(&db_path))
        .await
        .context("DB pool creation failed")?;
    run_migrations(&db).await.context("Migration failed")?;

    let time_provider = Arc::new(SystemTimeProvider);
    let kv = Arc::new(SqliteKvStore::new(db, time_provider));
    let purged = kv.purge_expired().await.context("Purging expired records failed")?;
    if purged > 0 {
        info!(purged = purged, "Removed expired job records");
    }

    // 2. System adapters
    let runner = Arc::new(GdriveRunner::new(GdriveConfig {
        binary: settings.gdrive_bin.clone(),
        config_dir: settings.gdrive_config.clone(),
        service_account: settings.service_account.clone(),
    }));
    let storage = Arc::new(
        LocalDownloadStorage::new(settings.download_root(), config.keep_downloads)
            .context("Cannot prepare download root")?,
    );

    // 3. Orchestrator on a bounded worker pool
    let pool = Arc::new(WorkerPool::new(settings.workers));
    let service = VerificationService::new(
        kv,
        runner,
        Arc::new(FsTreeComparator::new()),
        storage,
        pool.clone(),
        Arc::new(UuidProvider),
        config,
    );

    Ok(App { service, pool })
}
