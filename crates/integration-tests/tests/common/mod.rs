//! Shared fixtures: a fake download tool and a fully wired verification service

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use mirrorcheck_core::application::{VerificationService, VerifierConfig, WorkerPool};
use mirrorcheck_core::port::id_provider::UuidProvider;
use mirrorcheck_core::port::time_provider::SystemTimeProvider;
use mirrorcheck_infra_sqlite::{create_pool, database_url, run_migrations, SqliteKvStore};
use mirrorcheck_infra_system::{FsTreeComparator, GdriveConfig, GdriveRunner, LocalDownloadStorage};

/// Mimics `gdrive download --recursive --skip --path <dest> <id>` and
/// `gdrive list --max 1`, serving folders from `<fixtures>/<id>/`.
const FAKE_GDRIVE: &str = r#"#!/bin/sh
case "$1" in
  list) echo "Id  Name  Type"; exit 0 ;;
  download) shift ;;
  *) echo "unknown command: $1" >&2; exit 2 ;;
esac
while [ $# -gt 1 ]; do
  case "$1" in
    --path) DEST="$2"; shift 2 ;;
    *) shift ;;
  esac
done
ID="$1"
if [ ! -d "$FIXTURES/$ID" ]; then
  echo "Failed to get file: File not found: $ID" >&2
  exit 1
fi
cd "$FIXTURES/$ID" || exit 1
echo "Downloading directory $ID"
find . -type f | sort | while read -r f; do
  rel="${f#./}"
  mkdir -p "$DEST/$(dirname "$rel")"
  cp "$f" "$DEST/$rel"
  echo "Downloading $rel -> $DEST/$rel"
  echo "progress: copied $rel" >&2
done
"#;

pub struct TestEnv {
    pub dir: TempDir,
    pub fixtures: PathBuf,
    pub gdrive_bin: PathBuf,
    pub db_path: PathBuf,
    pub download_root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let fixtures = dir.path().join("fixtures");
        std::fs::create_dir_all(&fixtures).unwrap();

        let gdrive_bin = dir.path().join("gdrive");
        let script = FAKE_GDRIVE.replacen(
            "#!/bin/sh\n",
            &format!("#!/bin/sh\nFIXTURES='{}'\n", fixtures.display()),
            1,
        );
        std::fs::write(&gdrive_bin, script).unwrap();
        make_executable(&gdrive_bin);

        Self {
            db_path: dir.path().join("records.db"),
            download_root: dir.path().join("downloads"),
            fixtures,
            gdrive_bin,
            dir,
        }
    }

    /// Add a remote folder with the given `(relative path, content)` files
    pub fn remote_folder(&self, id: &str, files: &[(&str, &str)]) {
        let root = self.fixtures.join(id);
        std::fs::create_dir_all(&root).unwrap();
        for (rel, content) in files {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
    }

    pub async fn open_store(&self) -> Arc<SqliteKvStore> {
        let pool = create_pool(&database_url(&self.db_path)).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(SqliteKvStore::new(pool, Arc::new(SystemTimeProvider)))
    }

    pub async fn service(&self, config: VerifierConfig) -> (VerificationService, Arc<WorkerPool>) {
        self.service_with_binary(config, self.gdrive_bin.clone()).await
    }

    pub async fn service_with_binary(
        &self,
        config: VerifierConfig,
        binary: PathBuf,
    ) -> (VerificationService, Arc<WorkerPool>) {
        let kv = self.open_store().await;
        let runner = Arc::new(GdriveRunner::new(GdriveConfig {
            binary,
            ..GdriveConfig::default()
        }));
        let storage =
            Arc::new(LocalDownloadStorage::new(&self.download_root, config.keep_downloads).unwrap());
        let pool = Arc::new(WorkerPool::new(2));

        let service = VerificationService::new(
            kv,
            runner,
            Arc::new(FsTreeComparator::new()),
            storage,
            pool.clone(),
            Arc::new(UuidProvider),
            config,
        );
        (service, pool)
    }

    /// Every file left under the download root
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_files(&self.download_root, &mut found);
        found
    }
}

fn collect_files(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, found);
        } else {
            found.push(path);
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
