// Download runner backed by the gdrive command-line tool
// Pumps stdout and stderr concurrently until both close
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio::process::Command;
use tracing::{debug, info, warn};

use mirrorcheck_core::domain::FolderId;
use mirrorcheck_core::port::{DownloadProgress, DownloadRunner, ProgressSender, RunOutcome};

const PROGRESS_PREFIX: &str = "Downloading ";
const PROGRESS_SEPARATOR: &str = " -> ";

/// How to invoke the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdriveConfig {
    /// Executable name or path
    pub binary: PathBuf,
    /// `--config <dir>`
    pub config_dir: Option<PathBuf>,
    /// `--service-account <file>`
    pub service_account: Option<PathBuf>,
}

impl Default for GdriveConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("gdrive"),
            config_dir: None,
            service_account: None,
        }
    }
}

impl GdriveConfig {
    /// Options placed before every subcommand
    pub fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(dir) = &self.config_dir {
            args.push("--config".to_string());
            args.push(dir.display().to_string());
        }
        if let Some(file) = &self.service_account {
            args.push("--service-account".to_string());
            args.push(file.display().to_string());
        }
        args
    }
}

/// Extract the file name from a `Downloading <name> -> <target>` line
pub fn parse_progress_line(line: &str) -> Option<&str> {
    let rest = line.trim_end().strip_prefix(PROGRESS_PREFIX)?;
    let (name, _target) = rest.rsplit_once(PROGRESS_SEPARATOR)?;
    (!name.is_empty()).then_some(name)
}

/// Runs gdrive as a subprocess, one invocation per download or probe
pub struct GdriveRunner {
    config: GdriveConfig,
}

impl GdriveRunner {
    /// Create a new runner
    ///
    /// # Example
    /// ```ignore
    /// let runner = GdriveRunner::new(GdriveConfig {
    ///     binary: "gdrive".into(),
    ///     config_dir: Some("/etc/gdrive".into()),
    ///     service_account: None,
    /// });
    /// ```
    pub fn new(config: GdriveConfig) -> Self {
        Self { config }
    }

    fn download_args(&self, folder: &FolderId, dest: &Path) -> Vec<String> {
        let mut args = self.config.global_args();
        args.extend([
            "download".to_string(),
            "--recursive".to_string(),
            "--skip".to_string(),
            "--path".to_string(),
            dest.display().to_string(),
            folder.to_string(),
        ]);
        args
    }

    fn probe_args(&self) -> Vec<String> {
        let mut args = self.config.global_args();
        args.extend(["list".to_string(), "--max".to_string(), "1".to_string()]);
        args
    }

    /// Spawn the tool and pump both pipes until end-of-stream, then reap it.
    ///
    /// Progress events (if a sender is given) are published in stdout order.
    async fn run(&self, args: &[String], progress: Option<&ProgressSender>) -> RunOutcome {
        info!(binary = %self.config.binary.display(), args = ?args, "Starting download tool");

        let mut child = match Command::new(&self.config.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(binary = %self.config.binary.display(), error = %e, "Failed to spawn download tool");
                return RunOutcome::SpawnFailed(e.to_string());
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return RunOutcome::StreamError("child pipes unavailable".to_string());
        };

        if let Err(e) = pump_output(stdout, stderr, progress).await {
            // Reap the child so it does not linger as a zombie
            let _ = child.kill().await;
            return RunOutcome::StreamError(e.to_string());
        }

        match child.wait().await {
            Ok(status) if status.success() => {
                info!("Download tool finished");
                RunOutcome::Success
            }
            Ok(status) => {
                warn!(exit_code = ?status.code(), "Download tool exited with failure");
                RunOutcome::Failed {
                    exit_code: status.code(),
                }
            }
            Err(e) => RunOutcome::StreamError(e.to_string()),
        }
    }
}

async fn next_line<R: AsyncRead + Unpin>(
    lines: &mut Split<BufReader<R>>,
) -> std::io::Result<Option<String>> {
    Ok(lines
        .next_segment()
        .await?
        .map(|bytes| String::from_utf8_lossy(&bytes).trim_end_matches('\r').to_string()))
}

/// Read both pipes concurrently, whichever has data first, until both close
async fn pump_output<O, E>(
    stdout: O,
    stderr: E,
    progress: Option<&ProgressSender>,
) -> std::io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = BufReader::new(stdout).split(b'\n');
    let mut err = BufReader::new(stderr).split(b'\n');
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            line = next_line(&mut out), if out_open => match line? {
                Some(line) => handle_stdout_line(&line, progress),
                None => out_open = false,
            },
            line = next_line(&mut err), if err_open => match line? {
                Some(line) => warn!(line = %line, "download tool stderr"),
                None => err_open = false,
            },
        }
    }
    Ok(())
}

fn handle_stdout_line(line: &str, progress: Option<&ProgressSender>) {
    match (parse_progress_line(line), progress) {
        (Some(name), Some(sender)) => {
            debug!(file = %name, "Download progress");
            // The receiver only goes away if the orchestrator gave up
            let _ = sender.send(DownloadProgress {
                file_name: name.to_string(),
            });
        }
        _ => debug!(line = %line, "download tool stdout"),
    }
}

#[async_trait]
impl DownloadRunner for GdriveRunner {
    async fn download(
        &self,
        folder: &FolderId,
        dest: &Path,
        progress: ProgressSender,
    ) -> RunOutcome {
        let args = self.download_args(folder, dest);
        self.run(&args, Some(&progress)).await
    }

    async fn probe(&self) -> RunOutcome {
        let args = self.probe_args();
        self.run(&args, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(
            parse_progress_line("Downloading a/b.txt -> /tmp/x/a/b.txt"),
            Some("a/b.txt")
        );
        // Name is everything before the last separator
        assert_eq!(
            parse_progress_line("Downloading odd -> name.txt -> /tmp/odd -> name.txt\r"),
            Some("odd -> name.txt")
        );
        assert_eq!(parse_progress_line("Downloaded 3 files"), None);
        assert_eq!(parse_progress_line("Downloading  -> /tmp"), None);
        assert_eq!(parse_progress_line("Downloading no-arrow"), None);
    }

    #[test]
    fn test_command_lines() {
        let runner = GdriveRunner::new(GdriveConfig {
            binary: "gdrive".into(),
            config_dir: Some("/etc/gdrive".into()),
            service_account: Some("sa.json".into()),
        });
        let folder = FolderId::parse("abc").unwrap();

        assert_eq!(
            runner.download_args(&folder, Path::new("/tmp/d")),
            vec![
                "--config", "/etc/gdrive", "--service-account", "sa.json", "download",
                "--recursive", "--skip", "--path", "/tmp/d", "abc"
            ]
        );
        assert_eq!(
            GdriveRunner::new(GdriveConfig::default()).probe_args(),
            vec!["list", "--max", "1"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let runner = GdriveRunner::new(GdriveConfig {
            binary: "/nonexistent/mirrorcheck-gdrive".into(),
            ..GdriveConfig::default()
        });
        assert!(matches!(runner.probe().await, RunOutcome::SpawnFailed(_)));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tokio::sync::mpsc;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-gdrive");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn runner_for(binary: PathBuf) -> GdriveRunner {
            GdriveRunner::new(GdriveConfig {
                binary,
                ..GdriveConfig::default()
            })
        }

        #[tokio::test]
        async fn test_progress_events_in_output_order() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(
                dir.path(),
                r#"echo "Downloading one.txt -> $5/one.txt"
echo "Some chatter"
echo "warning: slow" >&2
echo "Downloading sub/two.txt -> $5/sub/two.txt""#,
            );

            let (tx, mut rx) = mpsc::unbounded_channel();
            let folder = FolderId::parse("F1").unwrap();
            let outcome = runner_for(bin).download(&folder, dir.path(), tx).await;
            assert_eq!(outcome, RunOutcome::Success);

            let mut names = Vec::new();
            while let Some(event) = rx.recv().await {
                names.push(event.file_name);
            }
            assert_eq!(names, vec!["one.txt", "sub/two.txt"]);
        }

        #[tokio::test]
        async fn test_non_zero_exit_is_failure() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(dir.path(), "echo boom >&2\nexit 7");
            let outcome = runner_for(bin).probe().await;
            assert_eq!(outcome, RunOutcome::Failed { exit_code: Some(7) });
        }

        #[tokio::test]
        async fn test_heavy_stderr_does_not_deadlock() {
            let dir = tempfile::tempdir().unwrap();
            // Far more than a pipe buffer on stderr before anything on stdout
            let bin = script(
                dir.path(),
                r#"i=0
while [ $i -lt 20000 ]; do echo "stderr noise line $i" >&2; i=$((i+1)); done
echo "Downloading last.bin -> /dev/null""#,
            );

            let (tx, mut rx) = mpsc::unbounded_channel();
            let folder = FolderId::parse("F1").unwrap();
            let outcome = tokio::time::timeout(
                std::time::Duration::from_secs(30),
                runner_for(bin).download(&folder, dir.path(), tx),
            )
            .await
            .expect("runner deadlocked");

            assert_eq!(outcome, RunOutcome::Success);
            assert_eq!(rx.recv().await.unwrap().file_name, "last.bin");
        }

        #[tokio::test]
        async fn test_invalid_utf8_is_tolerated() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(dir.path(), r#"printf 'Downloading caf\351.txt -> x\n'"#);

            let (tx, mut rx) = mpsc::unbounded_channel();
            let folder = FolderId::parse("F1").unwrap();
            let outcome = runner_for(bin).download(&folder, dir.path(), tx).await;

            assert_eq!(outcome, RunOutcome::Success);
            assert_eq!(rx.recv().await.unwrap().file_name, "caf\u{FFFD}.txt");
        }
    }
}
