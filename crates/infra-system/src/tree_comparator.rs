// Filesystem tree comparator
// Destination-authoritative: is every entry under dst a faithful copy of src?

use async_trait::async_trait;
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use mirrorcheck_core::domain::TreeDiff;
use mirrorcheck_core::error::{AppError, Result};
use mirrorcheck_core::port::TreeComparator;

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
    Other,
}

impl EntryKind {
    fn of(metadata: &Metadata) -> Self {
        if metadata.is_dir() {
            EntryKind::Dir
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// Compares trees on local disk. Runs on the blocking thread pool.
#[derive(Debug, Default, Clone)]
pub struct FsTreeComparator;

impl FsTreeComparator {
    pub fn new() -> Self {
        Self
    }
}

fn io_context(path: &Path, e: io::Error) -> AppError {
    AppError::Comparison(format!("{}: {}", path.display(), e))
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Entry names of a directory, sorted
fn sorted_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_context(dir, e))? {
        let entry = entry.map_err(|e| io_context(dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Byte equality: sizes first, then fixed-size chunks
fn same_content(a: &Path, a_len: u64, b: &Path, b_len: u64) -> Result<bool> {
    if a_len != b_len {
        return Ok(false);
    }

    let mut fa = File::open(a).map_err(|e| io_context(a, e))?;
    let mut fb = File::open(b).map_err(|e| io_context(b, e))?;
    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];

    loop {
        let n = read_full(&mut fa, &mut buf_a).map_err(|e| io_context(a, e))?;
        let m = read_full(&mut fb, &mut buf_b).map_err(|e| io_context(b, e))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` unless EOF comes first; returns bytes read
fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Walk `dst/relative`, recording into `diff`.
///
/// `ancestors` holds the canonical destination directories on the current
/// path; a directory link back to one of them is not descended into again.
fn compare_dir(
    src_root: &Path,
    dst_root: &Path,
    relative: &str,
    ancestors: &mut Vec<PathBuf>,
    diff: &mut TreeDiff,
) -> Result<()> {
    let dst_dir = dst_root.join(relative);
    let src_dir = src_root.join(relative);

    for name in sorted_names(&dst_dir)? {
        let rel = join_relative(relative, &name);
        let dst_path = dst_dir.join(&name);
        let src_path = src_dir.join(&name);

        // Follows symlinks; a dangling destination link has no counterpart
        let Ok(dst_meta) = fs::metadata(&dst_path) else {
            diff.record_missing(rel);
            continue;
        };
        let Ok(src_meta) = fs::metadata(&src_path) else {
            diff.record_missing(rel);
            continue;
        };

        match (EntryKind::of(&dst_meta), EntryKind::of(&src_meta)) {
            (EntryKind::Dir, EntryKind::Dir) => {
                let real = dst_path.canonicalize().map_err(|e| io_context(&dst_path, e))?;
                if ancestors.contains(&real) {
                    warn!(path = %rel, target = %real.display(), "Directory link loops back to an ancestor, not descending");
                    continue;
                }
                ancestors.push(real);
                let walked = compare_dir(src_root, dst_root, &rel, ancestors, diff);
                ancestors.pop();
                walked?;
            }
            (EntryKind::File, EntryKind::File) => {
                if !same_content(&src_path, src_meta.len(), &dst_path, dst_meta.len())? {
                    diff.record_mismatch(rel);
                }
            }
            (dst_kind, src_kind) => {
                debug!(path = %rel, dst = ?dst_kind, src = ?src_kind, "Entry type differs");
                diff.record_missing(rel);
            }
        }
    }
    Ok(())
}

/// Compare two trees synchronously
pub fn compare_trees(src: &Path, dst: &Path) -> Result<TreeDiff> {
    let mut diff = TreeDiff::new();

    let src_real = src.canonicalize().map_err(|e| io_context(src, e))?;
    let dst_real = dst.canonicalize().map_err(|e| io_context(dst, e))?;
    if src_real == dst_real {
        info!(path = %src_real.display(), "Source and destination are the same directory, skipping comparison");
        return Ok(diff);
    }

    let mut ancestors = vec![dst_real.clone()];
    compare_dir(&src_real, &dst_real, "", &mut ancestors, &mut diff)?;
    Ok(diff)
}

#[async_trait]
impl TreeComparator for FsTreeComparator {
    async fn compare(&self, src: &Path, dst: &Path) -> Result<TreeDiff> {
        let (src, dst): (PathBuf, PathBuf) = (src.to_path_buf(), dst.to_path_buf());
        tokio::task::spawn_blocking(move || compare_trees(&src, &dst))
            .await
            .map_err(|e| AppError::Internal(format!("comparison task failed: {}", e)))?
    }
}
