//! Atomic file writes for the rendered tutorial.
//!
//! Every artifact goes through a temporary file in the target directory,
//! is fsynced and then renamed over the destination. A half-written
//! `index.md` is never observable. When the rename crosses filesystems
//! (EXDEV) the content is copied into a second temp file next to the target
//! and renamed from there.

use camino::Utf8Path;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Result of an atomic write operation
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Bytes written after line-ending normalization
    pub bytes_written: usize,
    /// Whether cross-filesystem fallback was used
    pub used_cross_filesystem_fallback: bool,
}

/// Atomically write UTF-8 `content` to `path` with LF line endings.
///
/// Parent directories are created as needed. Errors carry the offending path
/// in their message.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> io::Result<AtomicWriteResult> {
    let normalized = normalize_line_endings(content);

    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| annotate(e, &format!("failed to create directory {parent}")))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| annotate(e, &format!("failed to create temporary file in {parent}")))?;
    temp_file
        .write_all(normalized.as_bytes())
        .map_err(|e| annotate(e, &format!("failed to write temporary file for {path}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| annotate(e, &format!("failed to fsync temporary file for {path}")))?;

    let temp_path = temp_file.path().to_path_buf();
    let mut result = AtomicWriteResult {
        bytes_written: normalized.len(),
        used_cross_filesystem_fallback: false,
    };

    match temp_file.persist(path.as_std_path()) {
        Ok(_) => {}
        Err(err) if is_cross_filesystem_error(&err.error) => {
            tracing::debug!(path = %path, "rename crossed filesystems, copying instead");
            result.used_cross_filesystem_fallback = true;
            cross_filesystem_copy(&temp_path, path)?;
        }
        Err(err) => {
            return Err(annotate(err.error, &format!("failed to replace {path}")));
        }
    }

    Ok(result)
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

fn annotate(err: io::Error, what: &str) -> io::Error {
    io::Error::new(err.kind(), format!("{what}: {err}"))
}

#[cfg(unix)]
fn is_cross_filesystem_error(err: &io::Error) -> bool {
    // EXDEV on Linux and macOS
    err.raw_os_error() == Some(18)
}

#[cfg(not(unix))]
fn is_cross_filesystem_error(_err: &io::Error) -> bool {
    false
}

fn cross_filesystem_copy(temp_path: &Path, target: &Utf8Path) -> io::Result<()> {
    let content = fs::read(temp_path)?;
    let target_dir = target.parent().unwrap_or_else(|| Utf8Path::new("."));

    let mut target_temp = NamedTempFile::new_in(target_dir)?;
    target_temp.write_all(&content)?;
    target_temp.as_file().sync_all()?;
    target_temp
        .persist(target.as_std_path())
        .map_err(|e| annotate(e.error, &format!("failed to replace {target}")))?;

    let _ = fs::remove_file(temp_path);
    Ok(())
}
