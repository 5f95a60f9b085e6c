use std::fs;
use std::path::Path;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use codetutor_utils::error::CrawlError;

use crate::git;
use crate::selector::FileSelector;
use crate::{CrawlRequest, Crawler, Source, SourceFile};

/// Walk `root` and return the selected UTF-8 files in lexicographic walk order.
///
/// Files larger than `request.max_file_size` or not valid UTF-8 are skipped,
/// and `.git` is never descended.
///
/// # Errors
///
/// Returns `CrawlError::RootNotFound`/`NotADirectory` for a bad root,
/// `InvalidPattern` for bad globs, and `Io` when a directory cannot be listed.
pub fn crawl_directory(root: &Path, request: &CrawlRequest) -> Result<Vec<SourceFile>, CrawlError> {
    if !root.exists() {
        return Err(CrawlError::RootNotFound {
            path: root.display().to_string(),
        });
    }
    if !root.is_dir() {
        return Err(CrawlError::NotADirectory {
            path: root.display().to_string(),
        });
    }

    let root = Utf8PathBuf::from_path_buf(root.to_path_buf()).map_err(|path| CrawlError::Io {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, "path is not valid UTF-8"),
    })?;

    let walker = Walker {
        root: &root,
        selector: FileSelector::new(&request.include, &request.exclude)?,
        request,
    };

    let mut files = Vec::new();
    walker.walk(&root, &mut files)?;

    info!(root = %root, files = files.len(), "Crawl complete");
    Ok(files)
}

struct Walker<'a> {
    root: &'a Utf8Path,
    selector: FileSelector,
    request: &'a CrawlRequest,
}

impl Walker<'_> {
    fn walk(&self, dir: &Utf8Path, files: &mut Vec<SourceFile>) -> Result<(), CrawlError> {
        let io_err = |source| CrawlError::Io {
            path: dir.to_string(),
            source,
        };
        let mut entries = fs::read_dir(dir)
            .map_err(io_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        entries.sort_by_key(fs::DirEntry::file_name);

        for entry in entries {
            let Ok(path) = Utf8PathBuf::try_from(entry.path()) else {
                warn!(path = %entry.path().display(), "Skipping non-UTF-8 path");
                continue;
            };

            let is_dir = entry.file_type().is_ok_and(|kind| kind.is_dir());
            if is_dir {
                if path.file_name() != Some(".git") {
                    self.walk(&path, files)?;
                }
                continue;
            }

            if let Some(file) = self.read_candidate(&path) {
                files.push(file);
            }
        }

        Ok(())
    }

    fn read_candidate(&self, path: &Utf8Path) -> Option<SourceFile> {
        let relative = path.strip_prefix(self.root).unwrap_or(path);
        if !self.selector.should_include(relative) {
            return None;
        }

        let metadata = match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return None,
            Err(e) => {
                warn!(path = %relative, error = %e, "Skipping unreadable file");
                return None;
            }
        };

        if metadata.len() > self.request.max_file_size {
            debug!(path = %relative, size = metadata.len(), "Skipping file over size limit");
            return None;
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %relative, error = %e, "Skipping unreadable file");
                return None;
            }
        };

        let Ok(content) = String::from_utf8(bytes) else {
            debug!(path = %relative, "Skipping non-UTF-8 file");
            return None;
        };

        let display_path = if self.request.relative_paths {
            relative.as_str().to_string()
        } else {
            path.as_str().to_string()
        };

        Some(SourceFile {
            path: display_path,
            content,
        })
    }
}

/// Production crawler: local walks plus shallow clones for remote sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCrawler;

#[async_trait]
impl Crawler for FsCrawler {
    async fn crawl(
        &self,
        source: &Source,
        request: &CrawlRequest,
    ) -> Result<Vec<SourceFile>, CrawlError> {
        match source {
            Source::Local { path } => {
                let path = path.clone();
                let request = request.clone();
                tokio::task::spawn_blocking(move || crawl_directory(&path, &request))
                    .await
                    .map_err(|e| CrawlError::Io {
                        path: source.describe(),
                        source: std::io::Error::other(e.to_string()),
                    })?
            }
            Source::Remote { url, token } => {
                let workdir = tempfile::TempDir::new().map_err(|e| CrawlError::Io {
                    path: std::env::temp_dir().display().to_string(),
                    source: e,
                })?;
                let checkout = workdir.path().join("repo");
                git::shallow_clone(url, token.as_deref(), &checkout).await?;

                let request = CrawlRequest {
                    relative_paths: true,
                    ..request.clone()
                };
                let files = tokio::task::spawn_blocking(move || {
                    let files = crawl_directory(&checkout, &request);
                    drop(workdir);
                    files
                })
                .await
                .map_err(|e| CrawlError::Io {
                    path: url.clone(),
                    source: std::io::Error::other(e.to_string()),
                })??;
                Ok(files)
            }
        }
    }
}
