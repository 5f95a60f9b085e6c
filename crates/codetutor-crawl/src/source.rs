use std::fmt;
use std::path::{Path, PathBuf};

use codetutor_utils::error::ConfigError;

/// Where the code to document comes from.
///
/// `Debug` never prints the access token.
#[derive(Clone, PartialEq, Eq)]
pub enum Source {
    Remote { url: String, token: Option<String> },
    Local { path: PathBuf },
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { url, token } => f
                .debug_struct("Remote")
                .field("url", url)
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::Local { path } => f.debug_struct("Local").field("path", path).finish(),
        }
    }
}

impl Source {
    /// Build a source from the mutually exclusive `--repo` / `--dir` pair.
    ///
    /// The token only applies to remote sources and is dropped for local ones.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSource` unless exactly one of `repo` and
    /// `dir` is given.
    pub fn from_selection(
        repo: Option<String>,
        dir: Option<PathBuf>,
        token: Option<String>,
    ) -> Result<Self, ConfigError> {
        match (repo, dir) {
            (Some(url), None) => {
                if url.trim().is_empty() {
                    return Err(ConfigError::InvalidSource {
                        reason: "repository URL is empty".to_string(),
                    });
                }
                Ok(Self::Remote {
                    url,
                    token: token.filter(|t| !t.trim().is_empty()),
                })
            }
            (None, Some(path)) => Ok(Self::Local { path }),
            (Some(_), Some(_)) => Err(ConfigError::InvalidSource {
                reason: "both --repo and --dir were given".to_string(),
            }),
            (None, None) => Err(ConfigError::InvalidSource {
                reason: "neither --repo nor --dir was given".to_string(),
            }),
        }
    }

    /// Name used for the output directory when none is configured.
    ///
    /// Remote: last URL path segment without `.git`. Local: the directory's
    /// basename, resolved through the filesystem for paths like `.`.
    #[must_use]
    pub fn default_project_name(&self) -> Option<String> {
        match self {
            Self::Remote { url, .. } => {
                let trimmed = url.trim_end_matches('/');
                let segment = trimmed.rsplit(['/', ':']).next()?;
                let name = segment.strip_suffix(".git").unwrap_or(segment);
                (!matches!(name, "" | "." | "..")).then(|| name.to_string())
            }
            Self::Local { path } => basename(path).or_else(|| {
                path.canonicalize()
                    .ok()
                    .and_then(|resolved| basename(&resolved))
            }),
        }
    }

    /// Log-safe description: the URL or the path, never the token.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Remote { url, .. } => url.clone(),
            Self::Local { path } => path.display().to_string(),
        }
    }
}

fn basename(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
}
