use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use codetutor_utils::error::CrawlError;

/// `git clone --depth 1 <url> <dest>`.
///
/// The token is spliced into HTTPS URLs for authentication and scrubbed from
/// anything that could reach logs or error messages.
pub(crate) async fn shallow_clone(
    url: &str,
    token: Option<&str>,
    dest: &Path,
) -> Result<(), CrawlError> {
    let git = which::which("git").map_err(|_| CrawlError::GitUnavailable)?;
    debug!(git = %git.display(), "Using git executable");
    info!(url = %url, "Cloning repository (shallow)");

    let output = Command::new(git)
        .args(["clone", "--depth", "1", "--quiet"])
        .arg(authenticated_url(url, token))
        .arg(dest)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| CrawlError::Io {
            path: dest.display().to_string(),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CrawlError::CloneFailed {
            url: url.to_string(),
            stderr: redact(stderr.trim(), token),
        });
    }

    Ok(())
}

fn authenticated_url(url: &str, token: Option<&str>) -> String {
    match (token, url.strip_prefix("https://")) {
        (Some(token), Some(rest)) if !rest.contains('@') => {
            format!("https://x-access-token:{token}@{rest}")
        }
        _ => url.to_string(),
    }
}

fn redact(text: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if !token.is_empty() => text.replace(token, "***"),
        _ => text.to_string(),
    }
}
