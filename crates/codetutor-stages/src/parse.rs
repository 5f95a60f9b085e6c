use serde::Deserialize;
use serde::de::DeserializeOwned;

use codetutor_stage_api::StageError;

/// Body of the first ```` ```yaml ```` (or ```` ```yml ````) fence.
pub(crate) fn extract_yaml_block(response: &str) -> Result<&str, StageError> {
    let (start, fence_len) = ["```yaml", "```yml"]
        .iter()
        .filter_map(|fence| response.find(fence).map(|at| (at, fence.len())))
        .min_by_key(|(at, _)| *at)
        .ok_or_else(|| StageError::malformed("no ```yaml block in response"))?;

    let body = &response[start + fence_len..];
    let end = body
        .find("```")
        .ok_or_else(|| StageError::malformed("unterminated ```yaml block"))?;

    Ok(body[..end].trim())
}

/// Extract the fenced YAML block and deserialize it into `T`.
pub(crate) fn parse_yaml<T: DeserializeOwned>(response: &str) -> Result<T, StageError> {
    let block = extract_yaml_block(response)?;
    serde_yaml::from_str(block).map_err(|e| StageError::malformed(format!("invalid YAML: {e}")))
}

/// An index written either as `3` or as `"3 # Name"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum IndexRef {
    Number(i64),
    Text(String),
}

impl IndexRef {
    /// The numeric index, or `None` when the text has no leading integer.
    pub(crate) fn value(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => text.split('#').next()?.trim().parse().ok(),
        }
    }

    /// The index if it addresses one of `len` items.
    pub(crate) fn resolve(&self, len: usize) -> Option<usize> {
        self.value()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n < len)
    }
}

impl std::fmt::Display for IndexRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(text) => write!(f, "{text:?}"),
        }
    }
}
