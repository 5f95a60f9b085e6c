use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use codetutor_llm::LlmClient;
use codetutor_stage_api::{Outcome, RetryPolicy, Stage, StageError};

use crate::context::{Edge, Relationships, SharedContext};
use crate::parse::{IndexRef, parse_yaml};
use crate::prompts;

pub const RELATIONSHIPS_STAGE: &str = "relationships";

/// Ask the provider for a project summary and the edges between abstractions.
pub struct AnalyzeRelationships {
    client: LlmClient,
    retry: RetryPolicy,
}

impl AnalyzeRelationships {
    pub fn new(client: LlmClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

pub struct RelationshipsInput {
    prompt: Option<String>,
    abstraction_count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRelationships {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    relationships: Vec<RawEdge>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEdge {
    from_abstraction: IndexRef,
    to_abstraction: IndexRef,
    #[serde(default)]
    label: String,
}

fn repair_relationships(raw: RawRelationships, count: usize) -> (Relationships, Vec<String>) {
    let mut warnings = Vec::new();
    let mut edges = Vec::new();

    for edge in raw.relationships {
        match (edge.from_abstraction.resolve(count), edge.to_abstraction.resolve(count)) {
            (Some(source), Some(target)) => edges.push(Edge {
                source,
                target,
                label: edge.label.trim().to_string(),
            }),
            _ => warnings.push(format!(
                "dropped relationship {} -> {} (have {count} abstractions)",
                edge.from_abstraction, edge.to_abstraction
            )),
        }
    }

    let relationships = Relationships {
        summary: raw.summary.trim().to_string(),
        edges,
    };
    (relationships, warnings)
}

#[async_trait]
impl Stage<SharedContext> for AnalyzeRelationships {
    type Prepared = RelationshipsInput;
    type Output = RawRelationships;

    fn name(&self) -> &str {
        RELATIONSHIPS_STAGE
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn prepare(&self, ctx: &SharedContext) -> Result<RelationshipsInput, StageError> {
        let prompt = (!ctx.abstractions.is_empty()).then(|| {
            prompts::relationships(
                ctx.project_name_or_default(),
                &ctx.abstractions,
                &ctx.files,
                &ctx.language,
            )
        });
        Ok(RelationshipsInput {
            prompt,
            abstraction_count: ctx.abstractions.len(),
        })
    }

    async fn execute(&self, input: &RelationshipsInput) -> Result<RawRelationships, StageError> {
        let Some(prompt) = &input.prompt else {
            debug!("No abstractions, skipping provider call");
            return Ok(RawRelationships::default());
        };
        let response = self.client.complete(RELATIONSHIPS_STAGE, prompt).await?;
        parse_yaml(&response)
    }

    fn finalize(
        &self,
        ctx: &mut SharedContext,
        input: RelationshipsInput,
        raw: RawRelationships,
    ) -> Outcome {
        let (relationships, warnings) = repair_relationships(raw, input.abstraction_count);
        for warning in warnings {
            ctx.warn(RELATIONSHIPS_STAGE, warning);
        }
        info!(edges = relationships.edges.len(), "Analyzed relationships");
        ctx.relationships = relationships;
        Outcome::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_edges_dropped() {
        let response = "```yaml\n\
            summary: |\n  A tutorial generator.\n\
            relationships:\n\
            \x20 - from_abstraction: 0 # Flow\n    to_abstraction: 1 # Stage\n    label: Runs\n\
            \x20 - from_abstraction: 1\n    to_abstraction: 4\n    label: Ghost\n\
            \x20 - from_abstraction: \"1 # Stage\"\n    to_abstraction: 0\n    label: Reports to\n\
            ```";
        let raw: RawRelationships = parse_yaml(response).unwrap();

        let (relationships, warnings) = repair_relationships(raw, 2);

        assert_eq!(relationships.summary, "A tutorial generator.");
        assert_eq!(
            relationships.edges,
            vec![
                Edge {
                    source: 0,
                    target: 1,
                    label: "Runs".to_string()
                },
                Edge {
                    source: 1,
                    target: 0,
                    label: "Reports to".to_string()
                },
            ]
        );
        assert_eq!(warnings, vec!["dropped relationship 1 -> 4 (have 2 abstractions)"]);
    }

    #[test]
    fn test_missing_endpoint_is_malformed() {
        let result: Result<RawRelationships, _> =
            parse_yaml("```yaml\nrelationships:\n  - label: orphan\n```");
        assert!(matches!(result, Err(StageError::MalformedResponse { .. })));
    }
}
