use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use codetutor_llm::LlmClient;
use codetutor_stage_api::{Outcome, RetryPolicy, Stage, StageError};

use crate::context::{Abstraction, SharedContext};
use crate::parse::{IndexRef, parse_yaml};
use crate::prompts;

pub const IDENTIFY_STAGE: &str = "identify";

/// Ask the provider for the codebase's core abstractions.
pub struct IdentifyAbstractions {
    client: LlmClient,
    retry: RetryPolicy,
}

impl IdentifyAbstractions {
    pub fn new(client: LlmClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

pub struct IdentifyInput {
    /// `None` when there is nothing to analyse
    prompt: Option<String>,
    file_count: usize,
    max_abstractions: usize,
}

/// One entry of the provider's answer, before index repair.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAbstraction {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) file_indices: Vec<IndexRef>,
}

/// Drop out-of-range file indices and surplus entries, reporting each repair.
pub(crate) fn repair_abstractions(
    raw: Vec<RawAbstraction>,
    file_count: usize,
    max_abstractions: usize,
) -> (Vec<Abstraction>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut abstractions = Vec::new();

    for entry in raw {
        let name = entry.name.trim().to_string();
        if name.is_empty() {
            warnings.push("dropped an abstraction with an empty name".to_string());
            continue;
        }
        if abstractions.len() == max_abstractions {
            warnings.push(format!(
                "dropped abstraction '{name}': more than {max_abstractions} returned"
            ));
            continue;
        }

        let mut file_indices = BTreeSet::new();
        for index in &entry.file_indices {
            match index.resolve(file_count) {
                Some(valid) => {
                    file_indices.insert(valid);
                }
                None => warnings.push(format!(
                    "abstraction '{name}': dropped file index {index} (have {file_count} files)"
                )),
            }
        }

        abstractions.push(Abstraction {
            name,
            description: entry.description.trim().to_string(),
            file_indices,
        });
    }

    (abstractions, warnings)
}

#[async_trait]
impl Stage<SharedContext> for IdentifyAbstractions {
    type Prepared = IdentifyInput;
    type Output = Vec<RawAbstraction>;

    fn name(&self) -> &str {
        IDENTIFY_STAGE
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn prepare(&self, ctx: &SharedContext) -> Result<IdentifyInput, StageError> {
        let prompt = (!ctx.files.is_empty()).then(|| {
            prompts::identify(
                ctx.project_name_or_default(),
                &ctx.files,
                &ctx.language,
                ctx.max_abstractions,
            )
        });
        Ok(IdentifyInput {
            prompt,
            file_count: ctx.files.len(),
            max_abstractions: ctx.max_abstractions,
        })
    }

    async fn execute(&self, input: &IdentifyInput) -> Result<Vec<RawAbstraction>, StageError> {
        let Some(prompt) = &input.prompt else {
            debug!("No files to analyse, skipping provider call");
            return Ok(Vec::new());
        };
        let response = self.client.complete(IDENTIFY_STAGE, prompt).await?;
        parse_yaml(&response)
    }

    fn finalize(
        &self,
        ctx: &mut SharedContext,
        input: IdentifyInput,
        raw: Vec<RawAbstraction>,
    ) -> Outcome {
        let (abstractions, warnings) =
            repair_abstractions(raw, input.file_count, input.max_abstractions);
        for warning in warnings {
            ctx.warn(IDENTIFY_STAGE, warning);
        }
        if abstractions.is_empty() && input.file_count > 0 {
            ctx.warn(IDENTIFY_STAGE, "provider identified no abstractions");
        }
        info!(count = abstractions.len(), "Identified abstractions");
        ctx.abstractions = abstractions;
        Outcome::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(name: &str, indices: Vec<IndexRef>) -> RawAbstraction {
        RawAbstraction {
            name: name.to_string(),
            description: " desc ".to_string(),
            file_indices: indices,
        }
    }

    #[test]
    fn test_parse_provider_answer() {
        let response = "```yaml\n\
            - name: Flow\n  description: |\n    Runs stages.\n  file_indices:\n    - 0 # src/flow.rs\n    - \"1 # src/node.rs\"\n\
            - name: Stage\n  description: A unit of work\n  file_indices: [1]\n\
            ```";
        let parsed: Vec<RawAbstraction> = parse_yaml(response).unwrap();

        let (abstractions, warnings) = repair_abstractions(parsed, 2, 10);
        assert!(warnings.is_empty());
        assert_eq!(abstractions[0].name, "Flow");
        assert_eq!(abstractions[0].description, "Runs stages.");
        assert_eq!(abstractions[0].file_indices, BTreeSet::from([0, 1]));
        assert_eq!(abstractions[1].file_indices, BTreeSet::from([1]));
    }

    #[test]
    fn test_missing_name_is_malformed() {
        let result: Result<Vec<RawAbstraction>, _> =
            parse_yaml("```yaml\n- description: nameless\n```");
        assert!(matches!(result, Err(StageError::MalformedResponse { .. })));
    }

    #[test]
    fn test_out_of_range_indices_dropped_with_warning() {
        let (abstractions, warnings) = repair_abstractions(
            vec![raw(
                "Config",
                vec![IndexRef::Number(0), IndexRef::Number(7), IndexRef::Number(-2)],
            )],
            3,
            10,
        );

        assert_eq!(abstractions[0].file_indices, BTreeSet::from([0]));
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("dropped file index 7"));
    }

    #[test]
    fn test_surplus_and_unnamed_entries_dropped() {
        let (abstractions, warnings) = repair_abstractions(
            vec![raw("A", vec![]), raw("  ", vec![]), raw("B", vec![]), raw("C", vec![])],
            1,
            2,
        );

        let names: Vec<_> = abstractions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(warnings.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_repaired_indices_in_bounds(
            file_count in 0usize..20,
            indices in prop::collection::vec(-5i64..40, 0..30),
        ) {
            let refs = indices.into_iter().map(IndexRef::Number).collect();
            let (abstractions, _) = repair_abstractions(vec![raw("X", refs)], file_count, 5);

            for index in &abstractions[0].file_indices {
                prop_assert!(*index < file_count);
            }
        }
    }
}
