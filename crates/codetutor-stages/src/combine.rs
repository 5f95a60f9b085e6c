use std::fmt::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::{debug, info};

use codetutor_crawl::Source;
use codetutor_stage_api::{Outcome, Stage, StageError};
use codetutor_utils::atomic_write::write_file_atomic;

use crate::chapters::is_placeholder;
use crate::context::{
    Abstraction, Relationships, SharedContext, chapter_file_name, project_dir_name,
};

pub const COMBINE_STAGE: &str = "combine";

const INDEX_FILE: &str = "index.md";
const MANIFEST_FILE: &str = "tutorial.json";

/// Write `index.md`, one file per chapter and `tutorial.json` under
/// `<output_dir>/<project_name>/`.
///
/// The only failure mode is I/O, which is fatal. Placeholder chapters are
/// rendered like any other chapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombineTutorial;

pub struct CombineInput {
    root: Utf8PathBuf,
    project: String,
    language: String,
    repository_url: Option<String>,
    files: Vec<(String, String)>,
    abstractions: Vec<Abstraction>,
    relationships: Relationships,
    chapter_order: Vec<usize>,
    chapters: Vec<String>,
}

impl CombineInput {
    fn chapter_files(&self) -> Vec<String> {
        self.chapter_order
            .iter()
            .enumerate()
            .map(|(position, index)| chapter_file_name(position, &self.abstractions[*index].name))
            .collect()
    }
}

fn mermaid_label(text: &str) -> String {
    text.replace('"', "'")
}

fn render_index(input: &CombineInput, chapter_files: &[String]) -> String {
    let mut out = format!("# Tutorial: {}\n\n", input.project);

    if !input.relationships.summary.is_empty() {
        let _ = write!(out, "{}\n\n", input.relationships.summary);
    }
    if let Some(url) = &input.repository_url {
        let _ = write!(out, "**Source Repository:** [{url}]({url})\n\n");
    }

    if !input.abstractions.is_empty() {
        out.push_str("```mermaid\nflowchart TD\n");
        for (index, abstraction) in input.abstractions.iter().enumerate() {
            let _ = writeln!(out, "    A{index}[\"{}\"]", mermaid_label(&abstraction.name));
        }
        for edge in &input.relationships.edges {
            let _ = writeln!(
                out,
                "    A{} -- \"{}\" --> A{}",
                edge.source,
                mermaid_label(&edge.label),
                edge.target
            );
        }
        out.push_str("```\n\n");
    }

    out.push_str("## Chapters\n\n");
    for (position, (index, file)) in input.chapter_order.iter().zip(chapter_files).enumerate() {
        let _ = writeln!(
            out,
            "{}. [{}]({file})",
            position + 1,
            input.abstractions[*index].name
        );
    }

    out
}

fn render_chapter(body: &str) -> String {
    format!("{}\n\n---\n\nGenerated by codetutor\n", body.trim_end())
}

fn render_manifest(
    input: &CombineInput,
    chapter_files: &[String],
    generated_at: &str,
) -> Result<String, StageError> {
    let files: Vec<_> = input
        .files
        .iter()
        .map(|(path, hash)| json!({ "path": path, "blake3": hash }))
        .collect();

    let chapters: Vec<_> = input
        .chapter_order
        .iter()
        .zip(chapter_files)
        .zip(&input.chapters)
        .enumerate()
        .map(|(position, ((index, file), body))| {
            json!({
                "number": position + 1,
                "abstraction": index,
                "file": file,
                "placeholder": is_placeholder(body),
            })
        })
        .collect();

    let manifest = json!({
        "project": input.project,
        "language": input.language,
        "generated_at": generated_at,
        "files": files,
        "abstractions": input.abstractions,
        "relationships": input.relationships,
        "chapter_order": input.chapter_order,
        "chapters": chapters,
    });

    let bytes = serde_json_canonicalizer::to_vec(&manifest)
        .map_err(|e| StageError::malformed(format!("failed to canonicalize manifest: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| StageError::malformed(format!("canonical manifest is not UTF-8: {e}")))
}

fn write(root: &Utf8Path, name: &str, content: &str) -> Result<(), StageError> {
    let path = root.join(name);
    let result = write_file_atomic(&path, content).map_err(|e| StageError::io(path.as_str(), e))?;
    debug!(path = %path, bytes = result.bytes_written, "Wrote artifact");
    Ok(())
}

#[async_trait]
impl Stage<SharedContext> for CombineTutorial {
    type Prepared = CombineInput;
    type Output = PathBuf;

    fn name(&self) -> &str {
        COMBINE_STAGE
    }

    fn prepare(&self, ctx: &SharedContext) -> Result<CombineInput, StageError> {
        if ctx.chapters.len() != ctx.chapter_order.len() {
            return Err(StageError::Validation(format!(
                "{} chapters for {} ordered abstractions",
                ctx.chapters.len(),
                ctx.chapter_order.len()
            )));
        }
        if ctx.chapter_order.iter().any(|i| *i >= ctx.abstractions.len()) {
            return Err(StageError::Validation(
                "chapter order references a missing abstraction".to_string(),
            ));
        }

        let project = ctx.project_name_or_default().to_string();
        let root = ctx.output_dir.join(project_dir_name(&project));
        let root = Utf8PathBuf::from_path_buf(root).map_err(|path| {
            StageError::Validation(format!("output path is not valid UTF-8: {}", path.display()))
        })?;

        let repository_url = match &ctx.source {
            Source::Remote { url, .. } => Some(url.clone()),
            Source::Local { .. } => None,
        };

        Ok(CombineInput {
            root,
            project,
            language: ctx.language.clone(),
            repository_url,
            files: ctx
                .files
                .iter()
                .map(|f| {
                    (
                        f.path.clone(),
                        blake3::hash(f.content.as_bytes()).to_hex().to_string(),
                    )
                })
                .collect(),
            abstractions: ctx.abstractions.clone(),
            relationships: ctx.relationships.clone(),
            chapter_order: ctx.chapter_order.clone(),
            chapters: ctx.chapters.clone(),
        })
    }

    async fn execute(&self, input: &CombineInput) -> Result<PathBuf, StageError> {
        let chapter_files = input.chapter_files();
        let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        write(&input.root, INDEX_FILE, &render_index(input, &chapter_files))?;
        for (file, body) in chapter_files.iter().zip(&input.chapters) {
            write(&input.root, file, &render_chapter(body))?;
        }
        write(
            &input.root,
            MANIFEST_FILE,
            &render_manifest(input, &chapter_files, &generated_at)?,
        )?;

        info!(root = %input.root, chapters = chapter_files.len(), "Tutorial written");
        Ok(input.root.clone().into_std_path_buf())
    }

    fn finalize(&self, ctx: &mut SharedContext, _input: CombineInput, root: PathBuf) -> Outcome {
        ctx.output_root = Some(root);
        Outcome::DEFAULT
    }
}
