//! Prompt text for the provider-backed stages

use std::fmt::Write as _;

use codetutor_crawl::SourceFile;

use crate::context::{Abstraction, Relationships};

/// Capitalized language name, e.g. `spanish` -> `Spanish`.
pub(crate) fn display_language(language: &str) -> String {
    let trimmed = language.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn language_instruction(language: &str, fields: &str) -> String {
    if language.trim().eq_ignore_ascii_case("english") {
        String::new()
    } else {
        format!(
            "IMPORTANT: Write {fields} in **{}**. Do NOT use English for these fields.\n\n",
            display_language(language)
        )
    }
}

fn file_context(files: &[SourceFile], indices: impl IntoIterator<Item = usize>) -> String {
    let mut out = String::new();
    for index in indices {
        if let Some(file) = files.get(index) {
            let _ = write!(out, "--- File Index {index}: {} ---\n{}\n\n", file.path, file.content);
        }
    }
    out
}

fn abstraction_listing(abstractions: &[Abstraction]) -> String {
    let mut out = String::new();
    for (index, abstraction) in abstractions.iter().enumerate() {
        let _ = writeln!(out, "- {index} # {}", abstraction.name);
    }
    out
}

pub(crate) fn identify(
    project: &str,
    files: &[SourceFile],
    language: &str,
    max_abstractions: usize,
) -> String {
    let listing: String = files
        .iter()
        .enumerate()
        .map(|(i, file)| format!("- {i} # {}\n", file.path))
        .collect();

    format!(
        "For the project `{project}`:\n\n\
         Codebase context:\n{context}\
         {lang}\
         Identify the top {max_abstractions} core abstractions a newcomer needs to understand.\n\
         For each abstraction give a concise `name`, a beginner-friendly `description` \
         (around 100 words, with a simple analogy), and the relevant `file_indices`.\n\n\
         Files available for reference:\n{listing}\n\
         Answer with a YAML list only:\n\n\
         ```yaml\n\
         - name: Query Processing\n  \
           description: |\n    \
             Explains what the abstraction does.\n  \
           file_indices:\n    \
             - 0 # path/to/file.py\n    \
             - 3 # path/to/another.py\n\
         ```\n",
        context = file_context(files, 0..files.len()),
        lang = language_instruction(language, "the `name` and `description`"),
    )
}

pub(crate) fn relationships(
    project: &str,
    abstractions: &[Abstraction],
    files: &[SourceFile],
    language: &str,
) -> String {
    let mut context = String::from("Identified abstractions:\n");
    for (index, abstraction) in abstractions.iter().enumerate() {
        let indices: Vec<String> = abstraction.file_indices.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            context,
            "- Index {index}: {} (files: [{}])\n  Description: {}",
            abstraction.name,
            indices.join(", "),
            abstraction.description
        );
    }
    let referenced = abstractions
        .iter()
        .flat_map(|a| a.file_indices.iter().copied())
        .collect::<std::collections::BTreeSet<_>>();
    context.push_str("\nRelevant file snippets:\n");
    context.push_str(&file_context(files, referenced));

    format!(
        "Based on the following abstractions and code from the project `{project}`:\n\n\
         {context}\n\
         {lang}\
         Provide:\n\
         1. A high-level `summary` of the project's purpose for a beginner.\n\
         2. A list of `relationships` between the abstractions. Each needs \
         `from_abstraction`, `to_abstraction` (indices) and a short `label`.\n\
         Every abstraction should take part in at least one relationship.\n\n\
         Abstraction indices:\n{listing}\n\
         Answer in YAML only:\n\n\
         ```yaml\n\
         summary: |\n  \
           A short explanation of the project.\n\
         relationships:\n  \
           - from_abstraction: 0 # AbstractionName1\n    \
             to_abstraction: 1 # AbstractionName2\n    \
             label: \"Manages\"\n\
         ```\n",
        listing = abstraction_listing(abstractions),
        lang = language_instruction(language, "the `summary` and every `label`"),
    )
}

pub(crate) fn order(
    project: &str,
    abstractions: &[Abstraction],
    relationships: &Relationships,
    language: &str,
) -> String {
    let mut context = format!("Project summary:\n{}\n\nRelationships:\n", relationships.summary);
    for edge in &relationships.edges {
        let _ = writeln!(
            context,
            "- From {} ({}) to {} ({}): {}",
            edge.source,
            abstractions.get(edge.source).map_or("", |a| a.name.as_str()),
            edge.target,
            abstractions.get(edge.target).map_or("", |a| a.name.as_str()),
            edge.label
        );
    }

    let note = if language.trim().eq_ignore_ascii_case("english") {
        String::new()
    } else {
        format!(
            "Note: names and summary are in {}.\n\n",
            display_language(language)
        )
    };

    format!(
        "Given the following project abstractions and their relationships for `{project}`:\n\n\
         Abstractions:\n{listing}\n\
         {context}\n\
         {note}\
         What is the best order to explain these abstractions, from most foundational \
         or user-facing to detailed implementation? Include every index exactly once.\n\n\
         Answer with a YAML list of indices:\n\n\
         ```yaml\n\
         - 2 # FoundationalConcept\n\
         - 0 # CoreClassA\n\
         - 1 # CoreClassB\n\
         ```\n",
        listing = abstraction_listing(abstractions),
    )
}

/// Inputs for a single chapter prompt.
pub(crate) struct ChapterPrompt<'a> {
    pub project: &'a str,
    pub chapter_number: usize,
    pub name: &'a str,
    pub description: &'a str,
    pub language: &'a str,
    /// `(title, file name)` for every chapter, in tutorial order
    pub toc: &'a [(String, String)],
    pub files: &'a [SourceFile],
}

pub(crate) fn chapter(p: &ChapterPrompt<'_>) -> String {
    let mut toc = String::new();
    for (position, (title, file)) in p.toc.iter().enumerate() {
        let _ = writeln!(toc, "{}. [{title}]({file})", position + 1);
    }
    let prev = p
        .chapter_number
        .checked_sub(2)
        .and_then(|i| p.toc.get(i))
        .map_or_else(|| "None".to_string(), |(t, f)| format!("[{t}]({f})"));
    let next = p
        .toc
        .get(p.chapter_number)
        .map_or_else(|| "None".to_string(), |(t, f)| format!("[{t}]({f})"));

    let lang = language_instruction(
        p.language,
        "the ENTIRE chapter (headings, explanations, code comments)",
    );

    format!(
        "{lang}Write a very beginner-friendly tutorial chapter (Markdown) for the project \
         `{project}` about the concept: \"{name}\". This is Chapter {number}.\n\n\
         Concept details:\n- Name: {name}\n- Description:\n{description}\n\n\
         Complete tutorial structure:\n{toc}\n\
         Previous chapter: {prev}\nNext chapter: {next}\n\n\
         Relevant code snippets:\n{code}\
         Instructions:\n\
         - Start with the heading `# Chapter {number}: {name}`.\n\
         - Motivate the concept with a concrete use case before any code.\n\
         - Keep code blocks under 10 lines and explain each one right after it.\n\
         - Use a mermaid sequenceDiagram where it helps.\n\
         - Link other chapters with the Markdown links above.\n\
         - End with a brief conclusion and a transition to the next chapter.\n\n\
         Output only the Markdown content of this chapter.\n",
        project = p.project,
        name = p.name,
        number = p.chapter_number,
        description = p.description,
        code = file_context(p.files, 0..p.files.len()),
    )
}
