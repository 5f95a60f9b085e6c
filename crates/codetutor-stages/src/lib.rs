//! Tutorial-generation stages for codetutor
//!
//! Six stages share one [`SharedContext`]:
//!
//! 1. [`FetchFiles`] crawls the source.
//! 2. [`IdentifyAbstractions`] asks the provider for core concepts.
//! 3. [`AnalyzeRelationships`] links them and summarises the project.
//! 4. [`OrderChapters`] picks a teaching order.
//! 5. [`WriteChapters`] writes one chapter per concept, concurrently.
//! 6. [`CombineTutorial`] renders everything to disk.
//!
//! [`tutorial_flow`] wires them into a [`codetutor_engine::Flow`].
//! [`ProjectStructure`] documents a source from its file layout alone, without a
//! provider.

mod chapters;
mod combine;
mod context;
mod fetch;
mod flow;
mod identify;
mod order;
mod parse;
mod prompts;
mod relationships;
mod structure;

pub use chapters::{
    CHAPTERS_STAGE, ChapterItem, PLACEHOLDER_MARKER, WriteChapters, is_placeholder,
    placeholder_chapter,
};
pub use combine::{COMBINE_STAGE, CombineTutorial};
pub use context::{
    Abstraction, CrawlConfig, Edge, IntegrityWarning, Relationships, SharedContext,
    chapter_file_name, project_dir_name,
};
pub use fetch::{FETCH_STAGE, FetchFiles};
pub use flow::{StageSettings, tutorial_flow};
pub use identify::{IDENTIFY_STAGE, IdentifyAbstractions};
pub use order::{ORDER_STAGE, OrderChapters};
pub use relationships::{AnalyzeRelationships, RELATIONSHIPS_STAGE};
pub use structure::{
    Architecture, Component, ProjectStructure, STRUCTURE_JSON_FILE, STRUCTURE_MARKDOWN_FILE,
    SharedLibrary,
};

pub use codetutor_crawl::{Source, SourceFile};
