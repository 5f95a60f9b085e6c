//! Runs that never contact a provider: file listing and structural docs.

use std::io;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use tracing::info;

use codetutor_config::Config;
use codetutor_crawl::{Crawler, Source, SourceFile};
use codetutor_stages::{CrawlConfig, ProjectStructure, project_dir_name};
use codetutor_utils::error::TutorError;

/// Crawl `source` with the configured selectors.
///
/// # Errors
///
/// Returns [`TutorError::Crawl`] when the source cannot be read or a pattern
/// is invalid.
pub async fn list_files(
    config: &Config,
    source: &Source,
    crawler: &dyn Crawler,
) -> Result<Vec<SourceFile>, TutorError> {
    let request = CrawlConfig::from_config(config).to_request();
    let files = crawler.crawl(source, &request).await?;
    info!(source = %source.describe(), files = files.len(), "Listed files");
    Ok(files)
}

/// Result of a structural documentation run.
#[derive(Debug, Clone)]
pub struct StructureRun {
    /// `<output>/<project>/`
    pub output_root: PathBuf,
    pub project_name: String,
    pub structure: ProjectStructure,
}

/// Write `documentation.json` and `documentation.md` for `source` from its
/// file layout.
///
/// # Errors
///
/// Returns [`TutorError::Crawl`] for crawl failures and [`TutorError::Io`]
/// when the documents cannot be written.
pub async fn document_structure(
    config: &Config,
    source: Source,
    project_name: Option<String>,
    crawler: &dyn Crawler,
) -> Result<StructureRun, TutorError> {
    let files = list_files(config, &source, crawler).await?;
    let project_name = project_name
        .or_else(|| source.default_project_name())
        .unwrap_or_else(|| "project".to_string());

    let structure = ProjectStructure::from_files(&project_name, &files);
    let root = config.output_dir().join(project_dir_name(&project_name));
    let root = Utf8PathBuf::from_path_buf(root).map_err(|path| {
        io::Error::other(format!("output path is not valid UTF-8: {}", path.display()))
    })?;
    structure.write_to(&root)?;

    info!(
        output = %root,
        components = structure.components.len(),
        shared_libraries = structure.shared_libraries.len(),
        "Structure documented"
    );

    Ok(StructureRun {
        output_root: root.into_std_path_buf(),
        project_name,
        structure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetutor_crawl::FsCrawler;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &std::path::Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "class X {}\n").unwrap();
    }

    fn java_config(output: &std::path::Path) -> Config {
        Config::builder()
            .output_dir(output)
            .include(["*.java"])
            .exclude(Vec::<String>::new())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_files_applies_selectors() {
        let project = TempDir::new().unwrap();
        write(project.path(), "billing/src/BillingApplication.java");
        write(project.path(), "billing/README.md");
        write(project.path(), "common-lib/src/Token.java");
        let config = java_config(project.path());

        let files = list_files(
            &config,
            &Source::Local {
                path: project.path().to_path_buf(),
            },
            &FsCrawler,
        )
        .await
        .unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["billing/src/BillingApplication.java", "common-lib/src/Token.java"]
        );
    }

    #[tokio::test]
    async fn test_document_structure_writes_under_project_dir() {
        let project = TempDir::new().unwrap();
        write(project.path(), "billing/src/BillingApplication.java");
        write(project.path(), "billing/src/web/InvoiceController.java");
        write(project.path(), "common-lib/src/Token.java");
        let output = TempDir::new().unwrap();
        let config = java_config(output.path());

        let run = document_structure(
            &config,
            Source::Local {
                path: project.path().to_path_buf(),
            },
            Some("../billing app".to_string()),
            &FsCrawler,
        )
        .await
        .unwrap();

        assert_eq!(run.output_root, output.path().join("___billing_app"));
        assert_eq!(run.project_name, "../billing app");
        assert_eq!(run.structure.architecture.components, vec!["billing"]);
        assert!(run.output_root.join("documentation.json").is_file());
        let md = fs::read_to_string(run.output_root.join("documentation.md")).unwrap();
        assert!(md.contains("**Main Class:** `billing/src/BillingApplication.java`"));
        assert!(md.contains("### common-lib"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_crawl_error() {
        let output = TempDir::new().unwrap();
        let config = java_config(output.path());

        let err = document_structure(
            &config,
            Source::Local {
                path: output.path().join("nope"),
            },
            None,
            &FsCrawler,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TutorError::Crawl(_)));
        assert_eq!(err.to_exit_code().as_i32(), 3);
    }
}
