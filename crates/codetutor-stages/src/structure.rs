//! Structural project documentation built from file paths alone
//!
//! Each top-level directory of the crawled source is a component. Files inside
//! a component are sorted into role buckets by keywords in their path, and a
//! component whose name marks it as shared code is listed as a library
//! instead. No provider is involved, so the result is fully deterministic for
//! a given file list.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

use codetutor_crawl::SourceFile;
use codetutor_utils::atomic_write::write_file_atomic;

pub const STRUCTURE_JSON_FILE: &str = "documentation.json";
pub const STRUCTURE_MARKDOWN_FILE: &str = "documentation.md";

/// Name segments that mark a top-level directory as a shared library.
const LIBRARY_SEGMENTS: &[&str] = &["lib", "libs", "library", "shared", "common"];

/// File names that mark an entry point.
const ENTRY_POINT_FILES: &[&str] = &["main.rs", "main.go", "__main__.py"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStructure {
    pub project_name: String,
    pub components: BTreeMap<String, Component>,
    pub shared_libraries: BTreeMap<String, SharedLibrary>,
    pub architecture: Architecture,
}

/// Files of one top-level directory, by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Component {
    pub main_class: Option<String>,
    pub controllers: Vec<String>,
    pub services: Vec<String>,
    pub repositories: Vec<String>,
    pub models: Vec<String>,
    pub config: Vec<String>,
    pub other: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SharedLibrary {
    pub description: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Architecture {
    /// Component names, sorted
    pub components: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Controller,
    Service,
    Repository,
    Model,
    Config,
    Other,
}

/// Role of `inner`, the lowercased path below the component directory.
///
/// The first matching keyword wins, in the order of the checks below.
fn role_of(inner: &str) -> Role {
    if inner.contains("controller") || inner.contains("api") {
        Role::Controller
    } else if inner.contains("service") {
        Role::Service
    } else if inner.contains("repository") {
        Role::Repository
    } else if inner.contains("model") || inner.contains("entity") {
        Role::Model
    } else if inner.contains("config") {
        Role::Config
    } else {
        Role::Other
    }
}

fn is_entry_point(file_name: &str) -> bool {
    file_name.ends_with("Application.java") || ENTRY_POINT_FILES.contains(&file_name)
}

fn is_library(component: &str) -> bool {
    component
        .to_lowercase()
        .split(['-', '_', '.'])
        .any(|segment| LIBRARY_SEGMENTS.contains(&segment))
}

impl Component {
    fn add(&mut self, path: &str, inner: &str) {
        let file_name = inner.rsplit('/').next().unwrap_or(inner);
        if is_entry_point(file_name) && self.main_class.is_none() {
            self.main_class = Some(path.to_string());
            return;
        }
        let bucket = match role_of(&inner.to_lowercase()) {
            Role::Controller => &mut self.controllers,
            Role::Service => &mut self.services,
            Role::Repository => &mut self.repositories,
            Role::Model => &mut self.models,
            Role::Config => &mut self.config,
            Role::Other => &mut self.other,
        };
        bucket.push(path.to_string());
    }

    fn file_count(&self) -> usize {
        usize::from(self.main_class.is_some())
            + self.controllers.len()
            + self.services.len()
            + self.repositories.len()
            + self.models.len()
            + self.config.len()
            + self.other.len()
    }
}

impl ProjectStructure {
    /// Group `files` by top-level directory.
    ///
    /// Files directly at the source root belong to no component and are
    /// skipped.
    #[must_use]
    pub fn from_files(project_name: &str, files: &[SourceFile]) -> Self {
        let mut structure = Self {
            project_name: project_name.to_string(),
            ..Self::default()
        };

        for file in files {
            let Some((component, inner)) = file.path.split_once('/') else {
                continue;
            };
            if is_library(component) {
                structure
                    .shared_libraries
                    .entry(component.to_string())
                    .or_insert_with(|| SharedLibrary {
                        description: format!(
                            "Code shared by the other components of {project_name}"
                        ),
                        files: Vec::new(),
                    })
                    .files
                    .push(file.path.clone());
            } else {
                structure
                    .components
                    .entry(component.to_string())
                    .or_default()
                    .add(&file.path, inner);
            }
        }

        structure.architecture.components = structure.components.keys().cloned().collect();
        structure
    }

    #[must_use]
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# {} Documentation\n\n", self.project_name);

        let files: usize = self
            .components
            .values()
            .map(Component::file_count)
            .chain(self.shared_libraries.values().map(|lib| lib.files.len()))
            .sum();
        let _ = write!(
            out,
            "## Project Overview\n\n{files} files across {} component(s) and {} shared \
             librar{}.\n\n",
            self.components.len(),
            self.shared_libraries.len(),
            if self.shared_libraries.len() == 1 { "y" } else { "ies" },
        );

        out.push_str("## Architecture\n\n### Components\n\n");
        for name in &self.architecture.components {
            let _ = writeln!(out, "- {name}");
        }

        if !self.components.is_empty() {
            out.push_str("\n## Components\n");
        }
        for (name, component) in &self.components {
            let _ = write!(out, "\n### {name}\n\n");
            if let Some(main) = &component.main_class {
                let _ = writeln!(out, "**Main Class:** `{main}`\n");
            }
            for (title, paths) in [
                ("Controllers", &component.controllers),
                ("Services", &component.services),
                ("Repositories", &component.repositories),
                ("Domain Models", &component.models),
                ("Configuration", &component.config),
                ("Other Files", &component.other),
            ] {
                render_list(&mut out, title, paths);
            }
        }

        if !self.shared_libraries.is_empty() {
            out.push_str("\n## Shared Libraries\n");
        }
        for (name, library) in &self.shared_libraries {
            let _ = write!(out, "\n### {name}\n\n{}\n\n", library.description);
            render_list(&mut out, "Files", &library.files);
        }

        out
    }

    /// Write `documentation.json` and `documentation.md` under `root`.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error; the JSON is written first.
    pub fn write_to(&self, root: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
        let json = serde_json::to_string_pretty(self)?;
        let mut written = Vec::with_capacity(2);
        for (name, content) in [
            (STRUCTURE_JSON_FILE, format!("{json}\n")),
            (STRUCTURE_MARKDOWN_FILE, self.render_markdown()),
        ] {
            let path = root.join(name);
            let result = write_file_atomic(&path, &content)?;
            debug!(path = %path, bytes = result.bytes_written, "Wrote structure document");
            written.push(path);
        }
        Ok(written)
    }
}

fn render_list(out: &mut String, title: &str, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    let _ = writeln!(out, "#### {title}\n");
    for path in paths {
        let _ = writeln!(out, "- `{path}`");
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn files(paths: &[&str]) -> Vec<SourceFile> {
        paths.iter().map(|p| SourceFile::new(*p, "")).collect()
    }

    fn shop() -> ProjectStructure {
        ProjectStructure::from_files(
            "shop",
            &files(&[
                "README.java",
                "order-service/src/main/java/shop/OrderServiceApplication.java",
                "order-service/src/main/java/shop/api/OrderController.java",
                "order-service/src/main/java/shop/service/OrderService.java",
                "order-service/src/main/java/shop/repository/OrderRepository.java",
                "order-service/src/main/java/shop/entity/Order.java",
                "order-service/src/main/java/shop/config/SecurityConfig.java",
                "order-service/src/main/java/shop/util/Money.java",
                "product-service/src/main/java/shop/model/Product.java",
                "shared-token-validation-lib/src/main/java/auth/JwtValidator.java",
            ]),
        )
    }

    #[test]
    fn test_files_sorted_into_roles() {
        let structure = shop();
        let orders = &structure.components["order-service"];

        assert_eq!(
            orders.main_class.as_deref(),
            Some("order-service/src/main/java/shop/OrderServiceApplication.java")
        );
        assert_eq!(orders.controllers.len(), 1);
        assert!(orders.controllers[0].ends_with("OrderController.java"));
        assert!(orders.services[0].ends_with("OrderService.java"));
        assert!(orders.repositories[0].ends_with("OrderRepository.java"));
        assert!(orders.models[0].ends_with("Order.java"));
        assert!(orders.config[0].ends_with("SecurityConfig.java"));
        assert!(orders.other[0].ends_with("Money.java"));
        assert_eq!(orders.file_count(), 7);
    }

    #[test]
    fn test_component_name_does_not_decide_role() {
        let structure = shop();
        let products = &structure.components["product-service"];

        assert!(products.services.is_empty());
        assert_eq!(products.models.len(), 1);
    }

    #[test]
    fn test_shared_library_and_root_files() {
        let structure = shop();

        assert_eq!(
            structure.architecture.components,
            vec!["order-service", "product-service"]
        );
        let library = &structure.shared_libraries["shared-token-validation-lib"];
        assert_eq!(library.files.len(), 1);
        assert!(!structure.components.contains_key("shared-token-validation-lib"));
        assert!(!structure.components.contains_key("README.java"));
    }

    #[test]
    fn test_library_detection_uses_name_segments() {
        assert!(is_library("common"));
        assert!(is_library("auth_lib"));
        assert!(is_library("Shared.Kernel"));
        assert!(!is_library("calibration"));
        assert!(!is_library("order-service"));
    }

    #[test]
    fn test_entry_points() {
        let structure = ProjectStructure::from_files(
            "mixed",
            &files(&["cli/src/main.rs", "cli/src/bin/main.rs", "worker/cmd/main.go"]),
        );

        assert_eq!(
            structure.components["cli"].main_class.as_deref(),
            Some("cli/src/main.rs")
        );
        assert_eq!(structure.components["cli"].other, vec!["cli/src/bin/main.rs"]);
        assert_eq!(
            structure.components["worker"].main_class.as_deref(),
            Some("worker/cmd/main.go")
        );
    }

    #[test]
    fn test_markdown_layout() {
        let md = shop().render_markdown();

        assert!(md.starts_with("# shop Documentation\n"));
        assert!(md.contains("9 files across 2 component(s) and 1 shared library."));
        assert!(md.contains("### order-service"));
        assert!(md.contains(
            "**Main Class:** `order-service/src/main/java/shop/OrderServiceApplication.java`"
        ));
        assert!(md.contains("#### Domain Models"));
        assert!(md.contains("## Shared Libraries"));
        assert!(md.find("### order-service") < md.find("### product-service"));
    }

    #[test]
    fn test_empty_structure_renders() {
        let md = ProjectStructure::from_files("empty", &[]).render_markdown();

        assert!(md.contains("0 files across 0 component(s) and 0 shared libraries."));
        assert!(!md.contains("## Components"));
        assert!(!md.contains("## Shared Libraries"));
    }

    #[test]
    fn test_write_to_creates_both_documents() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("shop")).unwrap();

        let written = shop().write_to(&root).unwrap();

        assert_eq!(
            written,
            vec![root.join("documentation.json"), root.join("documentation.md")]
        );
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(root.join("documentation.json")).unwrap())
                .unwrap();
        assert_eq!(json["project_name"], "shop");
        assert_eq!(
            json["architecture"]["components"],
            serde_json::json!(["order-service", "product-service"])
        );
        assert_eq!(json["components"]["product-service"]["main_class"], serde_json::Value::Null);
        assert!(json["shared_libraries"]["shared-token-validation-lib"]["files"].is_array());
    }
}
