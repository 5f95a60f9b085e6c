//! Configuration model, discovery, and validation for codetutor
//!
//! [`Config`] is built once at start-up and passed explicitly to everything
//! that needs it. Values are resolved with precedence
//! CLI > `.codetutor/config.toml` > built-in defaults, and every key remembers
//! its [`ConfigSource`].
//!
//! ```toml
//! [defaults]
//! output_dir = "docs/tutorial"
//! language = "english"
//! max_abstractions = 8
//!
//! [selectors]
//! include = ["**/*.rs", "*.md"]
//! exclude = ["target/*", "*test*"]
//!
//! [retry]
//! max_retries = 3
//! wait_secs = 10
//!
//! [batch]
//! concurrency = 4
//!
//! [llm]
//! provider = "anthropic"
//! timeout_secs = 120
//! ```

mod builder;
mod discovery;
mod model;
mod selectors;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use discovery::CONFIG_DIR;
pub use model::*;
pub use selectors::{DEFAULT_EXCLUDE_PATTERNS, DEFAULT_INCLUDE_PATTERNS};
pub use validation::SUPPORTED_PROVIDERS;
