pub mod bundle;
pub mod combine;
pub mod config;
pub mod dependency_graph;
pub mod dirs;
pub mod js_lexer;
pub mod lint;
pub mod loader;
pub mod minify;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod util;

pub use config::Config;
pub use orchestrator::{BuildOptions, BuildSession};
pub use report::{ErrorCategory, RunReport};
