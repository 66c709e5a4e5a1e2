//! CLI parsing, federation configuration, logging setup, and scenario-file
//! parsing: the ambient layer around the coordinator and the two role
//! processes. Treated as an external collaborator by `spec.md` §1, but
//! implemented here rather than stubbed, the way the teacher keeps its own
//! admin concerns (config, logging, audit) in a dedicated crate.
mod config;
mod logging;
mod scenario;

pub use config::{Cli, FederationConfig};
pub use logging::init_logging;
pub use scenario::{parse_scenario, ScenarioCommand};
