//! CLI command handlers, one file per subcommand.

mod import;
mod run;
mod runs;
mod status;

pub use import::run_import;
pub use run::run_scheduler;
pub use runs::run_list_runs;
pub use status::run_status;
