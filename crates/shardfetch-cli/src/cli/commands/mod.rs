//! CLI command handlers, one file per command.

mod docs;
mod find;
mod init;
mod organize;
mod probe;
mod run;
mod status;
mod stop;

pub use docs::{run_completions, run_man};
pub use find::run_find;
pub use init::run_init;
pub use organize::run_organize;
pub use probe::run_probe;
pub use run::run_fetch;
pub use status::run_status;
pub use stop::run_stop;
