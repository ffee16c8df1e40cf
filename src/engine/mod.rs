//! Engine module for the command-line surface

pub mod arg_parser;
pub mod cli;
pub mod handlers;
pub mod opts;
pub mod progress;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, CommonArgs};
pub use cli::handle_run;
pub use handlers::{handle_plan, handle_read, handle_size, load_bundles};
pub use opts::{CliOpts, OrderArg};
