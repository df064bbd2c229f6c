// rmon-cli: Clap entry point, prompts, tracing init, provisioning pipeline
// Depends on rmon-core, rmon-runtime

pub mod commands;
pub mod logging;
pub mod prompt;
pub mod setup;

pub use commands::run;
