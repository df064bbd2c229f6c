//! # rmon-setup — one-shot provisioning for RMON monitoring nodes
//!
//! Facade crate that re-exports the workspace crates so consumers
//! can depend on a single `rmon_setup` library.
//!
//! ## Crate breakdown
//!
//! | Module | Crate | Purpose |
//! |--------|-------|---------|
//! | [`core`] | rmon-core | Settings, node identity, severities, vendor bundle parsers |
//! | [`runtime`] | rmon-runtime | Shell execution, privilege switch, systemd, docker, bundle fetch |
//! | [`cli`] | rmon-cli | Clap entry point, prompts, provisioning pipeline |

pub use rmon_cli as cli;
pub use rmon_core as core;
pub use rmon_runtime as runtime;
