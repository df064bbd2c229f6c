// rmon-core: Pure types, validation, settings, vendor file parsing
// No process or network I/O — this is the foundation crate.

pub mod config;
pub mod identity;
pub mod severity;
pub mod vendor;
