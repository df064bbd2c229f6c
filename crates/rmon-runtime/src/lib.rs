// rmon-runtime: Everything that touches the host
// Depends on rmon-core

pub mod bundle;
pub mod docker;
pub mod files;
pub mod host;
pub mod http;
pub mod packages;
pub mod privilege;
pub mod shell;
#[cfg(test)]
pub mod shell_mock;
pub mod systemd;
pub mod tunnel;
pub mod ui;
pub mod units;
