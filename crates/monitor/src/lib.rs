//! `ewatch-monitor` library crate.
//!
//! Wires the liveness monitor together: configuration, the polling
//! loop, and the supervisor that runs the loop next to the Discord
//! gateway. The binary entrypoint lives in `main.rs`.

pub mod config;
pub mod monitor_loop;
pub mod signal;
pub mod supervisor;

pub use config::{ConfigError, DiscordConfig, MonitorConfig};
pub use monitor_loop::{MonitorError, MonitorLoop, MonitorState};
pub use supervisor::{ShutdownReason, ShutdownReport, Supervisor, UnitFailure};
