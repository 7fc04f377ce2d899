// ABOUTME: Library root for stagehand - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod bootstrap;
pub mod checks;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod hooks;
pub mod invoke;
pub mod lock;
pub mod output;
pub mod process;
pub mod rollback;
pub mod types;
