// ABOUTME: Command module aggregator for the stagehand CLI.
// ABOUTME: Re-exports deploy, recover, status and guidance handlers.

mod deploy;
mod recover;

pub use deploy::deploy;
pub use recover::{guidance, recover, status};
