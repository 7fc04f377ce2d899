// ABOUTME: Validated domain types shared across the crate.
// ABOUTME: Currently the deploy stage name.

mod stage;

pub use stage::{Stage, StageError};
