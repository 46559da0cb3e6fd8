//! Subprocess execution behind a mockable runner
//!
//! The code generator shells out to an external CLI. Everything that spawns a
//! process goes through [`ProcessRunner`] so tests can script the output.

pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;

pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::MockProcessRunner;
pub use runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner};
