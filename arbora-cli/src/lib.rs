//! Library surface of the arbora CLI.
//!
//! Split out of the binary so command orchestration and logging setup are
//! testable without spawning a process.

pub mod cli;
pub mod logging;
