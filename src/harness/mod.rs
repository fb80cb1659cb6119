//! Orchestration core: freeze a follower, race a delayed step-down against a
//! pending quorum write, classify what the write returned.

mod injector;
mod orchestrator;
mod outcome;
mod probe;
mod runner;

pub use injector::*;
pub use orchestrator::*;
pub use outcome::*;
pub use probe::*;
pub use runner::*;

#[cfg(test)]
mod orchestrator_test;
