//! Step-down race harness.
//!
//! Drives a small replicated cluster through one failover race: a follower is
//! frozen, the leader is asked to step down on an independently scheduled
//! task, and a quorum write issued in the meantime must fail with a
//! leadership-change error rather than succeed or hang.
//!
//! ## Example Usage
//! ```rust,no_run
//! use stepdown_harness::{HarnessConfig, ScenarioRunner};
//!
//! # async fn demo() -> stepdown_harness::Result<()> {
//! let settings = HarnessConfig::new()?.validate()?;
//! let mut runner = ScenarioRunner::launch(&settings).await?;
//! let report = runner.run().await?;
//! println!("reproduced: {}", report.probe.outcome);
//! # Ok(())
//! # }
//! ```

mod cluster;
mod config;
mod constants;
mod errors;
mod harness;
mod utils;

pub use cluster::*;
pub use config::*;
pub use constants::*;
pub use errors::*;
pub use harness::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
