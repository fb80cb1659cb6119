// -
// Scenario documents

/// Field written by both scenario inserts
pub const SCENARIO_FIELD: &str = "x";

/// Value of the baseline write, replicated everywhere before the race
pub const BASELINE_VALUE: i64 = 1;

/// Value of the write that the frozen follower never sees
pub const LAGGING_VALUE: i64 = 2;

// -
// Logging

/// File name used when `logging.log_dir` is set
pub const LOG_FILE_NAME: &str = "stepdown-harness.log";

/// Environment prefix for configuration overrides (`HARNESS__SCENARIO__...`)
pub(crate) const CONFIG_ENV_PREFIX: &str = "HARNESS";

// -
// Exit codes

/// The pending write failed with `LeadershipLost`
pub const EXIT_REPRODUCED: u8 = 0;

/// Any other outcome, or the run could not complete
pub const EXIT_SCENARIO_FAILED: u8 = 1;
