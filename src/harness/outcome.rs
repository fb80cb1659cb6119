use std::fmt;

/// Why a quorum write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The node gave up leadership while the write was pending
    LeadershipLost,
    /// Any other cluster error, verbatim
    Other(String),
}

/// Classified result of a quorum write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The write reached its write concern; carries the acknowledgment count
    Acknowledged(usize),
    Failed(FailureReason),
    /// The write concern was not met in time and no role change was seen
    TimedOut,
}

impl Outcome {
    /// The only outcome the scenario accepts.
    pub fn is_leadership_lost(&self) -> bool {
        matches!(self, Outcome::Failed(FailureReason::LeadershipLost))
    }
}

impl fmt::Display for Outcome {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Outcome::Acknowledged(count) => write!(f, "Acknowledged({count})"),
            Outcome::Failed(FailureReason::LeadershipLost) => write!(f, "Failed(LeadershipLost)"),
            Outcome::Failed(FailureReason::Other(detail)) => write!(f, "Failed(Other({detail}))"),
            Outcome::TimedOut => write!(f, "TimedOut"),
        }
    }
}
