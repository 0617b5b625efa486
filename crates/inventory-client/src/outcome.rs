use inventory::{CheckStatus, ReduceStatus, RestoreStatus};

/// Client-level outcome of an availability check.
///
/// The degraded leg collapses into `Insufficient`: when the store cannot
/// answer, assume no stock rather than oversell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Available,
    Insufficient,
}

impl From<CheckStatus> for CheckOutcome {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Available => CheckOutcome::Available,
            CheckStatus::Insufficient => CheckOutcome::Insufficient,
        }
    }
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckOutcome::Available => write!(f, "Available"),
            CheckOutcome::Insufficient => write!(f, "Insufficient"),
        }
    }
}

/// Client-level outcome of a reduce.
///
/// `Unavailable` is the explicit degraded answer, distinct from every
/// store status. It is never `Committed` in disguise: the decrement may or
/// may not have happened, and the caller must compensate as if it did not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOutcome {
    Committed,
    InsufficientStock,
    AlreadyApplied,
    Unavailable,
}

impl ReduceOutcome {
    /// True when the decrement is known to stand, whether from this
    /// delivery or an earlier one with the same token.
    pub fn is_committed(&self) -> bool {
        matches!(self, ReduceOutcome::Committed | ReduceOutcome::AlreadyApplied)
    }
}

impl From<ReduceStatus> for ReduceOutcome {
    fn from(status: ReduceStatus) -> Self {
        match status {
            ReduceStatus::Committed => ReduceOutcome::Committed,
            ReduceStatus::InsufficientStock => ReduceOutcome::InsufficientStock,
            ReduceStatus::AlreadyApplied => ReduceOutcome::AlreadyApplied,
        }
    }
}

impl std::fmt::Display for ReduceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOutcome::Committed => write!(f, "Committed"),
            ReduceOutcome::InsufficientStock => write!(f, "InsufficientStock"),
            ReduceOutcome::AlreadyApplied => write!(f, "AlreadyApplied"),
            ReduceOutcome::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// Client-level outcome of a restore.
///
/// `Unavailable` means the compensation could not be confirmed; the caller
/// must retry or escalate, never treat it as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Committed,
    AlreadyApplied,
    NotFound,
    Unavailable,
}

impl RestoreOutcome {
    /// True when the stock is known to be back, whether from this delivery
    /// or an earlier one with the same token.
    pub fn is_restored(&self) -> bool {
        matches!(self, RestoreOutcome::Committed | RestoreOutcome::AlreadyApplied)
    }
}

impl From<RestoreStatus> for RestoreOutcome {
    fn from(status: RestoreStatus) -> Self {
        match status {
            RestoreStatus::Committed => RestoreOutcome::Committed,
            RestoreStatus::AlreadyApplied => RestoreOutcome::AlreadyApplied,
            RestoreStatus::NotFound => RestoreOutcome::NotFound,
        }
    }
}

impl std::fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreOutcome::Committed => write!(f, "Committed"),
            RestoreOutcome::AlreadyApplied => write!(f, "AlreadyApplied"),
            RestoreOutcome::NotFound => write!(f, "NotFound"),
            RestoreOutcome::Unavailable => write!(f, "Unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_applied_counts_as_committed() {
        assert!(ReduceOutcome::Committed.is_committed());
        assert!(ReduceOutcome::AlreadyApplied.is_committed());
        assert!(!ReduceOutcome::InsufficientStock.is_committed());
        assert!(!ReduceOutcome::Unavailable.is_committed());
    }

    #[test]
    fn unconfirmed_restore_is_not_restored() {
        assert!(RestoreOutcome::Committed.is_restored());
        assert!(RestoreOutcome::AlreadyApplied.is_restored());
        assert!(!RestoreOutcome::NotFound.is_restored());
        assert!(!RestoreOutcome::Unavailable.is_restored());
    }

    #[test]
    fn wire_statuses_map_one_to_one() {
        assert_eq!(
            ReduceOutcome::from(ReduceStatus::InsufficientStock),
            ReduceOutcome::InsufficientStock
        );
        assert_eq!(
            RestoreOutcome::from(RestoreStatus::NotFound),
            RestoreOutcome::NotFound
        );
        assert_eq!(
            CheckOutcome::from(CheckStatus::Available),
            CheckOutcome::Available
        );
    }
}
