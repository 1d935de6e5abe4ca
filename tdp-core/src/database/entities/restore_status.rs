use serde::{Deserialize, Serialize};

use crate::errors::BackupError;

/// Lifecycle of a restore task
///
/// `pending → processing → {completed | failed | cancelled}`. Terminal states
/// are final; a pending task can also be cancelled or failed before it starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RestoreStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreStatus::Pending => "pending",
            RestoreStatus::Processing => "processing",
            RestoreStatus::Completed => "completed",
            RestoreStatus::Failed => "failed",
            RestoreStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RestoreStatus::Pending),
            "processing" => Some(RestoreStatus::Processing),
            "completed" => Some(RestoreStatus::Completed),
            "failed" => Some(RestoreStatus::Failed),
            "cancelled" => Some(RestoreStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RestoreStatus::Completed | RestoreStatus::Failed | RestoreStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: RestoreStatus) -> bool {
        match self {
            RestoreStatus::Pending => matches!(
                next,
                RestoreStatus::Processing | RestoreStatus::Failed | RestoreStatus::Cancelled
            ),
            RestoreStatus::Processing => matches!(
                next,
                RestoreStatus::Processing
                    | RestoreStatus::Completed
                    | RestoreStatus::Failed
                    | RestoreStatus::Cancelled
            ),
            _ => false,
        }
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: RestoreStatus) -> Result<RestoreStatus, BackupError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(BackupError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion() {
        assert_eq!(RestoreStatus::Processing.as_str(), "processing");
        assert_eq!(
            RestoreStatus::from_str("cancelled"),
            Some(RestoreStatus::Cancelled)
        );
        assert_eq!(RestoreStatus::from_str("error"), None);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [
            RestoreStatus::Completed,
            RestoreStatus::Failed,
            RestoreStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                RestoreStatus::Pending,
                RestoreStatus::Processing,
                RestoreStatus::Completed,
                RestoreStatus::Failed,
                RestoreStatus::Cancelled,
            ] {
                assert!(terminal.transition(next).is_err());
            }
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(RestoreStatus::Pending
            .transition(RestoreStatus::Processing)
            .is_ok());
        assert!(RestoreStatus::Processing
            .transition(RestoreStatus::Processing)
            .is_ok());
        assert!(RestoreStatus::Processing
            .transition(RestoreStatus::Completed)
            .is_ok());
        assert!(RestoreStatus::Pending
            .transition(RestoreStatus::Completed)
            .is_err());
    }
}
