//! Allowed bridge status transitions.

use crelink_types::BridgeStatus;

/// Whether a transfer may move from `from` to `to`.
///
/// Terminal statuses never change. Re-reporting the current status is
/// allowed and treated as a no-op by callers.
pub fn can_transition(from: BridgeStatus, to: BridgeStatus) -> bool {
	use BridgeStatus::*;

	if from == to {
		return true;
	}
	match from {
		Created => matches!(to, Submitted | Failed | Cancelled),
		Submitted => matches!(to, Relaying | Claimable | Completed | Failed),
		Relaying => matches!(to, Claimable | Completed | Failed),
		Claimable => matches!(to, Completed | Failed),
		Completed | Failed | Cancelled => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use BridgeStatus::*;

	#[test]
	fn test_forward_transitions() {
		assert!(can_transition(Created, Submitted));
		assert!(can_transition(Submitted, Relaying));
		assert!(can_transition(Submitted, Completed));
		assert!(can_transition(Relaying, Claimable));
		assert!(can_transition(Claimable, Completed));
		assert!(can_transition(Relaying, Failed));
	}

	#[test]
	fn test_no_backward_transitions() {
		assert!(!can_transition(Relaying, Submitted));
		assert!(!can_transition(Claimable, Relaying));
		assert!(!can_transition(Submitted, Created));
	}

	#[test]
	fn test_cancel_only_before_submission() {
		assert!(can_transition(Created, Cancelled));
		assert!(!can_transition(Submitted, Cancelled));
		assert!(!can_transition(Claimable, Cancelled));
	}

	#[test]
	fn test_terminal_statuses_are_final() {
		for terminal in [Completed, Failed, Cancelled] {
			for next in [Created, Submitted, Relaying, Claimable] {
				assert!(!can_transition(terminal, next));
			}
		}
		assert!(!can_transition(Completed, Failed));
		assert!(!can_transition(Failed, Completed));
	}

	#[test]
	fn test_same_status_is_allowed() {
		assert!(can_transition(Relaying, Relaying));
		assert!(can_transition(Completed, Completed));
	}
}
