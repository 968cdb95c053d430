//! `§4.1` Test Run State Machine: a pure transition table, independent of how the Runner
//! drives it. Kept separate from `mta-runner` so the invariants in `§8` can be exercised
//! without spinning up any loops.

use mta_contracts::run::{CompletionReason, TestRunStatus};

/// Whether `from -> to` is one of the edges in `§4.1`'s table.
pub fn is_allowed_transition(from: TestRunStatus, to: TestRunStatus) -> bool {
    use TestRunStatus::*;
    match (from, to) {
        (Created, Initializing) => true,
        (Initializing, Coordination) => true,
        (Coordination, Executing) => true,
        (Executing, Completing) => true,
        (from, Cancelled) if from.is_active() => true,
        (from, Completed) if from.is_active() => true,
        (from, Failed) if from.is_active() => true,
        (Completing, Completed) => true,
        (Completing, Failed) => true,
        (Completing, Cancelled) => true,
        _ => false,
    }
}

/// The terminal state a given completion reason drives the run to, validated against the
/// allowed-transition table.
pub fn completion_target(reason: CompletionReason) -> TestRunStatus {
    reason.terminal_status()
}

#[cfg(test)]
mod tests {
    use super::*;
    use TestRunStatus::*;

    #[test]
    fn happy_path_is_allowed() {
        assert!(is_allowed_transition(Created, Initializing));
        assert!(is_allowed_transition(Initializing, Coordination));
        assert!(is_allowed_transition(Coordination, Executing));
    }

    #[test]
    fn any_active_state_can_be_cancelled() {
        for s in [Initializing, Coordination, Executing] {
            assert!(is_allowed_transition(s, Cancelled));
        }
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        for terminal in [Completed, Failed, Cancelled] {
            for to in [Created, Initializing, Coordination, Executing, Completed, Failed, Cancelled] {
                assert!(!is_allowed_transition(terminal, to), "{terminal} -> {to} should be rejected");
            }
        }
    }

    #[test]
    fn skipping_states_is_rejected() {
        assert!(!is_allowed_transition(Created, Executing));
        assert!(!is_allowed_transition(Created, Coordination));
    }

    #[test]
    fn completion_reason_maps_to_expected_terminal_state() {
        assert_eq!(completion_target(CompletionReason::Success), Completed);
        assert_eq!(completion_target(CompletionReason::Timeout), Completed);
        assert_eq!(completion_target(CompletionReason::Error), Failed);
        assert_eq!(completion_target(CompletionReason::AllAgentsFailed), Failed);
        assert_eq!(completion_target(CompletionReason::ManualStop), Cancelled);
    }
}
