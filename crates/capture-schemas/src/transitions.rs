//! Pure-Rust description of the session transition graph.
//!
//! This table is **descriptive, not authoritative**: the Postgres trigger
//! installed by `capture-db`'s migrations is what actually protects the
//! invariant under concurrent writers. This copy exists so the repository
//! layer can short-circuit an illegal transition without a round trip, and
//! so unit tests can exercise the graph without a database.

use crate::SessionState;

/// Returns `true` if `from -> to` is a permitted transition.
///
/// Self-transitions are always legal (no-ops). All other pairs must appear
/// in the directed graph from `spec.md` §3:
/// `Open -> {Closed, Failed}`, `Closed -> {Processing, Failed}`,
/// `Processing -> {Done, Failed}`.
pub fn is_legal(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;

    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (Open, Closed)
            | (Open, Failed)
            | (Closed, Processing)
            | (Closed, Failed)
            | (Processing, Done)
            | (Processing, Failed)
    )
}

/// Whether leaving `from` for `to` should stamp `closed_at` (any exit from
/// `Open`, per the invariant `closed_at IS NULL <=> state = Open`).
pub fn stamps_closed_at(from: SessionState, to: SessionState) -> bool {
    from == SessionState::Open && to != SessionState::Open
}

/// Whether leaving `from` for `to` should clear `error` (any exit from
/// `Failed`, per the invariant `error IS NOT NULL <=> state = Failed`).
pub fn clears_error(from: SessionState, to: SessionState) -> bool {
    from == SessionState::Failed && to != SessionState::Failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn self_transitions_are_always_legal() {
        for s in [Open, Closed, Processing, Done, Failed] {
            assert!(is_legal(s, s), "{s:?} -> {s:?} must be a legal no-op");
        }
    }

    #[test]
    fn open_can_close_or_fail() {
        assert!(is_legal(Open, Closed));
        assert!(is_legal(Open, Failed));
        assert!(!is_legal(Open, Processing));
        assert!(!is_legal(Open, Done));
    }

    #[test]
    fn closed_can_process_or_fail() {
        assert!(is_legal(Closed, Processing));
        assert!(is_legal(Closed, Failed));
        assert!(!is_legal(Closed, Open));
        assert!(!is_legal(Closed, Done));
    }

    #[test]
    fn processing_can_finish_or_fail() {
        assert!(is_legal(Processing, Done));
        assert!(is_legal(Processing, Failed));
        assert!(!is_legal(Processing, Open));
        assert!(!is_legal(Processing, Closed));
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for terminal in [Done, Failed] {
            for to in [Open, Closed, Processing, Done] {
                if terminal == to {
                    continue;
                }
                if terminal == Failed {
                    // Failed -> Failed is the only self no-op; everything
                    // else out of Failed is illegal per the graph (Failed
                    // is terminal: nothing transitions OUT of it).
                    assert!(!is_legal(Failed, to));
                } else {
                    assert!(!is_legal(Done, to));
                }
            }
        }
    }

    #[test]
    fn exiting_open_stamps_closed_at() {
        assert!(stamps_closed_at(Open, Closed));
        assert!(stamps_closed_at(Open, Failed));
        assert!(!stamps_closed_at(Closed, Processing));
    }

    #[test]
    fn exiting_failed_clears_error() {
        assert!(clears_error(Failed, Closed));
        assert!(clears_error(Failed, Processing));
        assert!(!clears_error(Failed, Failed), "self-transition is a no-op");
        assert!(!clears_error(Open, Closed));
    }
}
