//! # Auth Attempt Phases
//!
//! RECEIVED → PARSED → PROOF_REQUESTED → PROOF_READY → PACKED → DONE
//!
//! ERRORED is reachable from every non-terminal phase. DONE and ERRORED are
//! terminal: an attempt runs once and is never resumed.

use std::fmt;

use crate::error::AuthError;

/// Phase of one authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthPhase {
    /// Envelope bytes received.
    Received,
    /// Unpacked and validated as an auth request.
    Parsed,
    /// Circuit queries built from the request.
    ProofRequested,
    /// Every requested proof generated.
    ProofReady,
    /// Response packed into a proof-carrying envelope.
    Packed,
    /// Response handed back (terminal).
    Done,
    /// Attempt failed (terminal).
    Errored,
}

impl AuthPhase {
    /// Canonical phase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Parsed => "PARSED",
            Self::ProofRequested => "PROOF_REQUESTED",
            Self::ProofReady => "PROOF_READY",
            Self::Packed => "PACKED",
            Self::Done => "DONE",
            Self::Errored => "ERRORED",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }

    /// Whether `self -> to` is an edge of the state machine.
    pub fn can_transition_to(&self, to: AuthPhase) -> bool {
        use AuthPhase::*;
        match (self, to) {
            (from, Errored) => !from.is_terminal(),
            (Received, Parsed)
            | (Parsed, ProofRequested)
            | (ProofRequested, ProofReady)
            | (ProofReady, Packed)
            | (Packed, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime-checked phase with its transition log.
#[derive(Debug, Clone)]
pub(crate) struct PhaseTracker {
    phase: AuthPhase,
    log: Vec<AuthPhase>,
}

impl PhaseTracker {
    pub(crate) fn new() -> Self {
        Self {
            phase: AuthPhase::Received,
            log: vec![AuthPhase::Received],
        }
    }

    pub(crate) fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub(crate) fn log(&self) -> &[AuthPhase] {
        &self.log
    }

    pub(crate) fn advance(&mut self, to: AuthPhase) -> Result<(), AuthError> {
        if !self.phase.can_transition_to(to) {
            return Err(AuthError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!(from = %self.phase, to = %to, "auth transition");
        self.phase = to;
        self.log.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_edges() {
        let mut t = PhaseTracker::new();
        for p in [
            AuthPhase::Parsed,
            AuthPhase::ProofRequested,
            AuthPhase::ProofReady,
            AuthPhase::Packed,
            AuthPhase::Done,
        ] {
            t.advance(p).unwrap();
        }
        assert!(t.phase().is_terminal());
        assert_eq!(t.log().len(), 6);
        assert!(matches!(
            t.advance(AuthPhase::Errored),
            Err(AuthError::InvalidTransition { from: AuthPhase::Done, .. })
        ));
    }

    #[test]
    fn no_skipping_or_going_back() {
        let mut t = PhaseTracker::new();
        assert!(t.advance(AuthPhase::ProofReady).is_err());
        t.advance(AuthPhase::Parsed).unwrap();
        assert!(t.advance(AuthPhase::Received).is_err());
        t.advance(AuthPhase::Errored).unwrap();
        assert!(t.advance(AuthPhase::ProofRequested).is_err());
        assert_eq!(t.phase(), AuthPhase::Errored);
    }

    #[test]
    fn names() {
        assert_eq!(AuthPhase::ProofRequested.to_string(), "PROOF_REQUESTED");
        assert!(!AuthPhase::Packed.is_terminal());
    }
}
