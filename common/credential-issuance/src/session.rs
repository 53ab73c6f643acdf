// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::{IssuanceError, Result};
use std::fmt::Debug;
use tracing::trace;

pub trait SessionState: Copy + Eq + Debug + 'static {
    const MACHINE: &'static str;

    /// States reachable from this one in a single step.
    fn successors(&self) -> &'static [Self];

    fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceState {
    Init,
    CommitmentsBuilt,
    RequestsSent,
    PartialSharesCollected,
    Unblinded,
    Aggregated,
    Randomized,
    Ready,
    Failed,
}

impl SessionState for IssuanceState {
    const MACHINE: &'static str = "issuance";

    fn successors(&self) -> &'static [Self] {
        use IssuanceState::*;

        match self {
            Init => &[CommitmentsBuilt, Failed],
            CommitmentsBuilt => &[RequestsSent, Failed],
            RequestsSent => &[PartialSharesCollected, Failed],
            PartialSharesCollected => &[Unblinded, Failed],
            Unblinded => &[Aggregated, Failed],
            // randomisation is optional
            Aggregated => &[Randomized, Ready],
            Randomized => &[Ready],
            Ready | Failed => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendState {
    Ready,
    ProofBuilt,
    Submitted,
    Verified,
    Rejected,
}

impl SessionState for SpendState {
    const MACHINE: &'static str = "spend";

    fn successors(&self) -> &'static [Self] {
        use SpendState::*;

        match self {
            Ready => &[ProofBuilt, Rejected],
            ProofBuilt => &[Submitted],
            Submitted => &[Verified, Rejected],
            Verified | Rejected => &[],
        }
    }
}

/// Forward-only state machine. A state, once left, is never entered again.
#[derive(Debug, Clone)]
pub struct StateMachine<S> {
    current: S,
    visited: Vec<S>,
}

pub type IssuanceSession = StateMachine<IssuanceState>;
pub type SpendSession = StateMachine<SpendState>;

impl Default for IssuanceSession {
    fn default() -> Self {
        StateMachine::new(IssuanceState::Init)
    }
}

impl Default for SpendSession {
    fn default() -> Self {
        StateMachine::new(SpendState::Ready)
    }
}

impl<S: SessionState> StateMachine<S> {
    pub fn new(initial: S) -> Self {
        StateMachine {
            current: initial,
            visited: vec![initial],
        }
    }

    pub fn state(&self) -> S {
        self.current
    }

    pub fn history(&self) -> &[S] {
        &self.visited
    }

    pub fn is_finished(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn can_advance_to(&self, next: S) -> bool {
        self.current.successors().contains(&next) && !self.visited.contains(&next)
    }

    pub fn advance(&mut self, next: S) -> Result<()> {
        if !self.can_advance_to(next) {
            return Err(IssuanceError::InvalidStateTransition {
                machine: S::MACHINE,
                from: format!("{:?}", self.current),
                to: format!("{next:?}"),
            });
        }
        trace!("{} session: {:?} -> {next:?}", S::MACHINE, self.current);
        self.current = next;
        self.visited.push(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_issuance_path() {
        let mut session = IssuanceSession::default();
        for next in [
            IssuanceState::CommitmentsBuilt,
            IssuanceState::RequestsSent,
            IssuanceState::PartialSharesCollected,
            IssuanceState::Unblinded,
            IssuanceState::Aggregated,
            IssuanceState::Randomized,
            IssuanceState::Ready,
        ] {
            session.advance(next).unwrap();
        }
        assert!(session.is_finished());
        assert_eq!(session.history().len(), 8);
    }

    #[test]
    fn randomisation_can_be_skipped() {
        let mut session = StateMachine::new(IssuanceState::Unblinded);
        session.advance(IssuanceState::Aggregated).unwrap();
        session.advance(IssuanceState::Ready).unwrap();
        assert_eq!(session.state(), IssuanceState::Ready);
    }

    #[test]
    fn states_are_never_reentered() {
        let mut session = IssuanceSession::default();
        session.advance(IssuanceState::CommitmentsBuilt).unwrap();

        assert!(!session.can_advance_to(IssuanceState::Init));
        assert!(!session.can_advance_to(IssuanceState::Aggregated));
        assert!(matches!(
            session.advance(IssuanceState::CommitmentsBuilt),
            Err(IssuanceError::InvalidStateTransition { machine: "issuance", .. })
        ));

        session.advance(IssuanceState::Failed).unwrap();
        assert!(session.is_finished());
        assert!(session.advance(IssuanceState::RequestsSent).is_err());
    }

    #[test]
    fn spend_outcomes_are_final() {
        let mut accepted = SpendSession::default();
        accepted.advance(SpendState::ProofBuilt).unwrap();
        accepted.advance(SpendState::Submitted).unwrap();
        accepted.advance(SpendState::Verified).unwrap();
        assert!(accepted.advance(SpendState::Rejected).is_err());

        let mut rejected = SpendSession::default();
        rejected.advance(SpendState::ProofBuilt).unwrap();
        assert!(rejected.advance(SpendState::Rejected).is_err());
        rejected.advance(SpendState::Submitted).unwrap();
        rejected.advance(SpendState::Rejected).unwrap();
        assert!(rejected.is_finished());
    }
}
