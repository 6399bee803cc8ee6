//! Phase sequencer state machine.
//!
//! A workflow is an ordered list of phases. Each phase walks
//! `NotStarted -> Previewing -> AwaitingApproval -> Executing -> Verifying
//! -> Complete`; rejection at the gate ends the phase in `Skipped`, and
//! execution or verification failure ends it in `Failed`. A later phase may
//! not begin until every earlier phase is terminal and none has failed.

use std::fmt;

use crate::error::OkeupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    NotStarted,
    Previewing,
    AwaitingApproval,
    Executing,
    Verifying,
    Complete,
    /// Terminal: the gate rejected every instance, or the phase had nothing
    /// to do.
    Skipped,
    Failed,
}

impl PhaseState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PhaseState::Complete | PhaseState::Skipped | PhaseState::Failed
        )
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseState::NotStarted => "NOT_STARTED",
            PhaseState::Previewing => "PREVIEWING",
            PhaseState::AwaitingApproval => "AWAITING_APPROVAL",
            PhaseState::Executing => "EXECUTING",
            PhaseState::Verifying => "VERIFYING",
            PhaseState::Complete => "COMPLETE",
            PhaseState::Skipped => "SKIPPED",
            PhaseState::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Legal state transitions for a single phase.
pub fn legal_transition(from: PhaseState, to: PhaseState) -> bool {
    use PhaseState::*;
    matches!(
        (from, to),
        (NotStarted, Previewing)
            // A phase with nothing to do is skipped without entering the gate.
            | (NotStarted, Skipped)
            | (Previewing, AwaitingApproval)
            // Read-only phases need no approval.
            | (Previewing, Executing)
            | (AwaitingApproval, Executing)
            | (AwaitingApproval, Skipped)
            | (Executing, Verifying)
            // Synchronous or read-only work yields no work request to verify.
            | (Executing, Complete)
            | (Executing, Failed)
            | (Verifying, Complete)
            | (Verifying, Failed)
    )
}

#[derive(Debug, Clone)]
pub struct Phase {
    pub name: &'static str,
    pub state: PhaseState,
    /// Work requests issued while this phase was executing.
    pub work_requests: Vec<String>,
}

impl Phase {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            state: PhaseState::NotStarted,
            work_requests: Vec::new(),
        }
    }
}

/// One orchestrated run. In-memory only; not persisted across restarts.
#[derive(Debug)]
pub struct Workflow {
    phases: Vec<Phase>,
}

impl Workflow {
    pub fn new(phase_names: &[&'static str]) -> Self {
        Self {
            phases: phase_names.iter().map(|n| Phase::new(n)).collect(),
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> &Phase {
        &self.phases[index]
    }

    /// Enter a phase. Fails unless every earlier phase is terminal and none
    /// has failed. The phase precondition against external state is the
    /// caller's job; this only enforces ordering.
    pub fn begin(&mut self, index: usize) -> Result<(), OkeupError> {
        for earlier in &self.phases[..index] {
            if earlier.state == PhaseState::Failed {
                return Err(OkeupError::PhaseOrder(format!(
                    "phase '{}' failed; not advancing to '{}'",
                    earlier.name, self.phases[index].name
                )));
            }
            if !earlier.state.is_terminal() {
                return Err(OkeupError::PhaseOrder(format!(
                    "phase '{}' is {} but '{}' was asked to start",
                    earlier.name, earlier.state, self.phases[index].name
                )));
            }
        }
        self.transition(index, PhaseState::Previewing)
    }

    /// Move a phase to a new state, validating the edge.
    pub fn transition(&mut self, index: usize, to: PhaseState) -> Result<(), OkeupError> {
        let phase = &mut self.phases[index];
        if !legal_transition(phase.state, to) {
            return Err(OkeupError::PhaseOrder(format!(
                "phase '{}': illegal transition {} -> {}",
                phase.name, phase.state, to
            )));
        }
        tracing::debug!(phase = phase.name, from = %phase.state, to = %to, "phase transition");
        phase.state = to;
        Ok(())
    }

    pub fn record_work_request(&mut self, index: usize, work_request_id: impl Into<String>) {
        self.phases[index].work_requests.push(work_request_id.into());
    }

    /// All work request ids issued across the whole run, in phase order.
    pub fn work_requests(&self) -> Vec<String> {
        self.phases
            .iter()
            .flat_map(|p| p.work_requests.iter().cloned())
            .collect()
    }

    /// Complete only when every phase reached `Complete`.
    pub fn is_complete(&self) -> bool {
        self.phases.iter().all(|p| p.state == PhaseState::Complete)
    }

    /// True when any phase failed; progression past it is forbidden.
    pub fn is_halted(&self) -> bool {
        self.phases.iter().any(|p| p.state == PhaseState::Failed)
    }
}
