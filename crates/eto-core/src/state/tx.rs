//! Transaction flow state machine.
//!
//! A flow moves through: Idle -> DraftBuilt -> Validating -> AwaitingSignature
//! -> Submitted -> WatchingForInclusion and ends in Success, Reverted or
//! TimedOut. Cancelled and Failed are reachable from every non-terminal state.

use super::StateError;
use eto_types::TxSenderType;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxFlowState {
	Idle,
	DraftBuilt,
	Validating,
	AwaitingSignature,
	Submitted,
	WatchingForInclusion,
	Success,
	Reverted,
	TimedOut,
	Cancelled,
	Failed,
}

impl TxFlowState {
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			TxFlowState::Success
				| TxFlowState::Reverted
				| TxFlowState::TimedOut
				| TxFlowState::Cancelled
				| TxFlowState::Failed
		)
	}
}

static TRANSITIONS: Lazy<HashMap<TxFlowState, HashSet<TxFlowState>>> = Lazy::new(|| {
	use TxFlowState::*;

	let mut m = HashMap::new();
	m.insert(Idle, HashSet::from([DraftBuilt, Cancelled, Failed]));
	m.insert(DraftBuilt, HashSet::from([Validating, Cancelled, Failed]));
	m.insert(
		Validating,
		HashSet::from([AwaitingSignature, Cancelled, Failed]),
	);
	m.insert(
		AwaitingSignature,
		HashSet::from([Submitted, Cancelled, Failed]),
	);
	m.insert(
		Submitted,
		HashSet::from([WatchingForInclusion, Cancelled, Failed]),
	);
	m.insert(
		WatchingForInclusion,
		HashSet::from([Success, Reverted, TimedOut, Cancelled, Failed]),
	);
	for terminal in [Success, Reverted, TimedOut, Cancelled, Failed] {
		m.insert(terminal, HashSet::new());
	}
	m
});

/// Tracks the state of one flow run.
#[derive(Debug)]
pub struct TxStateMachine {
	kind: TxSenderType,
	state: TxFlowState,
}

impl TxStateMachine {
	pub fn new(kind: TxSenderType) -> Self {
		Self {
			kind,
			state: TxFlowState::Idle,
		}
	}

	pub fn state(&self) -> TxFlowState {
		self.state
	}

	pub fn is_valid_transition(from: TxFlowState, to: TxFlowState) -> bool {
		TRANSITIONS
			.get(&from)
			.is_some_and(|allowed| allowed.contains(&to))
	}

	/// Moves to `to` if the table allows it.
	pub fn transition(&mut self, to: TxFlowState) -> Result<(), StateError> {
		if !Self::is_valid_transition(self.state, to) {
			return Err(StateError::InvalidTxTransition {
				from: self.state,
				to,
			});
		}
		tracing::debug!(kind = %self.kind, from = ?self.state, to = ?to, "Transaction flow transition");
		self.state = to;
		Ok(())
	}
}
