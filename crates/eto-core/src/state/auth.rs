//! Session token state machine.
//!
//! Obtaining a token: NoToken -> ChallengeRequested -> ChallengeSigned ->
//! TokenIssued -> Valid. Escalation re-enters the challenge round from Valid,
//! refresh goes Valid -> Expiring -> Refreshing -> Valid, and a late refresh
//! timer or a failed refresh ends in Expired. Any state may move to LoggedOut. A failed challenge
//! round falls back to the state it started from (NoToken or Valid).

use super::StateError;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
	NoToken,
	ChallengeRequested,
	ChallengeSigned,
	TokenIssued,
	Valid,
	Escalating,
	Expiring,
	Refreshing,
	Expired,
	LoggedOut,
}

static TRANSITIONS: Lazy<HashMap<AuthState, HashSet<AuthState>>> = Lazy::new(|| {
	use AuthState::*;

	let mut m = HashMap::new();
	m.insert(NoToken, HashSet::from([ChallengeRequested, Valid]));
	m.insert(
		ChallengeRequested,
		HashSet::from([ChallengeSigned, NoToken, Valid]),
	);
	m.insert(ChallengeSigned, HashSet::from([TokenIssued, NoToken, Valid]));
	m.insert(TokenIssued, HashSet::from([Valid, NoToken]));
	m.insert(
		Valid,
		HashSet::from([Escalating, Expiring, ChallengeRequested, Valid]),
	);
	m.insert(Escalating, HashSet::from([ChallengeRequested, Valid]));
	m.insert(Expiring, HashSet::from([Refreshing, Expired]));
	m.insert(Refreshing, HashSet::from([Valid, Expired]));
	m.insert(Expired, HashSet::new());
	m.insert(LoggedOut, HashSet::from([NoToken, ChallengeRequested, Valid]));

	for set in m.values_mut() {
		set.insert(LoggedOut);
	}
	m
});

/// Tracks the session state behind a lock shared by all session operations.
#[derive(Debug)]
pub struct AuthStateMachine {
	state: Mutex<AuthState>,
}

impl Default for AuthStateMachine {
	fn default() -> Self {
		Self {
			state: Mutex::new(AuthState::NoToken),
		}
	}
}

impl AuthStateMachine {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn state(&self) -> AuthState {
		*self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn is_valid_transition(from: AuthState, to: AuthState) -> bool {
		TRANSITIONS
			.get(&from)
			.is_some_and(|allowed| allowed.contains(&to))
	}

	/// Moves to `to` if the table allows it.
	pub fn transition(&self, to: AuthState) -> Result<(), StateError> {
		let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
		if !Self::is_valid_transition(*state, to) {
			return Err(StateError::InvalidAuthTransition { from: *state, to });
		}
		tracing::debug!(from = ?*state, to = ?to, "Session transition");
		*state = to;
		Ok(())
	}

	/// Ends a failed challenge round in the state it started from.
	pub(crate) fn abort_round(&self, has_token: bool) {
		let fallback = if has_token {
			AuthState::Valid
		} else {
			AuthState::NoToken
		};
		let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
		if Self::is_valid_transition(*state, fallback) {
			*state = fallback;
		}
	}
}
