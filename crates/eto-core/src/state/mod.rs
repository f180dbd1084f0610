//! State machines for transaction flows and the session token.
//!
//! Both machines validate every transition against a static table and reject
//! anything else, so a flow or session can never skip a step silently.

pub mod auth;
pub mod tx;

pub use auth::{AuthState, AuthStateMachine};
pub use tx::{TxFlowState, TxStateMachine};

use thiserror::Error;

/// Errors raised by the state machines.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
	#[error("Invalid transaction flow transition from {from:?} to {to:?}")]
	InvalidTxTransition { from: TxFlowState, to: TxFlowState },
	#[error("Invalid session transition from {from:?} to {to:?}")]
	InvalidAuthTransition { from: AuthState, to: AuthState },
}
