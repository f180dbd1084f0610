//! Event types for inter-service communication.
//!
//! Flows and the session layer never call into presentation code. They
//! publish these events on the event bus and any number of consumers react
//! to them.

use crate::{ErrorMessage, TxData, TxSenderType};
use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all application events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
	/// Progress and outcome of transaction flows.
	TxSender(TxSenderEvent),
	/// Session lifecycle events.
	Auth(AuthEvent),
	/// Requests to reload or reset data after a flow finishes.
	Data(DataEvent),
}

/// Events emitted while a transaction flow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxSenderEvent {
	/// A flow has been started.
	Started { kind: TxSenderType },
	/// The draft has been built and is waiting for validation.
	DraftBuilt { kind: TxSenderType, draft: TxData },
	/// The user is being asked to confirm and sign.
	AwaitingSignature { kind: TxSenderType },
	/// The transaction has been accepted by the node.
	Submitted { kind: TxSenderType, tx_hash: B256 },
	/// A new block was observed while waiting for inclusion.
	NewBlock { kind: TxSenderType, block_number: u64 },
	/// The transaction was mined successfully.
	Mined {
		kind: TxSenderType,
		tx_hash: B256,
		block_number: u64,
	},
	/// The flow ended with an error.
	Failed {
		kind: TxSenderType,
		category: ErrorMessage,
		reason: String,
	},
	/// The flow was cancelled before completion.
	Cancelled { kind: TxSenderType },
	/// The transaction was not included within the configured window.
	TimedOut { kind: TxSenderType, tx_hash: B256 },
}

/// Session lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthEvent {
	/// A token has been stored; `expires_at` is a unix timestamp.
	JwtLoaded { expires_at: i64 },
	/// The user must be logged out.
	Logout,
	/// The application should re-initialise its session state.
	AppInit,
}

/// Follow-up data requests emitted as flow cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataEvent {
	/// Wallet balances should be reloaded.
	RefreshWallet,
	/// A single offering should be reloaded.
	LoadEto { eto_id: Address },
	/// Investor claimable payouts should be reloaded.
	LoadClaimables,
	/// The offering start date form should be reset.
	CleanupStartDate,
	/// The investment form should be reset.
	ResetInvestment,
}
