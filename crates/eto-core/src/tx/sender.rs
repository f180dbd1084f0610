//! Drives a flow from draft to mined transaction.

use super::flow::{FlowContext, TxFlow};
use super::FlowError;
use crate::event_bus::EventBus;
use crate::state::{TxFlowState, TxStateMachine};
use alloy::primitives::U64;
use async_trait::async_trait;
use eto_account::{SignedTransaction, WalletError, WalletManager};
use eto_node::{NodeAdapter, NodeError};
use eto_types::{AppEvent, Transaction, TxData, TxSenderEvent, TxSenderType};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Asks the user to confirm a draft before it is signed.
#[async_trait]
pub trait SignaturePrompt: Send + Sync {
	/// Dismissing the prompt must be reported as
	/// [`WalletError::MessageSignCancelled`].
	async fn confirm(&self, kind: TxSenderType, draft: &TxData) -> Result<(), WalletError>;
}

/// Confirms every draft without asking.
pub struct AutoConfirm;

#[async_trait]
impl SignaturePrompt for AutoConfirm {
	async fn confirm(&self, kind: TxSenderType, _draft: &TxData) -> Result<(), WalletError> {
		tracing::debug!(%kind, "Draft confirmed without prompt");
		Ok(())
	}
}

/// How a flow run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
	Mined(Transaction),
	Cancelled,
	Failed(FlowError),
}

pub struct TxSender {
	node: Arc<NodeAdapter>,
	wallets: Arc<WalletManager>,
	event_bus: EventBus,
	prompt: Arc<dyn SignaturePrompt>,
	chain_id: u64,
	inclusion_timeout: Option<Duration>,
}

impl TxSender {
	pub fn new(
		node: Arc<NodeAdapter>,
		wallets: Arc<WalletManager>,
		event_bus: EventBus,
		prompt: Arc<dyn SignaturePrompt>,
		chain_id: u64,
	) -> Self {
		Self {
			node,
			wallets,
			event_bus,
			prompt,
			chain_id,
			inclusion_timeout: None,
		}
	}

	/// Gives up waiting for inclusion after `timeout`.
	pub fn with_inclusion_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.inclusion_timeout = timeout;
		self
	}

	/// Runs `flow` and returns the mined transaction.
	pub async fn send(
		&self,
		flow: &dyn TxFlow,
		cancel: &CancellationToken,
	) -> Result<Transaction, FlowError> {
		let mut machine = TxStateMachine::new(flow.kind());
		self.drive(flow, cancel, &mut machine).await
	}

	/// Runs `flow` to completion, reports the outcome on the event bus and
	/// publishes the flow's cleanup events on every path.
	#[instrument(skip_all, fields(kind = %flow.kind()))]
	pub async fn run(&self, flow: &dyn TxFlow, cancel: &CancellationToken) -> FlowOutcome {
		let kind = flow.kind();
		let mut machine = TxStateMachine::new(kind);

		let outcome = match self.drive(flow, cancel, &mut machine).await {
			Ok(tx) => {
				info!("Transaction flow successful");
				FlowOutcome::Mined(tx)
			},
			Err(e) if e.is_cancellation() => {
				info!(reason = %e, "Transaction flow cancelled");
				machine.transition(TxFlowState::Cancelled).ok();
				self.publish(TxSenderEvent::Cancelled { kind });
				FlowOutcome::Cancelled
			},
			Err(e) => {
				error!(error = %e, state = ?machine.state(), "Transaction flow failed");
				let terminal = match &e {
					FlowError::Node(NodeError::OutOfGas | NodeError::RevertedTransaction) => {
						TxFlowState::Reverted
					},
					FlowError::TimedOut { .. } => TxFlowState::TimedOut,
					_ => TxFlowState::Failed,
				};
				if machine.transition(terminal).is_err() {
					machine.transition(TxFlowState::Failed).ok();
				}
				if let FlowError::TimedOut { tx_hash } = &e {
					self.publish(TxSenderEvent::TimedOut {
						kind,
						tx_hash: *tx_hash,
					});
				}
				self.publish(TxSenderEvent::Failed {
					kind,
					category: e.category(),
					reason: e.to_string(),
				});
				FlowOutcome::Failed(e)
			},
		};

		for event in flow.cleanup() {
			self.event_bus.publish(AppEvent::Data(event)).ok();
		}
		outcome
	}

	async fn drive(
		&self,
		flow: &dyn TxFlow,
		cancel: &CancellationToken,
		machine: &mut TxStateMachine,
	) -> Result<Transaction, FlowError> {
		let kind = flow.kind();
		self.publish(TxSenderEvent::Started { kind });

		let wallet = self.wallets.personal_wallet().await?;
		let from = wallet.address().await?;
		let ctx = FlowContext::new(&self.node, from);

		let mut draft = cancellable(cancel, flow.build_draft(&ctx)).await?;
		machine.transition(TxFlowState::DraftBuilt)?;
		self.publish(TxSenderEvent::DraftBuilt {
			kind,
			draft: draft.clone(),
		});

		machine.transition(TxFlowState::Validating)?;
		cancellable(cancel, flow.validate(&ctx, &draft)).await?;

		machine.transition(TxFlowState::AwaitingSignature)?;
		self.publish(TxSenderEvent::AwaitingSignature { kind });
		cancellable(cancel, async {
			self.prompt.confirm(kind, &draft).await.map_err(FlowError::from)
		})
		.await?;

		if draft.nonce.is_none() {
			draft.nonce = Some(U64::from(self.node.get_transaction_count(from).await?));
		}
		let signed = cancellable(cancel, async {
			wallet
				.sign_transaction(&draft, self.chain_id)
				.await
				.map_err(FlowError::from)
		})
		.await?;

		let tx_hash = match signed {
			SignedTransaction::Raw(raw) => self.node.send_raw_transaction(&raw).await?,
			SignedTransaction::NodeManaged(tx) => self.node.send_transaction(tx).await?,
		};
		machine.transition(TxFlowState::Submitted)?;
		info!(%tx_hash, "Transaction submitted");
		self.publish(TxSenderEvent::Submitted { kind, tx_hash });

		machine.transition(TxFlowState::WatchingForInclusion)?;
		let watch = self.node.wait_for_tx(tx_hash, cancel, |block_number| {
			self.publish(TxSenderEvent::NewBlock { kind, block_number });
			std::future::ready(())
		});
		let mined = match self.inclusion_timeout {
			Some(limit) => tokio::time::timeout(limit, watch)
				.await
				.map_err(|_| FlowError::TimedOut { tx_hash })??,
			None => watch.await?,
		};

		machine.transition(TxFlowState::Success)?;
		self.publish(TxSenderEvent::Mined {
			kind,
			tx_hash,
			block_number: mined
				.block_number
				.map(|block| block.to::<u64>())
				.unwrap_or_default(),
		});
		Ok(mined)
	}

	fn publish(&self, event: TxSenderEvent) {
		self.event_bus.publish(AppEvent::TxSender(event)).ok();
	}
}

async fn cancellable<T>(
	cancel: &CancellationToken,
	work: impl Future<Output = Result<T, FlowError>>,
) -> Result<T, FlowError> {
	tokio::select! {
		_ = cancel.cancelled() => Err(FlowError::Cancelled),
		result = work => result,
	}
}
