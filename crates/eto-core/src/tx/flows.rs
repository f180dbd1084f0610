//! The transaction flows offered by the platform.

use super::flow::{FlowContext, TxFlow};
use super::FlowError;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use async_trait::async_trait;
use eto_config::ContractsConfig;
use eto_types::{DataEvent, TokenType, TxData, TxSenderType};

sol! {
	/// Tokens accepting a transfer with attached data.
	interface IERC223Token {
		function transfer(address to, uint256 amount, bytes data) external returns (bool);
	}

	/// Locks holding legacy commitments.
	interface ILockedAccount {
		function migrate() external;
		function unlock() external;
	}

	/// Commitment contract of an offering.
	interface IEtoCommitment {
		function claim() external;
		function companySignsInvestmentAgreement(string signedInvestmentAgreementUrl) external;
		function setStartDate(address etoTerms, address equityToken, uint256 startDate) external;
	}

	/// Contract paying out proceeds to investors.
	interface IFeeDisbursal {
		function acceptMultipleByToken(address[] assetTokens, address token) external;
		function reject(address token, address proRataToken, uint256 until) external;
	}

	/// Euro token redeemable to a bank account.
	interface IEuroToken {
		function withdraw(uint256 amount) external;
	}
}

fn require_non_zero(amount: U256, what: &str) -> Result<(), FlowError> {
	if amount.is_zero() {
		return Err(FlowError::InvalidDraft(format!("{} must be positive", what)));
	}
	Ok(())
}

/// Sends ether to another address.
pub struct WithdrawFlow {
	pub to: Address,
	pub value: U256,
}

#[async_trait]
impl TxFlow for WithdrawFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::Withdraw
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		if self.to == Address::ZERO {
			return Err(FlowError::InvalidDraft("Recipient is the zero address".into()));
		}
		ctx.draft(self.to, self.value, None).await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::RefreshWallet]
	}
}

/// Commits payment tokens to an offering.
pub struct InvestFlow {
	pub payment_token: Address,
	pub eto_id: Address,
	pub amount: U256,
}

#[async_trait]
impl TxFlow for InvestFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::Invest
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		require_non_zero(self.amount, "Investment amount")?;
		let call = IERC223Token::transferCall {
			to: self.eto_id,
			amount: self.amount,
			data: Bytes::new(),
		};
		ctx.contract_call(self.payment_token, call).await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::ResetInvestment]
	}
}

/// Migrates a legacy commitment out of its lock.
pub struct UpgradeFlow {
	pub token_type: TokenType,
	pub lock: Address,
}

impl UpgradeFlow {
	pub fn new(token_type: TokenType, contracts: &ContractsConfig) -> Self {
		let lock = match token_type {
			TokenType::Ether => contracts.ether_lock,
			TokenType::Euro => contracts.euro_lock,
		};
		Self { token_type, lock }
	}
}

#[async_trait]
impl TxFlow for UpgradeFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::Upgrade
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		ctx.contract_call(self.lock, ILockedAccount::migrateCall {})
			.await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::RefreshWallet]
	}
}

/// Claims equity tokens of a successful offering.
pub struct UserClaimFlow {
	pub eto_id: Address,
}

#[async_trait]
impl TxFlow for UserClaimFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::UserClaim
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		ctx.contract_call(self.eto_id, IEtoCommitment::claimCall {})
			.await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::LoadEto {
			eto_id: self.eto_id,
		}]
	}
}

/// Accepts pending payouts for every listed token.
pub struct InvestorAcceptPayoutFlow {
	pub fee_disbursal: Address,
	pub tokens: Vec<Address>,
	pub pro_rata_token: Address,
}

#[async_trait]
impl TxFlow for InvestorAcceptPayoutFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::InvestorAcceptPayout
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		if self.tokens.is_empty() {
			return Err(FlowError::InvalidDraft("No payouts to accept".into()));
		}
		let call = IFeeDisbursal::acceptMultipleByTokenCall {
			assetTokens: self.tokens.clone(),
			token: self.pro_rata_token,
		};
		ctx.contract_call(self.fee_disbursal, call).await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::LoadClaimables]
	}
}

/// Rejects a payout so it is redistributed to other investors.
pub struct InvestorRedistributePayoutFlow {
	pub fee_disbursal: Address,
	pub token: Address,
	pub pro_rata_token: Address,
	pub until: U256,
}

#[async_trait]
impl TxFlow for InvestorRedistributePayoutFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::InvestorRedistributePayout
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		let call = IFeeDisbursal::rejectCall {
			token: self.token,
			proRataToken: self.pro_rata_token,
			until: self.until,
		};
		ctx.contract_call(self.fee_disbursal, call).await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::LoadClaimables]
	}
}

/// Issuer signs the investment agreement stored at `agreement_url`.
pub struct SignInvestmentAgreementFlow {
	pub eto_id: Address,
	pub agreement_url: String,
}

#[async_trait]
impl TxFlow for SignInvestmentAgreementFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::SignInvestmentAgreement
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		if self.agreement_url.is_empty() {
			return Err(FlowError::InvalidDraft("Agreement url is empty".into()));
		}
		let call = IEtoCommitment::companySignsInvestmentAgreementCall {
			signedInvestmentAgreementUrl: self.agreement_url.clone(),
		};
		ctx.contract_call(self.eto_id, call).await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::LoadEto {
			eto_id: self.eto_id,
		}]
	}
}

/// Issuer schedules the start of an offering.
pub struct EtoSetDateFlow {
	pub eto_id: Address,
	pub eto_terms: Address,
	pub equity_token: Address,
	/// Unix seconds.
	pub start_date: U256,
}

#[async_trait]
impl TxFlow for EtoSetDateFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::EtoSetDate
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		let call = IEtoCommitment::setStartDateCall {
			etoTerms: self.eto_terms,
			equityToken: self.equity_token,
			startDate: self.start_date,
		};
		ctx.contract_call(self.eto_id, call).await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::CleanupStartDate]
	}
}

/// Releases funds held in a lock.
pub struct UnlockFundsFlow {
	pub lock: Address,
}

#[async_trait]
impl TxFlow for UnlockFundsFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::UnlockFunds
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		ctx.contract_call(self.lock, ILockedAccount::unlockCall {})
			.await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::RefreshWallet]
	}
}

/// Redeems euro tokens to the user's bank account.
pub struct NeurRedeemFlow {
	pub euro_token: Address,
	pub amount: U256,
}

#[async_trait]
impl TxFlow for NeurRedeemFlow {
	fn kind(&self) -> TxSenderType {
		TxSenderType::NeurRedeem
	}

	async fn build_draft(&self, ctx: &FlowContext<'_>) -> Result<TxData, FlowError> {
		require_non_zero(self.amount, "Redeem amount")?;
		let call = IEuroToken::withdrawCall {
			amount: self.amount,
		};
		ctx.contract_call(self.euro_token, call).await
	}

	fn cleanup(&self) -> Vec<DataEvent> {
		vec![DataEvent::RefreshWallet]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::sol_types::SolCall;
	use eto_node::implementations::mock::MockTransport;
	use eto_node::NodeAdapter;
	use serde_json::json;
	use std::sync::Arc;

	fn node() -> (Arc<MockTransport>, NodeAdapter) {
		let mock = Arc::new(MockTransport::new());
		mock.respond("eth_gasPrice", Ok(json!("0x3b9aca00")))
			.respond("eth_estimateGas", Ok(json!("0xc350")));
		let adapter = NodeAdapter::new(mock.clone());
		(mock, adapter)
	}

	#[tokio::test]
	async fn test_contract_call_draft() {
		let (mock, node) = node();
		let ctx = FlowContext::new(&node, Address::repeat_byte(1));
		let flow = UserClaimFlow {
			eto_id: Address::repeat_byte(9),
		};

		let draft = flow.build_draft(&ctx).await.unwrap();

		assert_eq!(draft.to, Address::repeat_byte(9));
		assert_eq!(draft.value, U256::ZERO);
		assert_eq!(draft.gas.to::<u64>(), 60_000);
		assert_eq!(draft.nonce, None);
		assert_eq!(
			draft.data.unwrap().as_ref(),
			IEtoCommitment::claimCall::SELECTOR.as_slice()
		);
		let estimate = mock
			.calls()
			.into_iter()
			.find(|c| c.method == "eth_estimateGas")
			.unwrap();
		assert!(estimate.params[0].get("gas").is_none());
	}

	#[tokio::test]
	async fn test_invest_encodes_erc223_transfer() {
		let (_, node) = node();
		let ctx = FlowContext::new(&node, Address::repeat_byte(1));
		let flow = InvestFlow {
			payment_token: Address::repeat_byte(2),
			eto_id: Address::repeat_byte(3),
			amount: U256::from(500),
		};

		let draft = flow.build_draft(&ctx).await.unwrap();

		let decoded = IERC223Token::transferCall::abi_decode(&draft.data.unwrap()).unwrap();
		assert_eq!(decoded.to, Address::repeat_byte(3));
		assert_eq!(decoded.amount, U256::from(500));
		assert_eq!(draft.to, Address::repeat_byte(2));
	}

	#[tokio::test]
	async fn test_invalid_drafts_never_reach_the_node() {
		let (mock, node) = node();
		let ctx = FlowContext::new(&node, Address::repeat_byte(1));

		let redeem = NeurRedeemFlow {
			euro_token: Address::repeat_byte(2),
			amount: U256::ZERO,
		};
		let payout = InvestorAcceptPayoutFlow {
			fee_disbursal: Address::repeat_byte(5),
			tokens: vec![],
			pro_rata_token: Address::repeat_byte(6),
		};

		assert!(matches!(
			redeem.build_draft(&ctx).await,
			Err(FlowError::InvalidDraft(_))
		));
		assert!(matches!(
			payout.build_draft(&ctx).await,
			Err(FlowError::InvalidDraft(_))
		));
		assert!(mock.calls().is_empty());
	}

	#[test]
	fn test_cleanup_events() {
		let eto_id = Address::repeat_byte(7);
		assert_eq!(
			UserClaimFlow { eto_id }.cleanup(),
			vec![DataEvent::LoadEto { eto_id }]
		);
		assert_eq!(
			EtoSetDateFlow {
				eto_id,
				eto_terms: Address::ZERO,
				equity_token: Address::ZERO,
				start_date: U256::ZERO,
			}
			.cleanup(),
			vec![DataEvent::CleanupStartDate]
		);
		assert_eq!(
			UnlockFundsFlow { lock: eto_id }.cleanup(),
			vec![DataEvent::RefreshWallet]
		);
	}
}
