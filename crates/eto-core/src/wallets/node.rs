//! Wallet whose account is managed by the node itself.
//!
//! This is how injected browser wallets behave: the node (or the extension in
//! front of it) holds the key, signs on request and signs transactions sent
//! with `eth_sendTransaction`.

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use eto_account::{SignedTransaction, SignerType, TypedDataField, WalletError, WalletInterface};
use eto_node::{NodeAdapter, NodeError};
use eto_types::{ConfigSchema, Field, FieldType, Schema, TxData, ValidationError};
use std::sync::Arc;

/// Error code wallets return when the user rejects a request.
const USER_REJECTED_REQUEST: i64 = 4001;

pub struct NodeWallet {
	adapter: Arc<NodeAdapter>,
	address: Address,
	signer_type: SignerType,
}

impl NodeWallet {
	/// Binds to the first account the node manages.
	pub async fn connect(
		adapter: Arc<NodeAdapter>,
		signer_type: SignerType,
	) -> Result<Self, WalletError> {
		let address = adapter
			.get_account_address()
			.await
			.map_err(|e| match e {
				NodeError::NoAccounts => WalletError::Unavailable,
				other => map_node_error(other),
			})?;
		tracing::info!(%address, %signer_type, "Connected node managed wallet");
		Ok(Self {
			adapter,
			address,
			signer_type,
		})
	}
}

fn map_node_error(error: NodeError) -> WalletError {
	match error {
		NodeError::Rpc { code, .. } if code == USER_REJECTED_REQUEST => {
			WalletError::SignerRejectConfirmation
		},
		other => WalletError::SigningFailed(other.to_string()),
	}
}

#[async_trait]
impl WalletInterface for NodeWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NodeWalletSchema)
	}

	fn signer_type(&self) -> SignerType {
		self.signer_type
	}

	async fn address(&self) -> Result<Address, WalletError> {
		Ok(self.address)
	}

	async fn sign_message(&self, message: &str) -> Result<Bytes, WalletError> {
		match self.signer_type {
			SignerType::EthSign => self
				.adapter
				.eth_sign(self.address, &Bytes::copy_from_slice(message.as_bytes()))
				.await
				.map_err(map_node_error),
			SignerType::EthSignTypedData => {
				self.sign_typed_data(&TypedDataField::challenge(message))
					.await
			},
		}
	}

	async fn sign_typed_data(&self, data: &[TypedDataField]) -> Result<Bytes, WalletError> {
		let data =
			serde_json::to_value(data).map_err(|e| WalletError::SigningFailed(e.to_string()))?;
		self.adapter
			.sign_typed_data(self.address, data)
			.await
			.map_err(map_node_error)
	}

	async fn sign_transaction(
		&self,
		tx: &TxData,
		_chain_id: u64,
	) -> Result<SignedTransaction, WalletError> {
		if tx.from != self.address {
			return Err(WalletError::SigningFailed(format!(
				"Draft sender {} does not match wallet {}",
				tx.from, self.address
			)));
		}
		Ok(SignedTransaction::NodeManaged(tx.clone()))
	}
}

/// Configuration schema for the node wallet.
pub struct NodeWalletSchema;

impl ConfigSchema for NodeWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("signer_type", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some("eth_sign") | Some("eth_signTypedData") => Ok(()),
					_ => Err("signer_type must be eth_sign or eth_signTypedData".into()),
				}
			})],
		);
		schema.validate(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use eto_node::implementations::mock::MockTransport;
	use serde_json::json;

	const ACCOUNT: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

	fn node() -> (Arc<MockTransport>, Arc<NodeAdapter>) {
		let mock = Arc::new(MockTransport::new());
		mock.respond("eth_accounts", Ok(json!([ACCOUNT])));
		let adapter = Arc::new(NodeAdapter::new(mock.clone()));
		(mock, adapter)
	}

	#[tokio::test]
	async fn test_eth_sign_challenge() {
		let (mock, adapter) = node();
		mock.respond("eth_sign", Ok(json!("0xabcd")));
		let wallet = NodeWallet::connect(adapter, SignerType::EthSign)
			.await
			.unwrap();

		let signature = wallet.sign_message("hi").await.unwrap();

		assert_eq!(signature, Bytes::from_static(&[0xab, 0xcd]));
		let call = mock
			.calls()
			.into_iter()
			.find(|c| c.method == "eth_sign")
			.unwrap();
		assert_eq!(call.params, vec![json!(ACCOUNT), json!("0x6869")]);
	}

	#[tokio::test]
	async fn test_typed_data_challenge() {
		let (mock, adapter) = node();
		mock.respond("eth_signTypedData", Ok(json!("0x01")));
		let wallet = NodeWallet::connect(adapter, SignerType::EthSignTypedData)
			.await
			.unwrap();

		wallet.sign_message("challenge").await.unwrap();

		let call = mock
			.calls()
			.into_iter()
			.find(|c| c.method == "eth_signTypedData")
			.unwrap();
		assert_eq!(
			call.params[0],
			json!([{"type": "string", "name": "sign message", "value": "challenge"}])
		);
	}

	#[tokio::test]
	async fn test_user_rejection_is_mapped() {
		let (mock, adapter) = node();
		mock.respond(
			"eth_signTypedData",
			Err(NodeError::Rpc {
				code: USER_REJECTED_REQUEST,
				message: "User denied message signature".into(),
			}),
		);
		let wallet = NodeWallet::connect(adapter, SignerType::EthSignTypedData)
			.await
			.unwrap();

		assert_eq!(
			wallet.sign_message("challenge").await,
			Err(WalletError::SignerRejectConfirmation)
		);
	}

	#[tokio::test]
	async fn test_no_accounts_means_unavailable() {
		let mock = Arc::new(MockTransport::new());
		mock.respond("eth_accounts", Ok(json!([])));
		let adapter = Arc::new(NodeAdapter::new(mock));

		assert_eq!(
			NodeWallet::connect(adapter, SignerType::EthSign)
				.await
				.err(),
			Some(WalletError::Unavailable)
		);
	}

	#[test]
	fn test_schema_checks_signer_type() {
		let table = |src: &str| toml::Value::Table(toml::from_str::<toml::Table>(src).unwrap());

		assert!(NodeWalletSchema.validate(&table("")).is_ok());
		assert!(NodeWalletSchema
			.validate(&table("signer_type = \"eth_signTypedData\""))
			.is_ok());
		assert!(NodeWalletSchema
			.validate(&table("signer_type = \"personal_sign\""))
			.is_err());
	}
}
