//! Wallet holding a private key in process memory.
//!
//! Signs challenges as EIP-191 personal messages and transactions as legacy
//! EIP-155 transactions, producing raw bytes for `eth_sendRawTransaction`.

use crate::typed_data::typed_data_hash;
use crate::{
	SignedTransaction, SignerType, TypedDataField, WalletError, WalletFactory, WalletInterface,
	WalletRegistry,
};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::{local::PrivateKeySigner, Signer};
use async_trait::async_trait;
use eto_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString, TxData,
	ValidationError,
};

/// Local wallet implementation backed by a [`PrivateKeySigner`].
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a wallet from a hex private key, with or without `0x`.
	pub fn from_private_key(private_key: &str) -> Result<Self, WalletError> {
		let signer = private_key
			.trim_start_matches("0x")
			.parse::<PrivateKeySigner>()
			.map_err(|e| WalletError::InvalidKey(e.to_string()))?;
		Ok(Self { signer })
	}
}

#[async_trait]
impl WalletInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	fn signer_type(&self) -> SignerType {
		SignerType::EthSign
	}

	async fn address(&self) -> Result<Address, WalletError> {
		Ok(self.signer.address())
	}

	async fn sign_message(&self, message: &str) -> Result<Bytes, WalletError> {
		let signature = self
			.signer
			.sign_message(message.as_bytes())
			.await
			.map_err(|e| WalletError::SigningFailed(e.to_string()))?;
		Ok(Bytes::from(signature.as_bytes().to_vec()))
	}

	async fn sign_typed_data(&self, data: &[TypedDataField]) -> Result<Bytes, WalletError> {
		let hash = typed_data_hash(data)?;
		let signature = self
			.signer
			.sign_hash(&hash)
			.await
			.map_err(|e| WalletError::SigningFailed(e.to_string()))?;
		Ok(Bytes::from(signature.as_bytes().to_vec()))
	}

	async fn sign_transaction(
		&self,
		tx: &TxData,
		chain_id: u64,
	) -> Result<SignedTransaction, WalletError> {
		if tx.from != self.signer.address() {
			return Err(WalletError::SigningFailed(format!(
				"Draft sender {} does not match wallet {}",
				tx.from,
				self.signer.address()
			)));
		}
		let nonce = tx
			.nonce
			.ok_or_else(|| WalletError::SigningFailed("Draft has no nonce".into()))?;

		let request = TransactionRequest::default()
			.with_from(tx.from)
			.with_to(tx.to)
			.with_value(tx.value)
			.with_input(tx.data.clone().unwrap_or_default())
			.with_nonce(nonce.to::<u64>())
			.with_gas_limit(tx.gas.to::<u64>())
			.with_gas_price(tx.gas_price.saturating_to::<u128>())
			.with_chain_id(chain_id);

		let wallet = EthereumWallet::from(self.signer.clone());
		let envelope = request
			.build(&wallet)
			.await
			.map_err(|e| WalletError::SigningFailed(e.to_string()))?;

		Ok(SignedTransaction::Raw(Bytes::from(envelope.encoded_2718())))
	}
}

/// Configuration schema for the local wallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default().trim_start_matches("0x");
					if key.len() != 64 {
						return Err("Private key must be 64 hex characters".into());
					}
					if !key.chars().all(|c| c.is_ascii_hexdigit()) {
						return Err("Private key must be hexadecimal".into());
					}
					Ok(())
				}),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a local wallet from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex encoded secp256k1 key
pub fn create_wallet(config: &toml::Value) -> Result<Box<dyn WalletInterface>, WalletError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| WalletError::InvalidKey(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| WalletError::InvalidKey("private_key is missing".into()))?;

	Ok(Box::new(LocalWallet::from_private_key(
		private_key.expose_secret(),
	)?))
}

/// Registry for the local wallet implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = WalletFactory;

	fn factory() -> Self::Factory {
		create_wallet
	}
}

impl WalletRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::consensus::{Transaction as _, TxEnvelope};
	use alloy::eips::eip2718::Decodable2718;
	use alloy::primitives::{Signature, U256, U64};

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

	fn wallet() -> LocalWallet {
		LocalWallet::from_private_key(KEY).unwrap()
	}

	#[tokio::test]
	async fn test_address_from_key() {
		assert_eq!(
			wallet().address().await.unwrap(),
			ADDRESS.parse::<Address>().unwrap()
		);
	}

	#[tokio::test]
	async fn test_signed_challenge_recovers_to_wallet() {
		let wallet = wallet();
		let bytes = wallet.sign_message("challenge-123").await.unwrap();
		assert_eq!(bytes.len(), 65);

		let signature = Signature::try_from(bytes.as_ref()).unwrap();
		let recovered = signature
			.recover_address_from_msg("challenge-123")
			.unwrap();
		assert_eq!(recovered, wallet.address().await.unwrap());
	}

	#[tokio::test]
	async fn test_typed_data_signature_recovers_to_wallet() {
		let wallet = wallet();
		let fields = TypedDataField::challenge("abc");
		let bytes = wallet.sign_typed_data(&fields).await.unwrap();

		let signature = Signature::try_from(bytes.as_ref()).unwrap();
		let recovered = signature
			.recover_address_from_prehash(&typed_data_hash(&fields).unwrap())
			.unwrap();
		assert_eq!(recovered, wallet.address().await.unwrap());
	}

	#[tokio::test]
	async fn test_sign_transaction_produces_raw_legacy_tx() {
		let wallet = wallet();
		let draft = TxData {
			from: ADDRESS.parse().unwrap(),
			to: Address::repeat_byte(0x11),
			value: U256::from(1000),
			data: None,
			gas: U64::from(21000),
			gas_price: U256::from(2_000_000_000u64),
			nonce: Some(U64::from(7)),
		};

		let SignedTransaction::Raw(raw) = wallet.sign_transaction(&draft, 17).await.unwrap() else {
			panic!("local wallet must sign raw transactions");
		};
		let envelope = TxEnvelope::decode_2718(&mut raw.as_ref()).unwrap();
		assert_eq!(envelope.nonce(), 7);
		assert_eq!(envelope.chain_id(), Some(17));
		assert_eq!(envelope.gas_limit(), 21000);
		assert_eq!(envelope.value(), U256::from(1000));
	}

	#[tokio::test]
	async fn test_sign_transaction_requires_nonce() {
		let wallet = wallet();
		let draft = TxData {
			from: ADDRESS.parse().unwrap(),
			to: Address::repeat_byte(0x11),
			value: U256::ZERO,
			data: None,
			gas: U64::from(21000),
			gas_price: U256::from(1),
			nonce: None,
		};
		assert!(matches!(
			wallet.sign_transaction(&draft, 17).await,
			Err(WalletError::SigningFailed(_))
		));
	}

	#[test]
	fn test_factory_validates_key() {
		let config: toml::Value = toml::from_str("private_key = \"0x1234\"").unwrap();
		assert!(matches!(
			create_wallet(&config).err(),
			Some(WalletError::InvalidKey(_))
		));

		let config: toml::Value = toml::from_str(&format!("private_key = \"{}\"", KEY)).unwrap();
		assert!(create_wallet(&config).is_ok());
	}
}
