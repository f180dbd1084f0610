//! Legacy (v1) typed data as understood by `eth_signTypedData`.
//!
//! A message is a flat list of typed, named values. Its hash is
//! `keccak256(keccak256(schema) ++ keccak256(packed values))` where the schema
//! is the concatenation of `"<type> <name>"` for every field.

use crate::WalletError;
use alloy::primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// One field of a legacy typed data message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataField {
	#[serde(rename = "type")]
	pub kind: String,
	pub name: String,
	pub value: String,
}

impl TypedDataField {
	pub fn new(kind: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			name: name.into(),
			value: value.into(),
		}
	}

	/// The single-field message wallets sign instead of a plain challenge.
	pub fn challenge(challenge: &str) -> Vec<Self> {
		vec![Self::new("string", "sign message", challenge)]
	}

	fn packed_value(&self) -> Result<Vec<u8>, WalletError> {
		let invalid = |e: String| {
			WalletError::SigningFailed(format!(
				"Invalid {} value for '{}': {}",
				self.kind, self.name, e
			))
		};

		match self.kind.as_str() {
			"string" => Ok(self.value.as_bytes().to_vec()),
			"address" => self
				.value
				.parse::<Address>()
				.map(|a| a.to_vec())
				.map_err(|e| invalid(e.to_string())),
			"bytes32" => self
				.value
				.parse::<B256>()
				.map(|b| b.to_vec())
				.map_err(|e| invalid(e.to_string())),
			"uint" | "uint256" => self
				.value
				.parse::<U256>()
				.map(|v| v.to_be_bytes::<32>().to_vec())
				.map_err(|e| invalid(e.to_string())),
			"bool" => match self.value.as_str() {
				"true" => Ok(vec![1]),
				"false" => Ok(vec![0]),
				other => Err(invalid(format!("'{}' is not a boolean", other))),
			},
			other => Err(WalletError::SigningFailed(format!(
				"Unsupported typed data type '{}'",
				other
			))),
		}
	}
}

/// Computes the digest a wallet signs for a legacy typed data message.
pub fn typed_data_hash(fields: &[TypedDataField]) -> Result<B256, WalletError> {
	if fields.is_empty() {
		return Err(WalletError::SigningFailed(
			"Typed data must contain at least one field".into(),
		));
	}

	let mut schema = Vec::new();
	let mut values = Vec::new();
	for field in fields {
		schema.extend_from_slice(format!("{} {}", field.kind, field.name).as_bytes());
		values.extend(field.packed_value()?);
	}

	let mut outer = [0u8; 64];
	outer[..32].copy_from_slice(keccak256(&schema).as_slice());
	outer[32..].copy_from_slice(keccak256(&values).as_slice());
	Ok(keccak256(outer))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_composition() {
		let fields = vec![
			TypedDataField::new("string", "message", "hi"),
			TypedDataField::new("uint256", "amount", "1"),
		];

		let schema_hash = keccak256(b"string messageuint256 amount");
		let mut packed = b"hi".to_vec();
		packed.extend_from_slice(&U256::from(1).to_be_bytes::<32>());
		let value_hash = keccak256(&packed);
		let mut outer = schema_hash.to_vec();
		outer.extend_from_slice(value_hash.as_slice());

		assert_eq!(typed_data_hash(&fields).unwrap(), keccak256(&outer));
	}

	#[test]
	fn test_rejects_bad_values() {
		assert!(typed_data_hash(&[]).is_err());
		assert!(typed_data_hash(&[TypedDataField::new("bool", "flag", "yes")]).is_err());
		assert!(typed_data_hash(&[TypedDataField::new("int8", "x", "1")]).is_err());
		assert!(typed_data_hash(&[TypedDataField::new("address", "to", "0x12")]).is_err());
	}
}
