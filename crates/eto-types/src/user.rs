use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Role of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
	Investor,
	Issuer,
	Nominee,
}

/// The logged-in user as persisted under [`crate::StorageKey::User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	pub user_id: Address,
	#[serde(rename = "type")]
	pub user_type: UserType,
	#[serde(default)]
	pub wallet_type: Option<String>,
	#[serde(default)]
	pub verified_email: Option<String>,
}
