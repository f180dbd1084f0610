//! Storage keys used by the session layer.

use std::str::FromStr;

/// Keys of the persisted session entries.
///
/// Values are shared between every session attached to the same storage
/// backend, so other sessions observe writes to these keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// The current JWT.
	Jwt,
	/// The logged-in user, stored as JSON.
	User,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Jwt => "NF_JWT",
			StorageKey::User => "NF_USER",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Jwt, Self::User].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"NF_JWT" => Ok(Self::Jwt),
			"NF_USER" => Ok(Self::User),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
