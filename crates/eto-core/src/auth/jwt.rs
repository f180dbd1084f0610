//! Session token claims.
//!
//! The token is opaque to us apart from its payload: an expiry and a map of
//! permission names to their own expiries. The signature is checked by the
//! server on every request, not here, and expiry is judged by the session
//! timers rather than by the decoder.

use super::AuthError;
use eto_types::SecretString;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwtClaims {
	/// Expiry as unix seconds.
	pub exp: i64,
	/// Permission name to expiry as unix seconds.
	#[serde(default)]
	pub permissions: HashMap<String, i64>,
}

/// A parsed session token.
#[derive(Debug, Clone)]
pub struct Jwt {
	raw: SecretString,
	claims: JwtClaims,
}

impl Jwt {
	pub fn parse(token: &str) -> Result<Self, AuthError> {
		let mut validation = Validation::default();
		validation.insecure_disable_signature_validation();
		validation.validate_exp = false;
		validation.validate_aud = false;

		let data = decode::<JwtClaims>(token, &DecodingKey::from_secret(&[]), &validation)
			.map_err(|e| AuthError::InvalidToken(e.to_string()))?;

		Ok(Self {
			raw: SecretString::new(token),
			claims: data.claims,
		})
	}

	pub fn as_str(&self) -> &str {
		self.raw.expose_secret()
	}

	pub fn claims(&self) -> &JwtClaims {
		&self.claims
	}

	pub fn expires_at(&self) -> i64 {
		self.claims.exp
	}

	/// Time until expiry, zero once expired.
	pub fn time_left(&self, now_millis: i64) -> Duration {
		let left = self.claims.exp.saturating_mul(1000).saturating_sub(now_millis);
		Duration::from_millis(left.max(0) as u64)
	}

	/// Whether every permission in `required` is present and not expired.
	pub fn has_valid_permissions(&self, required: &[String], now_millis: i64) -> bool {
		let now = now_millis / 1000;
		required.iter().all(|permission| {
			self.claims
				.permissions
				.get(permission)
				.is_some_and(|&expiry| expiry > now)
		})
	}
}
