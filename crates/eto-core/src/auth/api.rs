//! Client of the signature authentication server.
//!
//! All endpoints live under `/api/signature/`. Creating a token is
//! unauthenticated; escalating and refreshing require the current token as a
//! bearer credential.

use super::AuthError;
use async_trait::async_trait;
use eto_account::SignerType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SIGNATURE_BASE_PATH: &str = "/api/signature";

/// Operations of the signature authentication server.
#[async_trait]
pub trait SignatureAuthApi: Send + Sync {
	/// Requests a single-use challenge for `address`.
	async fn challenge(
		&self,
		address: &str,
		salt: &str,
		signer_type: SignerType,
		permissions: &[String],
	) -> Result<String, AuthError>;

	/// Exchanges a signed challenge for a new token.
	async fn create_jwt(
		&self,
		challenge: &str,
		signed_challenge: &str,
		signer_type: SignerType,
	) -> Result<String, AuthError>;

	/// Exchanges a signed challenge for a token with more permissions.
	async fn escalate_jwt(
		&self,
		jwt: &str,
		challenge: &str,
		signed_challenge: &str,
		signer_type: SignerType,
	) -> Result<String, AuthError>;

	/// Exchanges a valid token for one with a later expiry.
	async fn refresh_jwt(&self, jwt: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Serialize)]
struct ChallengeRequest<'a> {
	address: &'a str,
	salt: &'a str,
	signer_type: SignerType,
	permissions: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ChallengeResponse {
	challenge: String,
}

#[derive(Debug, Serialize)]
struct CreateJwtRequest<'a> {
	challenge: &'a str,
	response: &'a str,
	signer_type: SignerType,
}

#[derive(Debug, Deserialize)]
struct CreateJwtResponse {
	jwt: String,
}

/// HTTP implementation of [`SignatureAuthApi`].
pub struct HttpSignatureAuthApi {
	client: reqwest::Client,
	base_url: String,
}

impl HttpSignatureAuthApi {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| AuthError::Api(e.to_string()))?;
		Ok(Self {
			client,
			base_url: format!("{}{}", base_url.trim_end_matches('/'), SIGNATURE_BASE_PATH),
		})
	}

	async fn post<B, R>(
		&self,
		path: &str,
		bearer: Option<&str>,
		body: Option<&B>,
	) -> Result<R, AuthError>
	where
		B: Serialize + ?Sized + Sync,
		R: for<'de> Deserialize<'de>,
	{
		let mut request = self.client.post(format!("{}{}", self.base_url, path));
		if let Some(token) = bearer {
			request = request.bearer_auth(token);
		}
		if let Some(body) = body {
			request = request.json(body);
		}

		let response = request
			.send()
			.await
			.map_err(|e| AuthError::Api(e.to_string()))?;
		let status = response.status();
		if !status.is_success() {
			let text = response.text().await.unwrap_or_default();
			return Err(AuthError::Api(format!("{} returned {}: {}", path, status, text)));
		}
		response
			.json::<R>()
			.await
			.map_err(|e| AuthError::Api(format!("Invalid {} response: {}", path, e)))
	}
}

#[async_trait]
impl SignatureAuthApi for HttpSignatureAuthApi {
	async fn challenge(
		&self,
		address: &str,
		salt: &str,
		signer_type: SignerType,
		permissions: &[String],
	) -> Result<String, AuthError> {
		let body = ChallengeRequest {
			address,
			salt,
			signer_type,
			permissions,
		};
		let response: ChallengeResponse = self.post("/jwt/challenge", None, Some(&body)).await?;
		Ok(response.challenge)
	}

	async fn create_jwt(
		&self,
		challenge: &str,
		signed_challenge: &str,
		signer_type: SignerType,
	) -> Result<String, AuthError> {
		let body = CreateJwtRequest {
			challenge,
			response: signed_challenge,
			signer_type,
		};
		let response: CreateJwtResponse = self.post("/jwt/create", None, Some(&body)).await?;
		Ok(response.jwt)
	}

	async fn escalate_jwt(
		&self,
		jwt: &str,
		challenge: &str,
		signed_challenge: &str,
		signer_type: SignerType,
	) -> Result<String, AuthError> {
		let body = CreateJwtRequest {
			challenge,
			response: signed_challenge,
			signer_type,
		};
		let response: CreateJwtResponse =
			self.post("/jwt/create", Some(jwt), Some(&body)).await?;
		Ok(response.jwt)
	}

	async fn refresh_jwt(&self, jwt: &str) -> Result<String, AuthError> {
		let response: CreateJwtResponse = self
			.post::<(), _>("/jwt/refresh", Some(jwt), None)
			.await?;
		Ok(response.jwt)
	}
}
