//! The session token lifecycle.

use super::api::SignatureAuthApi;
use super::jwt::Jwt;
use super::{AccessRequest, AuthError, WalletAccessPrompt};
use crate::delay::{DelayTiming, SafeTimers};
use crate::event_bus::EventBus;
use crate::state::{AuthState, AuthStateMachine};
use eto_account::{SignerType, WalletError, WalletManager};
use eto_storage::StorageService;
use eto_types::{AppEvent, AuthEvent, StorageKey, User, UserType};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Length of the random salt sent with every challenge request.
const SALT_LENGTH: usize = 64;
/// Share of the remaining token lifetime to wait before refreshing.
pub const DEFAULT_REFRESH_RATIO: f64 = 0.9;
/// How long a fired refresh timer waits for a running challenge round.
pub const ROUND_RECHECK: Duration = Duration::from_secs(1);

/// A challenge signed by the personal wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChallenge {
	pub challenge: String,
	pub signed_challenge: String,
	pub signer_type: SignerType,
}

/// Obtains, escalates, refreshes and discards the session token.
pub struct AuthService {
	api: Arc<dyn SignatureAuthApi>,
	storage: StorageService,
	wallets: Arc<WalletManager>,
	event_bus: EventBus,
	timers: SafeTimers,
	refresh_ratio: f64,
	jwt: watch::Sender<Option<Jwt>>,
	state: AuthStateMachine,
}

/// What a fired refresh timer led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerOutcome {
	Refreshed,
	LoggedOut,
	/// A challenge round was replacing the token; nothing was done.
	Deferred,
}

impl AuthService {
	pub fn new(
		api: Arc<dyn SignatureAuthApi>,
		storage: StorageService,
		wallets: Arc<WalletManager>,
		event_bus: EventBus,
		timers: SafeTimers,
	) -> Self {
		Self {
			api,
			storage,
			wallets,
			event_bus,
			timers,
			refresh_ratio: DEFAULT_REFRESH_RATIO,
			jwt: watch::Sender::new(None),
			state: AuthStateMachine::new(),
		}
	}

	pub fn with_refresh_ratio(mut self, ratio: f64) -> Self {
		self.refresh_ratio = ratio;
		self
	}

	pub fn state(&self) -> AuthState {
		self.state.state()
	}

	pub fn current_jwt(&self) -> Option<Jwt> {
		self.jwt.borrow().clone()
	}

	/// Loads a persisted token into the session.
	pub async fn load_jwt(&self) -> Result<Option<Jwt>, AuthError> {
		let Some(raw) = self.storage.get(StorageKey::Jwt).await? else {
			return Ok(None);
		};
		let jwt = Jwt::parse(&raw)?;
		self.state.transition(AuthState::Valid)?;
		self.jwt.send_replace(Some(jwt.clone()));
		self.publish(AuthEvent::JwtLoaded {
			expires_at: jwt.expires_at(),
		});
		Ok(Some(jwt))
	}

	/// Persists a new token and makes it the session token.
	async fn set_jwt(&self, token: &str) -> Result<Jwt, AuthError> {
		let jwt = Jwt::parse(token)?;
		self.storage.set(StorageKey::Jwt, jwt.as_str()).await?;
		self.jwt.send_replace(Some(jwt.clone()));
		self.publish(AuthEvent::JwtLoaded {
			expires_at: jwt.expires_at(),
		});
		Ok(jwt)
	}

	/// Requests a challenge for the personal wallet and signs it.
	pub async fn sign_challenge(&self, permissions: &[String]) -> Result<SignedChallenge, AuthError> {
		let wallet = self.wallets.personal_wallet().await?;
		let address = wallet.address().await?.to_checksum(None);
		let salt = random_salt();
		let signer_type = wallet.signer_type();

		self.state.transition(AuthState::ChallengeRequested)?;
		info!("Obtaining auth challenge from api");
		let challenge = self
			.api
			.challenge(&address, &salt, signer_type, permissions)
			.await?;

		info!("Signing challenge");
		let signature = wallet.sign_message(&challenge).await?;
		self.state.transition(AuthState::ChallengeSigned)?;
		info!("Challenge signed");

		Ok(SignedChallenge {
			challenge,
			signed_challenge: signature.to_string(),
			signer_type,
		})
	}

	async fn issue(&self, token: &str) -> Result<Jwt, AuthError> {
		self.state.transition(AuthState::TokenIssued)?;
		let jwt = self.set_jwt(token).await?;
		self.state.transition(AuthState::Valid)?;
		Ok(jwt)
	}

	async fn finish_round(&self, result: Result<Jwt, AuthError>) -> Result<Jwt, AuthError> {
		if result.is_err() {
			let has_token = self.jwt.borrow().is_some();
			self.state.abort_round(has_token);
		}
		result
	}

	/// Obtains a new token from the authentication server.
	#[instrument(skip_all)]
	pub async fn obtain_jwt(&self, permissions: &[String]) -> Result<Jwt, AuthError> {
		info!("Creating jwt");
		let result = async {
			let signed = self.sign_challenge(permissions).await?;
			info!("Sending signed challenge back to api");
			let token = self
				.api
				.create_jwt(&signed.challenge, &signed.signed_challenge, signed.signer_type)
				.await?;
			self.issue(&token).await
		}
		.await;
		let jwt = self.finish_round(result).await?;
		info!("Jwt obtained successfully");
		Ok(jwt)
	}

	/// Replaces the current token with one carrying `permissions`.
	#[instrument(skip_all)]
	pub async fn escalate_jwt(&self, permissions: &[String]) -> Result<Jwt, AuthError> {
		let current = self.current_jwt().ok_or(AuthError::JwtNotAvailable)?;

		info!("Escalating jwt");
		self.state.transition(AuthState::Escalating)?;
		let result = async {
			let signed = self.sign_challenge(permissions).await?;
			info!("Sending signed challenge back to api");
			let token = self
				.api
				.escalate_jwt(
					current.as_str(),
					&signed.challenge,
					&signed.signed_challenge,
					signed.signer_type,
				)
				.await?;
			self.issue(&token).await
		}
		.await;
		let jwt = self.finish_round(result).await?;
		info!("Jwt escalated successfully");
		Ok(jwt)
	}

	/// Replaces the current token with one expiring later.
	pub async fn refresh_jwt(&self) -> Result<Jwt, AuthError> {
		let current = self.current_jwt().ok_or(AuthError::JwtNotAvailable)?;
		info!("Refreshing jwt");
		let token = self.api.refresh_jwt(current.as_str()).await?;
		self.set_jwt(&token).await
	}

	/// Runs `effect` once the session token carries every permission in
	/// `permissions`, escalating it first if needed.
	///
	/// Returns `None` without running the effect if the user cancels the
	/// signing round.
	pub async fn ensure_permissions_and_run<F, Fut, T>(
		&self,
		effect: F,
		permissions: &[String],
		prompt: &dyn WalletAccessPrompt,
		request: &AccessRequest,
	) -> Result<Option<T>, AuthError>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
	{
		let now = self.timers.now_millis();
		let permitted = self
			.jwt
			.borrow()
			.as_ref()
			.is_some_and(|jwt| jwt.has_valid_permissions(permissions, now));
		if permitted {
			return Ok(Some(effect().await));
		}

		let escalation = async {
			prompt.request_access(request).await?;
			self.escalate_jwt(permissions).await
		};
		match escalation.await {
			Ok(_) => Ok(Some(effect().await)),
			Err(AuthError::Wallet(WalletError::MessageSignCancelled)) => {
				info!("Signing cancelled");
				Ok(None)
			},
			Err(e) => Err(e),
		}
	}

	/// Waits until shortly before the token expires, then refreshes it. If
	/// the wait ended late the token may already be invalid, so the user is
	/// logged out instead.
	pub async fn handle_jwt_timeout(&self) -> Result<DelayTiming, AuthError> {
		let result = async {
			let jwt = self.current_jwt().ok_or(AuthError::JwtNotAvailable)?;
			let timing = self.timers.delay(self.refresh_wait(&jwt)).await;
			self.on_timer(timing).await?;
			Ok(timing)
		}
		.await;
		if let Err(e) = &result {
			error!(error = %e, "Failed to auto handle JWT auto logout");
		}
		result
	}

	fn refresh_wait(&self, jwt: &Jwt) -> Duration {
		jwt.time_left(self.timers.now_millis())
			.mul_f64(self.refresh_ratio)
	}

	async fn on_timer(&self, timing: DelayTiming) -> Result<TimerOutcome, AuthError> {
		let state = self.state.state();
		if state != AuthState::Valid {
			debug!(?state, "Token timer fired during a challenge round");
			return Ok(TimerOutcome::Deferred);
		}
		self.state.transition(AuthState::Expiring)?;

		match timing {
			DelayTiming::Exact => {
				self.state.transition(AuthState::Refreshing)?;
				if let Err(e) = self.refresh_jwt().await {
					self.state.transition(AuthState::Expired)?;
					info!(error = %e, "Token refresh failed, logging out");
					self.publish(AuthEvent::Logout);
					return Err(e);
				}
				self.state.transition(AuthState::Valid)?;
				Ok(TimerOutcome::Refreshed)
			},
			DelayTiming::NotExact => {
				self.state.transition(AuthState::Expired)?;
				info!("Token timer fired late, logging out");
				self.publish(AuthEvent::Logout);
				Ok(TimerOutcome::LoggedOut)
			},
		}
	}

	/// Refreshes the token for as long as timers fire on time.
	///
	/// The refresh timer always follows the newest token: a token issued by
	/// escalation or another refresh while waiting restarts the wait.
	pub async fn keep_session_alive(&self, cancel: &CancellationToken) -> Result<(), AuthError> {
		let mut updates = self.jwt.subscribe();
		loop {
			let Some(jwt) = updates.borrow_and_update().clone() else {
				error!("Failed to auto handle JWT auto logout");
				return Err(AuthError::JwtNotAvailable);
			};

			let timing = tokio::select! {
				_ = cancel.cancelled() => return Ok(()),
				_ = updates.changed() => {
					debug!("Session token replaced, rescheduling refresh");
					continue;
				},
				timing = self.timers.delay(self.refresh_wait(&jwt)) => timing,
			};

			match self.on_timer(timing).await {
				Ok(TimerOutcome::Refreshed) => {},
				Ok(TimerOutcome::LoggedOut) => return Ok(()),
				Ok(TimerOutcome::Deferred) => {
					tokio::select! {
						_ = cancel.cancelled() => return Ok(()),
						_ = updates.changed() => {},
						_ = self.timers.delay(ROUND_RECHECK) => {},
					}
				},
				Err(e) => {
					error!(error = %e, "Failed to auto handle JWT auto logout");
					return Err(e);
				},
			}
		}
	}

	/// Obtains a token and persists the user identity.
	pub async fn login(&self, user_type: UserType, permissions: &[String]) -> Result<User, AuthError> {
		self.obtain_jwt(permissions).await?;
		let wallet = self.wallets.personal_wallet().await?;
		let user = User {
			user_id: wallet.address().await?,
			user_type,
			wallet_type: Some(wallet.signer_type().to_string()),
			verified_email: None,
		};
		self.storage.store(StorageKey::User, &user).await?;
		info!(user_id = %user.user_id, "User signed in");
		Ok(user)
	}

	/// Clears the persisted session and unplugs the wallet.
	pub async fn logout(&self) -> Result<(), AuthError> {
		self.storage.remove(StorageKey::User).await?;
		self.storage.remove(StorageKey::Jwt).await?;
		self.jwt.send_replace(None);
		self.wallets.unplug().await;
		self.state.transition(AuthState::LoggedOut)?;
		info!("Logged out");
		self.publish(AuthEvent::AppInit);
		Ok(())
	}

	/// Reacts to session events published by other components.
	pub async fn handle_event(&self, event: &AuthEvent) -> Result<(), AuthError> {
		match event {
			AuthEvent::Logout => self.logout().await,
			AuthEvent::JwtLoaded { .. } | AuthEvent::AppInit => Ok(()),
		}
	}

	fn publish(&self, event: AuthEvent) {
		self.event_bus.publish(AppEvent::Auth(event)).ok();
	}
}

fn random_salt() -> String {
	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(SALT_LENGTH)
		.map(char::from)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::auth::jwt::tests::token;
	use crate::delay::tests::TestClock;
	use async_trait::async_trait;
	use eto_account::implementations::local::LocalWallet;
	use eto_storage::implementations::memory::MemoryStorage;
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Mutex;
	use std::time::Duration;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

	#[derive(Default)]
	struct MockApi {
		tokens: Mutex<VecDeque<String>>,
		calls: Mutex<Vec<String>>,
		challenge_requests: Mutex<Vec<(String, usize, SignerType)>>,
	}

	impl MockApi {
		fn with_tokens(tokens: Vec<String>) -> Arc<Self> {
			Arc::new(Self {
				tokens: Mutex::new(tokens.into()),
				..Default::default()
			})
		}

		fn next_token(&self, call: &str) -> Result<String, AuthError> {
			self.calls.lock().unwrap().push(call.to_string());
			self.tokens
				.lock()
				.unwrap()
				.pop_front()
				.ok_or_else(|| AuthError::Api("no token scripted".into()))
		}

		fn calls(&self) -> Vec<String> {
			self.calls.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl SignatureAuthApi for MockApi {
		async fn challenge(
			&self,
			address: &str,
			salt: &str,
			signer_type: SignerType,
			_permissions: &[String],
		) -> Result<String, AuthError> {
			self.challenge_requests
				.lock()
				.unwrap()
				.push((address.to_string(), salt.len(), signer_type));
			Ok("challenge-1".into())
		}

		async fn create_jwt(
			&self,
			_challenge: &str,
			_signed: &str,
			_signer_type: SignerType,
		) -> Result<String, AuthError> {
			self.next_token("create")
		}

		async fn escalate_jwt(
			&self,
			_jwt: &str,
			_challenge: &str,
			_signed: &str,
			_signer_type: SignerType,
		) -> Result<String, AuthError> {
			self.next_token("escalate")
		}

		async fn refresh_jwt(&self, _jwt: &str) -> Result<String, AuthError> {
			self.next_token("refresh")
		}
	}

	struct CancellingPrompt;

	#[async_trait]
	impl WalletAccessPrompt for CancellingPrompt {
		async fn request_access(&self, _request: &AccessRequest) -> Result<(), WalletError> {
			Err(WalletError::MessageSignCancelled)
		}
	}

	struct Fixture {
		service: AuthService,
		api: Arc<MockApi>,
		storage: StorageService,
		wallets: Arc<WalletManager>,
		bus: EventBus,
		clock: Arc<TestClock>,
	}

	async fn fixture(tokens: Vec<String>, plug_wallet: bool) -> Fixture {
		let api = MockApi::with_tokens(tokens);
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let wallets = Arc::new(WalletManager::new());
		if plug_wallet {
			wallets
				.plug(Arc::new(LocalWallet::from_private_key(KEY).unwrap()))
				.await
				.unwrap();
		}
		let bus = EventBus::default();
		let clock = TestClock::new();
		let service = AuthService::new(
			api.clone(),
			storage.clone(),
			wallets.clone(),
			bus.clone(),
			SafeTimers::new(clock.clone()),
		);
		Fixture {
			service,
			api,
			storage,
			wallets,
			bus,
			clock,
		}
	}

	fn drain(rx: &mut tokio::sync::broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
		let mut events = Vec::new();
		while let Ok(event) = rx.try_recv() {
			events.push(event);
		}
		events
	}

	#[tokio::test]
	async fn test_obtain_jwt_persists_and_publishes() {
		let issued = token(3600, &[]);
		let f = fixture(vec![issued.clone()], true).await;
		let mut events = f.bus.subscribe();

		let jwt = f.service.obtain_jwt(&[]).await.unwrap();

		assert_eq!(jwt.as_str(), issued);
		assert_eq!(f.storage.get(StorageKey::Jwt).await.unwrap(), Some(issued));
		assert_eq!(f.service.state(), AuthState::Valid);
		assert_eq!(
			drain(&mut events),
			vec![AppEvent::Auth(AuthEvent::JwtLoaded { expires_at: 3600 })]
		);
		let requests = f.api.challenge_requests.lock().unwrap().clone();
		assert_eq!(
			requests,
			vec![(ADDRESS.to_string(), SALT_LENGTH, SignerType::EthSign)]
		);
	}

	#[tokio::test]
	async fn test_sign_challenge_requires_wallet() {
		let f = fixture(vec![], false).await;
		assert_eq!(
			f.service.sign_challenge(&[]).await,
			Err(AuthError::WalletUnavailable)
		);
		assert_eq!(f.service.state(), AuthState::NoToken);
	}

	#[tokio::test]
	async fn test_failed_round_falls_back() {
		let f = fixture(vec![], true).await;
		assert!(matches!(
			f.service.obtain_jwt(&[]).await,
			Err(AuthError::Api(_))
		));
		assert_eq!(f.service.state(), AuthState::NoToken);
	}

	#[tokio::test]
	async fn test_escalate_requires_token() {
		let f = fixture(vec![], true).await;
		assert_eq!(
			f.service.escalate_jwt(&["sign-tos".into()]).await.err(),
			Some(AuthError::JwtNotAvailable)
		);
		assert!(f.api.calls().is_empty());
	}

	#[tokio::test]
	async fn test_present_permissions_skip_escalation() {
		let f = fixture(vec![], true).await;
		f.storage
			.set(StorageKey::Jwt, &token(i64::MAX / 2000, &[("sign-tos", i64::MAX / 2000)]))
			.await
			.unwrap();
		f.service.load_jwt().await.unwrap();

		let ran = f
			.service
			.ensure_permissions_and_run(
				|| async { 42 },
				&["sign-tos".into()],
				&CancellingPrompt,
				&AccessRequest::new("Sign", "Confirm"),
			)
			.await
			.unwrap();

		assert_eq!(ran, Some(42));
		assert!(f.api.calls().is_empty());
	}

	#[tokio::test]
	async fn test_missing_permissions_escalate_then_run() {
		let escalated = token(7200, &[("sign-tos", 7200)]);
		let f = fixture(vec![token(3600, &[]), escalated.clone()], true).await;
		f.service.obtain_jwt(&[]).await.unwrap();

		let ran = f
			.service
			.ensure_permissions_and_run(
				|| async { "done" },
				&["sign-tos".into()],
				&crate::auth::AutoApprove,
				&AccessRequest::new("Sign", "Confirm"),
			)
			.await
			.unwrap();

		assert_eq!(ran, Some("done"));
		assert_eq!(f.api.calls(), vec!["create", "escalate"]);
		assert_eq!(f.service.current_jwt().unwrap().as_str(), escalated);
	}

	#[tokio::test]
	async fn test_cancelled_signing_is_swallowed() {
		let f = fixture(vec![token(3600, &[])], true).await;
		f.service.obtain_jwt(&[]).await.unwrap();
		let ran = Arc::new(AtomicBool::new(false));
		let flag = ran.clone();

		let result = f
			.service
			.ensure_permissions_and_run(
				move || async move {
					flag.store(true, Ordering::SeqCst);
				},
				&["sign-tos".into()],
				&CancellingPrompt,
				&AccessRequest::new("Sign", "Confirm"),
			)
			.await;

		assert_eq!(result, Ok(None));
		assert!(!ran.load(Ordering::SeqCst));
		assert_eq!(f.api.calls(), vec!["create"]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timely_timer_refreshes_once() {
		let f = fixture(vec![token(100, &[]), token(200, &[])], true).await;
		f.service.obtain_jwt(&[]).await.unwrap();
		let mut events = f.bus.subscribe();

		let timing = f.service.handle_jwt_timeout().await.unwrap();

		assert_eq!(timing, DelayTiming::Exact);
		assert_eq!(f.api.calls(), vec!["create", "refresh"]);
		assert_eq!(f.service.current_jwt().unwrap().expires_at(), 200);
		assert_eq!(f.service.state(), AuthState::Valid);
		assert!(!drain(&mut events).contains(&AppEvent::Auth(AuthEvent::Logout)));
	}

	#[tokio::test(start_paused = true)]
	async fn test_late_timer_logs_out_without_refresh() {
		let f = fixture(vec![token(100, &[])], true).await;
		f.service.obtain_jwt(&[]).await.unwrap();
		let mut events = f.bus.subscribe();

		// 90 s wait; the process "sleeps" through most of it.
		let (timing, _) = tokio::join!(f.service.handle_jwt_timeout(), async {
			tokio::time::sleep(Duration::from_secs(1)).await;
			f.clock.jump(95_000);
		});

		assert_eq!(timing, Ok(DelayTiming::NotExact));
		assert_eq!(f.api.calls(), vec!["create"]);
		assert_eq!(f.service.state(), AuthState::Expired);
		assert_eq!(
			drain(&mut events),
			vec![AppEvent::Auth(AuthEvent::Logout)]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_failed_refresh_expires_session() {
		let f = fixture(vec![token(100, &[])], true).await;
		f.service.obtain_jwt(&[]).await.unwrap();
		let mut events = f.bus.subscribe();

		let result = f.service.handle_jwt_timeout().await;

		assert!(matches!(result, Err(AuthError::Api(_))));
		assert_eq!(f.api.calls(), vec!["create", "refresh"]);
		assert_eq!(f.service.state(), AuthState::Expired);
		assert_eq!(
			drain(&mut events),
			vec![AppEvent::Auth(AuthEvent::Logout)]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timer_during_challenge_round_is_deferred() {
		let f = fixture(vec![token(100, &[])], true).await;
		f.service.obtain_jwt(&[]).await.unwrap();
		f.service.state.transition(AuthState::Escalating).unwrap();

		let timing = f.service.handle_jwt_timeout().await;

		assert_eq!(timing, Ok(DelayTiming::Exact));
		assert_eq!(f.api.calls(), vec!["create"]);
		assert_eq!(f.service.state(), AuthState::Escalating);
	}

	#[tokio::test(start_paused = true)]
	async fn test_escalated_token_reschedules_refresh() {
		let f = fixture(
			vec![
				token(1000, &[]),
				token(100, &[("sign-tos", 100)]),
				token(2000, &[]),
			],
			true,
		)
		.await;
		f.service.obtain_jwt(&[]).await.unwrap();
		let cancel = CancellationToken::new();

		// The first wait is 900 s; escalation at 10 s shortens the token to
		// expire at 100 s, so the refresh is due at 91 s.
		let (alive, _) = tokio::join!(f.service.keep_session_alive(&cancel), async {
			tokio::time::sleep(Duration::from_secs(10)).await;
			f.service.escalate_jwt(&["sign-tos".into()]).await.unwrap();
			tokio::time::sleep(Duration::from_secs(190)).await;
			cancel.cancel();
		});

		assert_eq!(alive, Ok(()));
		assert_eq!(f.api.calls(), vec!["create", "escalate", "refresh"]);
		assert_eq!(f.service.current_jwt().unwrap().expires_at(), 2000);
		assert_eq!(f.service.state(), AuthState::Valid);
	}

	#[tokio::test]
	async fn test_timeout_without_token_fails() {
		let f = fixture(vec![], true).await;
		assert_eq!(
			f.service.handle_jwt_timeout().await,
			Err(AuthError::JwtNotAvailable)
		);
	}

	#[tokio::test]
	async fn test_login_and_logout() {
		let f = fixture(vec![token(3600, &[])], true).await;
		let user = f.service.login(UserType::Investor, &[]).await.unwrap();
		assert_eq!(user.user_id.to_checksum(None), ADDRESS);
		assert_eq!(
			f.storage.retrieve::<User>(StorageKey::User).await.unwrap(),
			Some(user)
		);
		let mut events = f.bus.subscribe();

		f.service.handle_event(&AuthEvent::Logout).await.unwrap();

		assert_eq!(f.storage.get(StorageKey::Jwt).await.unwrap(), None);
		assert_eq!(f.storage.get(StorageKey::User).await.unwrap(), None);
		assert!(f.service.current_jwt().is_none());
		assert!(!f.wallets.has_plugged_wallet().await);
		assert_eq!(f.service.state(), AuthState::LoggedOut);
		assert_eq!(
			drain(&mut events),
			vec![AppEvent::Auth(AuthEvent::AppInit)]
		);
	}
}
