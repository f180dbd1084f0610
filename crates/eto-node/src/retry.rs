//! Bounded retries of node calls.
//!
//! A call is attempted at most `max_attempts` times with a fixed pause
//! between attempts. Only failures classified by [`is_retriable`] are
//! retried; anything else is returned after the first attempt.

use crate::{NodeError, RPC_INTERNAL_ERROR, RPC_LIMIT_EXCEEDED};
use std::future::Future;
use std::time::Duration;

/// Attempts per call, the first one included.
pub const NUMBER_OF_ALLOWED_RETRIES: u32 = 5;
/// Pause between two attempts.
pub const FAILED_REQUEST_WAIT_TIME: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub wait: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: NUMBER_OF_ALLOWED_RETRIES,
			wait: FAILED_REQUEST_WAIT_TIME,
		}
	}
}

/// Whether a failed call may succeed if repeated.
pub fn is_retriable(error: &NodeError) -> bool {
	match error {
		NodeError::Transport(_) => true,
		NodeError::Rpc { code, .. } => matches!(*code, RPC_INTERNAL_ERROR | RPC_LIMIT_EXCEEDED),
		_ => false,
	}
}

/// Runs `call` until it succeeds, fails with a non-retriable error, or the
/// attempts are exhausted, in which case [`NodeError::NotResponding`] is
/// returned.
pub async fn with_retry<T, F, Fut>(
	policy: &RetryPolicy,
	method: &str,
	mut call: F,
) -> Result<T, NodeError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, NodeError>>,
{
	let max_attempts = policy.max_attempts.max(1);
	let mut attempt = 0;

	loop {
		attempt += 1;
		match call().await {
			Ok(value) => return Ok(value),
			Err(e) if !is_retriable(&e) => return Err(e),
			Err(e) if attempt >= max_attempts => {
				tracing::error!(method, attempts = attempt, error = %e, "Node not responding");
				return Err(NodeError::NotResponding { attempts: attempt });
			},
			Err(e) => {
				tracing::warn!(method, attempt, error = %e, "Node request failed, retrying");
				tokio::time::sleep(policy.wait).await;
			},
		}
	}
}
