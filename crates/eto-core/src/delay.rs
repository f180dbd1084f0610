//! Timers that notice when they fire late.
//!
//! A plain sleep cannot tell whether the process was suspended while it
//! waited. These timers poll a wall clock in small steps and report, when
//! they fire, whether they did so within a tolerance of the requested end
//! time. Callers that depend on real elapsed time, like token refresh, use
//! the report to decide whether acting is still safe.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Interval between two wall clock checks.
pub const POLLING_TIME: Duration = Duration::from_millis(10);
/// Lateness still reported as [`DelayTiming::Exact`].
pub const TIME_THRESHOLD: Duration = Duration::from_millis(100);

/// Whether a timer fired on time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayTiming {
	Exact,
	NotExact,
}

/// Classifies a timer that fired `lateness` after its end time.
pub fn classify_timing(lateness: Duration, threshold: Duration) -> DelayTiming {
	if lateness <= threshold {
		DelayTiming::Exact
	} else {
		DelayTiming::NotExact
	}
}

/// Source of wall clock time in milliseconds since the unix epoch.
pub trait Clock: Send + Sync {
	fn now_millis(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_millis(&self) -> i64 {
		chrono::Utc::now().timestamp_millis()
	}
}

/// Handle used to cancel a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Drift-tolerant timers sharing one clock.
#[derive(Clone)]
pub struct SafeTimers {
	clock: Arc<dyn Clock>,
	poll: Duration,
	threshold: Duration,
	next_id: Arc<AtomicU64>,
	active: Arc<Mutex<HashSet<TimerId>>>,
}

impl SafeTimers {
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self::with_settings(clock, POLLING_TIME, TIME_THRESHOLD)
	}

	pub fn with_settings(clock: Arc<dyn Clock>, poll: Duration, threshold: Duration) -> Self {
		Self {
			clock,
			poll,
			threshold,
			next_id: Arc::new(AtomicU64::new(1)),
			active: Arc::new(Mutex::new(HashSet::new())),
		}
	}

	/// Current wall clock time of the timers' clock.
	pub fn now_millis(&self) -> i64 {
		self.clock.now_millis()
	}

	fn active(&self) -> std::sync::MutexGuard<'_, HashSet<TimerId>> {
		self.active.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Runs `f` once `duration` of wall clock time has passed, unless the
	/// timer is cleared first.
	pub fn set_timeout<F>(&self, duration: Duration, f: F) -> TimerId
	where
		F: FnOnce(DelayTiming) + Send + 'static,
	{
		let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.active().insert(id);

		let end = self
			.clock
			.now_millis()
			.saturating_add(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX));
		let timers = self.clone();

		tokio::spawn(async move {
			loop {
				let remaining = end.saturating_sub(timers.clock.now_millis()).max(0) as u64;
				tokio::time::sleep(timers.poll.min(Duration::from_millis(remaining))).await;

				if !timers.active().contains(&id) {
					return;
				}
				let now = timers.clock.now_millis();
				if now >= end {
					timers.active().remove(&id);
					let lateness = Duration::from_millis((now - end) as u64);
					f(classify_timing(lateness, timers.threshold));
					return;
				}
			}
		});

		id
	}

	/// Cancels a timer. Its callback is guaranteed not to run afterwards.
	pub fn clear(&self, id: TimerId) {
		self.active().remove(&id);
	}

	/// Waits for `duration` and reports whether the wait ended on time.
	///
	/// Dropping the returned future clears the timer.
	pub async fn delay(&self, duration: Duration) -> DelayTiming {
		let (tx, rx) = oneshot::channel();
		let id = self.set_timeout(duration, move |timing| {
			let _ = tx.send(timing);
		});
		let _clear = ClearOnDrop { timers: self, id };
		rx.await.unwrap_or(DelayTiming::NotExact)
	}
}

struct ClearOnDrop<'a> {
	timers: &'a SafeTimers,
	id: TimerId,
}

impl Drop for ClearOnDrop<'_> {
	fn drop(&mut self) {
		self.timers.clear(self.id);
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use std::sync::atomic::AtomicI64;

	/// Clock following tokio's (pausable) time plus a manual skew that
	/// simulates suspension.
	pub(crate) struct TestClock {
		start: tokio::time::Instant,
		skew: AtomicI64,
	}

	impl TestClock {
		pub(crate) fn new() -> Arc<Self> {
			Arc::new(Self {
				start: tokio::time::Instant::now(),
				skew: AtomicI64::new(0),
			})
		}

		pub(crate) fn jump(&self, millis: i64) {
			self.skew.fetch_add(millis, Ordering::SeqCst);
		}
	}

	impl Clock for TestClock {
		fn now_millis(&self) -> i64 {
			self.start.elapsed().as_millis() as i64 + self.skew.load(Ordering::SeqCst)
		}
	}

	#[test]
	fn test_threshold_boundaries() {
		assert_eq!(
			classify_timing(Duration::from_millis(100), TIME_THRESHOLD),
			DelayTiming::Exact
		);
		assert_eq!(
			classify_timing(Duration::from_millis(101), TIME_THRESHOLD),
			DelayTiming::NotExact
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_on_time_delay_is_exact() {
		let clock = TestClock::new();
		let timers = SafeTimers::new(clock);

		assert_eq!(
			timers.delay(Duration::from_millis(1000)).await,
			DelayTiming::Exact
		);
	}

	async fn fire_after_jump(jump: i64) -> DelayTiming {
		let clock = TestClock::new();
		let timers = SafeTimers::new(clock.clone());
		let (tx, rx) = oneshot::channel();

		timers.set_timeout(Duration::from_millis(1000), move |timing| {
			let _ = tx.send(timing);
		});
		// The timer task first runs after the jump, with no tokio time elapsed.
		clock.jump(jump);
		rx.await.unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn test_lateness_at_threshold_is_exact() {
		assert_eq!(fire_after_jump(1100).await, DelayTiming::Exact);
	}

	#[tokio::test(start_paused = true)]
	async fn test_lateness_over_threshold_is_not_exact() {
		assert_eq!(fire_after_jump(1101).await, DelayTiming::NotExact);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cleared_timer_never_fires() {
		let timers = SafeTimers::new(TestClock::new());
		let fired = Arc::new(AtomicU64::new(0));
		let counter = Arc::clone(&fired);

		let id = timers.set_timeout(Duration::from_millis(50), move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});
		tokio::time::sleep(Duration::from_millis(20)).await;
		timers.clear(id);
		tokio::time::sleep(Duration::from_millis(200)).await;

		assert_eq!(fired.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_dropped_delay_clears_its_timer() {
		let timers = SafeTimers::new(TestClock::new());

		let waited =
			tokio::time::timeout(Duration::from_millis(20), timers.delay(Duration::from_secs(60))).await;

		assert!(waited.is_err());
		assert!(timers.active().is_empty());
	}
}
