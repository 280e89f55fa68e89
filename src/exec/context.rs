use crate::datastore::Credentials;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The execution-time request surface (spec §6 `Request↔Execution`,
/// §4.5 "operator base" `context` parameter). Shared via `Arc` across
/// every operator in a single request's plan tree; `cancelled` is the
/// cooperative-cancellation flag every operator's `run_once` checks at
/// its suspension points (spec §5 "Cancellation").
pub struct Context {
	max_parallelism: usize,
	deadline: Option<Instant>,
	cancelled: AtomicBool,
	credentials: Credentials,
}

impl Context {
	pub fn new(max_parallelism: usize, deadline: Option<Instant>, credentials: Credentials) -> Arc<Self> {
		Arc::new(Self {
			max_parallelism: max_parallelism.max(1),
			deadline,
			cancelled: AtomicBool::new(false),
			credentials,
		})
	}

	pub fn max_parallelism(&self) -> usize {
		self.max_parallelism
	}

	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Whether the deadline (if any) has already passed, or the request
	/// was explicitly cancelled (spec §5 "Timeout").
	pub fn is_cancelled(&self) -> bool {
		if self.cancelled.load(Ordering::Acquire) {
			return true;
		}
		matches!(self.deadline, Some(d) if Instant::now() >= d)
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Release);
	}

	pub fn time_remaining(&self) -> Option<Duration> {
		self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deadline_in_the_past_reports_cancelled() {
		let ctx = Context::new(4, Some(Instant::now() - Duration::from_secs(1)), Credentials::default());
		assert!(ctx.is_cancelled());
	}

	#[test]
	fn explicit_cancel_is_sticky() {
		let ctx = Context::new(4, None, Credentials::default());
		assert!(!ctx.is_cancelled());
		ctx.cancel();
		assert!(ctx.is_cancelled());
	}

	#[test]
	fn max_parallelism_is_at_least_one() {
		let ctx = Context::new(0, None, Credentials::default());
		assert_eq!(ctx.max_parallelism(), 1);
	}
}
