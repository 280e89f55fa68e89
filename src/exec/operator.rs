use super::context::Context;
use crate::err::Error;
use crate::value::AnnotatedValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Bounded item channel carrying `AnnotatedValue`s between two operators
/// (spec §4.5 `input`/`output`). Bounded so a slow downstream operator's
/// backpressure is felt upstream via blocking send, the engine's sole
/// flow-control mechanism (spec §5 "Suspension points").
pub fn item_channel() -> (channel::Sender<AnnotatedValue>, channel::Receiver<AnnotatedValue>) {
	channel::bounded(*crate::cnf::OPERATOR_CHANNEL_BUFFER_SIZE)
}

/// The cancellation signal (spec §4.5 `stopChannel`), backed by
/// `tokio::sync::watch` rather than an MPMC channel: `Parallel` clones
/// the receiver once per child (spec §4.6), and only `watch` guarantees
/// every clone observes the same sent value — an MPMC channel hands a
/// single `send` to whichever one receiver happens to poll first,
/// leaking every other child past a stop.
pub fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
	watch::channel(false)
}

/// Awaits the next stop signal. Resolves immediately if `stop` already
/// carries `true`; if every `Sender` half has been dropped without ever
/// sending one, never resolves, rather than busy-looping on a
/// permanently-errored `changed()`.
pub async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
	if *stop.borrow() {
		return;
	}
	while stop.changed().await.is_ok() {
		if *stop.borrow() {
			return;
		}
	}
	std::future::pending::<()>().await
}

/// Parent-back-link for completion notification only, never traversal
/// (spec §9 "Cyclic back-pointers"): modeled as a channel rather than an
/// actual pointer so ownership stays parent→child.
#[derive(Clone)]
pub struct ParentLink(channel::Sender<()>);

impl ParentLink {
	pub fn new(sender: channel::Sender<()>) -> Self {
		Self(sender)
	}

	pub async fn notify(&self) {
		let _ = self.0.send(()).await;
	}
}

/// The one-shot run latch every operator instance owns (spec §4.5
/// `once`): guarantees `run_once` executes at most once even if called
/// from more than one place (`Parallel` only ever calls it once per
/// child, but the guard makes that a structural guarantee, not just a
/// convention).
#[derive(Default)]
pub struct RunOnceGuard(AtomicBool);

impl RunOnceGuard {
	/// Returns `true` the first time it's called, `false` every time
	/// after.
	pub fn take(&self) -> bool {
		!self.0.swap(true, Ordering::AcqRel)
	}
}

/// Every execution operator (spec §4.5). `run_once` is the operator's
/// entire lifecycle: it must close its output and notify its parent on
/// every exit path, including the panic-recovery path, which
/// [`run_with_recovery`] installs uniformly so individual operators
/// don't each have to.
#[async_trait::async_trait]
pub trait Operator: Send + Sync {
	async fn run_once(
		self: Arc<Self>,
		ctx: Arc<Context>,
		output: channel::Sender<AnnotatedValue>,
		stop: watch::Receiver<bool>,
		parent: ParentLink,
	) -> Result<(), Error>;

	/// Builds an independent copy of this operator for `Parallel` fan-out
	/// (spec §4.6 `child.Copy()`). The copy must be runnable concurrently
	/// with the original and with every other copy.
	fn copy(&self) -> Arc<dyn Operator>;
}

/// Wraps an operator's `run_once` with the panic-recovery boundary every
/// operator root must install (spec §4.5 point 1, §5 "Panic discipline",
/// §7 "Panics"): a caught panic becomes a structured [`Error::Internal`]
/// on the normal error path rather than unwinding across the operator
/// boundary, and this still drives the same close-output/notify-parent
/// exit as any other outcome (the caller, not this function, owns that —
/// see `run_once` contract above).
pub async fn run_with_recovery(
	op: Arc<dyn Operator>,
	ctx: Arc<Context>,
	output: channel::Sender<AnnotatedValue>,
	stop: watch::Receiver<bool>,
	parent: ParentLink,
) -> Result<(), Error> {
	let handle = tokio::spawn(async move { op.run_once(ctx, output, stop, parent).await });
	match handle.await {
		Ok(result) => result,
		Err(join_err) => Err(Error::from(join_err)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn run_once_guard_fires_exactly_once() {
		let guard = RunOnceGuard::default();
		assert!(guard.take());
		assert!(!guard.take());
		assert!(!guard.take());
	}
}
