//! `Parallel(child)` (spec §4.6): replicates `child` across
//! `N = context.max_parallelism()` independent copies sharing one
//! `input`/`output` channel pair, grounded on the teacher's
//! `dbs/store/parallel.rs` task-fan-out-with-merge shape but built on
//! this crate's `Operator`/channel primitives rather than
//! `tokio::sync::mpsc` directly.
use super::context::Context;
use super::operator::{run_with_recovery, wait_for_stop, Operator, ParentLink};
use crate::err::Error;
use crate::value::AnnotatedValue;
use std::sync::Arc;

pub struct Parallel {
	child: Arc<dyn Operator>,
}

impl Parallel {
	pub fn new(child: Arc<dyn Operator>) -> Self {
		Self {
			child,
		}
	}
}

#[async_trait::async_trait]
impl Operator for Parallel {
	async fn run_once(
		self: Arc<Self>,
		ctx: Arc<Context>,
		output: channel::Sender<AnnotatedValue>,
		mut stop: tokio::sync::watch::Receiver<bool>,
		parent: ParentLink,
	) -> Result<(), Error> {
		let n = ctx.max_parallelism().max(1);
		let mut handles = Vec::with_capacity(n);
		let (child_stop_tx, child_stop_rx) = super::operator::stop_channel();
		let (child_notify_tx, child_notify_rx) = channel::bounded::<()>(n);

		for _ in 0..n {
			let copy = self.child.copy();
			let ctx = ctx.clone();
			let output = output.clone();
			let child_stop_rx = child_stop_rx.clone();
			let child_parent = ParentLink::new(child_notify_tx.clone());
			handles.push(tokio::spawn(run_with_recovery(copy, ctx, output, child_stop_rx, child_parent)));
		}
		drop(child_notify_tx);

		let mut completed = 0usize;
		let mut first_error: Option<Error> = None;
		while completed < n {
			tokio::select! {
				_ = wait_for_stop(&mut stop) => {
					// `watch::send` broadcasts to every clone, so every
					// child observes this, not just whichever one happens
					// to win a race on a shared receiver (spec §4.6).
					let _ = child_stop_tx.send(true);
					break;
				}
				notice = child_notify_rx.recv() => {
					if notice.is_ok() {
						completed += 1;
					} else {
						break;
					}
				}
			}
		}

		for handle in handles {
			match handle.await {
				Ok(Ok(())) => {}
				Ok(Err(e)) if first_error.is_none() => first_error = Some(e),
				Err(join_err) if first_error.is_none() => first_error = Some(Error::from(join_err)),
				_ => {}
			}
		}

		drop(output);
		parent.notify().await;
		match first_error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	fn copy(&self) -> Arc<dyn Operator> {
		Arc::new(Parallel {
			child: self.child.copy(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::datastore::Credentials;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Echo(Arc<AtomicUsize>);

	#[async_trait::async_trait]
	impl Operator for Echo {
		async fn run_once(
			self: Arc<Self>,
			_ctx: Arc<Context>,
			output: channel::Sender<AnnotatedValue>,
			_stop: tokio::sync::watch::Receiver<bool>,
			parent: ParentLink,
		) -> Result<(), Error> {
			self.0.fetch_add(1, Ordering::SeqCst);
			let _ = output.send(AnnotatedValue::new(crate::value::Value::Number(1.0))).await;
			drop(output);
			parent.notify().await;
			Ok(())
		}

		fn copy(&self) -> Arc<dyn Operator> {
			Arc::new(Echo(self.0.clone()))
		}
	}

	#[tokio::test]
	async fn fans_out_to_max_parallelism_workers() {
		let runs = Arc::new(AtomicUsize::new(0));
		let parallel = Arc::new(Parallel::new(Arc::new(Echo(runs.clone()))));
		let ctx = Context::new(4, None, Credentials::default());
		let (out_tx, out_rx) = super::super::operator::item_channel();
		let (_stop_tx, stop_rx) = super::super::operator::stop_channel();
		let (parent_tx, parent_rx) = channel::bounded::<()>(1);
		let parent = ParentLink::new(parent_tx);

		let handle = tokio::spawn(run_with_recovery(parallel, ctx, out_tx, stop_rx, parent));

		let mut count = 0;
		while out_rx.recv().await.is_ok() {
			count += 1;
		}
		handle.await.unwrap().unwrap();
		assert_eq!(count, 4);
		assert_eq!(runs.load(Ordering::SeqCst), 4);
		assert!(parent_rx.try_recv().is_ok());
	}
}
