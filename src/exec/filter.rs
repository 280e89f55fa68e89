//! A concrete operator demonstrating the `Operator` contract end to end
//! (spec §4.5): pulls from `input`, evaluates `predicate` against each
//! item, forwards the item unchanged when the predicate is truthy.
use super::context::Context;
use super::operator::{wait_for_stop, Operator, ParentLink};
use crate::err::Error;
use crate::expr::Expression;
use crate::value::AnnotatedValue;
use std::sync::Arc;
use tokio::sync::watch;

pub struct Filter {
	input: channel::Receiver<AnnotatedValue>,
	predicate: Expression,
}

impl Filter {
	pub fn new(input: channel::Receiver<AnnotatedValue>, predicate: Expression) -> Self {
		Self {
			input,
			predicate,
		}
	}
}

struct NoParams;
impl crate::expr::EvalContext for NoParams {
	fn positional_arg(&self, _index: usize) -> Option<&crate::value::Value> {
		None
	}
	fn named_arg(&self, _name: &str) -> Option<&crate::value::Value> {
		None
	}
}

#[async_trait::async_trait]
impl Operator for Filter {
	async fn run_once(
		self: Arc<Self>,
		ctx: Arc<Context>,
		output: channel::Sender<AnnotatedValue>,
		mut stop: watch::Receiver<bool>,
		parent: ParentLink,
	) -> Result<(), Error> {
		loop {
			if ctx.is_cancelled() || *stop.borrow() {
				break;
			}
			// Race the stop signal against the blocking recv so a stop sent
			// while parked here is seen immediately, not only once the next
			// item arrives or input closes (spec §5 cooperative cancellation).
			tokio::select! {
				_ = wait_for_stop(&mut stop) => break,
				item = self.input.recv() => {
					let item = match item {
						Ok(item) => item,
						Err(_) => break,
					};
					if self.predicate.evaluate(&item, &NoParams)?.is_truthy() {
						if output.send(item).await.is_err() {
							break;
						}
					}
				}
			}
		}
		drop(output);
		parent.notify().await;
		Ok(())
	}

	fn copy(&self) -> Arc<dyn Operator> {
		Arc::new(Filter {
			input: self.input.clone(),
			predicate: self.predicate.clone(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::datastore::Credentials;
	use crate::expr::CompareOp;
	use crate::value::{Object, Value};

	fn doc(n: f64) -> AnnotatedValue {
		let mut obj = Object::default();
		obj.insert("n".to_string(), Value::Number(n));
		AnnotatedValue::new(Value::Object(obj))
	}

	#[tokio::test]
	async fn forwards_only_items_matching_the_predicate() {
		let (in_tx, in_rx) = super::super::operator::item_channel();
		let (out_tx, out_rx) = super::super::operator::item_channel();
		let (_stop_tx, stop_rx) = super::super::operator::stop_channel();
		let (parent_tx, _parent_rx) = channel::bounded::<()>(1);

		for n in [1.0, 5.0, 10.0] {
			in_tx.send(doc(n)).await.unwrap();
		}
		drop(in_tx);

		let predicate = Expression::Compare {
			op: CompareOp::GreaterThan,
			l: Box::new(Expression::identifier("n")),
			r: Box::new(Expression::constant(3.0)),
		};
		let filter = Arc::new(Filter::new(in_rx, predicate));
		let ctx = Context::new(1, None, Credentials::default());
		filter.run_once(ctx, out_tx, stop_rx, ParentLink::new(parent_tx)).await.unwrap();

		let mut results = Vec::new();
		while let Ok(item) = out_rx.recv().await {
			results.push(item.value.get_field("n"));
		}
		assert_eq!(results, vec![Value::Number(5.0), Value::Number(10.0)]);
	}
}
