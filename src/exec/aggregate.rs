//! Aggregate hook pattern (spec §4.7): `Default`/`CumulateInitial`/
//! `CumulateIntermediate`/`ComputeFinal`, with DISTINCT variants keyed
//! off an `Attachment::DedupSet` rather than a separate code path, so
//! `SUM(DISTINCT x)` and `SUM(x)` share every hook but the first.
//!
//! `CumulateIntermediate` must be associative and commutative: it is the
//! merge step `Parallel`'s fan-in relies on (spec §8 scenario 5), so every
//! implementation here satisfies
//! `Final(Intermediate(A(R1), A(R2))) == A(R1 ⊎ R2)`.
use crate::value::{Attachment, TryArith, Value, ValueKey};

/// One running aggregate computation (spec §4.7). `item` is the already
///-evaluated argument expression's value for the current input row;
/// `acc` is the accumulator this hook reads and returns the next state
/// of.
pub trait Aggregate: Send + Sync {
	fn default(&self) -> Value;
	fn cumulate_initial(&self, item: &Value, acc: Value) -> Value;
	fn cumulate_intermediate(&self, partial: &Value, acc: Value) -> Value;
	fn compute_final(&self, acc: Value) -> Value;
}

pub struct Count;

impl Aggregate for Count {
	fn default(&self) -> Value {
		Value::Number(0.0)
	}
	fn cumulate_initial(&self, item: &Value, acc: Value) -> Value {
		if item.is_null_or_missing() {
			acc
		} else {
			acc.try_add(Value::Number(1.0))
		}
	}
	fn cumulate_intermediate(&self, partial: &Value, acc: Value) -> Value {
		acc.try_add(partial.clone())
	}
	fn compute_final(&self, acc: Value) -> Value {
		acc
	}
}

pub struct Sum;

impl Aggregate for Sum {
	fn default(&self) -> Value {
		Value::Null
	}
	fn cumulate_initial(&self, item: &Value, acc: Value) -> Value {
		match item.as_number() {
			Some(_) if acc.is_null() => item.clone(),
			Some(_) => acc.try_add(item.clone()),
			None => acc,
		}
	}
	fn cumulate_intermediate(&self, partial: &Value, acc: Value) -> Value {
		match (acc.is_null(), partial.is_null()) {
			(true, _) => partial.clone(),
			(false, true) => acc,
			(false, false) => acc.try_add(partial.clone()),
		}
	}
	fn compute_final(&self, acc: Value) -> Value {
		acc
	}
}

pub struct Avg;

/// `AVG`'s accumulator is a two-element `[sum, count]` array so the
/// merge step can recombine partial sums and counts before dividing
/// exactly once, at `compute_final` (spec §4.7 merge-correctness: a
/// naive average of partial averages is not associative, so the
/// accumulator carries enough state to avoid that).
impl Aggregate for Avg {
	fn default(&self) -> Value {
		Value::Array(vec![Value::Number(0.0), Value::Number(0.0)])
	}
	fn cumulate_initial(&self, item: &Value, acc: Value) -> Value {
		let Some(n) = item.as_number() else {
			return acc;
		};
		let (sum, count) = unpack_pair(&acc);
		pack_pair(sum + n, count + 1.0)
	}
	fn cumulate_intermediate(&self, partial: &Value, acc: Value) -> Value {
		let (sum_a, count_a) = unpack_pair(&acc);
		let (sum_b, count_b) = unpack_pair(partial);
		pack_pair(sum_a + sum_b, count_a + count_b)
	}
	fn compute_final(&self, acc: Value) -> Value {
		let (sum, count) = unpack_pair(&acc);
		if count == 0.0 {
			Value::Null
		} else {
			Value::Number(sum / count)
		}
	}
}

fn unpack_pair(v: &Value) -> (f64, f64) {
	match v.as_array() {
		Some([a, b, ..]) => (a.as_number().unwrap_or(0.0), b.as_number().unwrap_or(0.0)),
		_ => (0.0, 0.0),
	}
}

fn pack_pair(sum: f64, count: f64) -> Value {
	Value::Array(vec![Value::Number(sum), Value::Number(count)])
}

pub struct Min;

impl Aggregate for Min {
	fn default(&self) -> Value {
		Value::Null
	}
	fn cumulate_initial(&self, item: &Value, acc: Value) -> Value {
		cumulate_extreme(item, acc, |a, b| a < b)
	}
	fn cumulate_intermediate(&self, partial: &Value, acc: Value) -> Value {
		cumulate_extreme(partial, acc, |a, b| a < b)
	}
	fn compute_final(&self, acc: Value) -> Value {
		acc
	}
}

pub struct Max;

impl Aggregate for Max {
	fn default(&self) -> Value {
		Value::Null
	}
	fn cumulate_initial(&self, item: &Value, acc: Value) -> Value {
		cumulate_extreme(item, acc, |a, b| a > b)
	}
	fn cumulate_intermediate(&self, partial: &Value, acc: Value) -> Value {
		cumulate_extreme(partial, acc, |a, b| a > b)
	}
	fn compute_final(&self, acc: Value) -> Value {
		acc
	}
}

fn cumulate_extreme(item: &Value, acc: Value, better: impl Fn(&Value, &Value) -> bool) -> Value {
	if item.is_null_or_missing() {
		return acc;
	}
	if acc.is_null() || better(item, &acc) {
		item.clone()
	} else {
		acc
	}
}

pub struct ArrayAgg;

impl Aggregate for ArrayAgg {
	fn default(&self) -> Value {
		Value::Array(Vec::new())
	}
	fn cumulate_initial(&self, item: &Value, acc: Value) -> Value {
		push(acc, item.clone())
	}
	fn cumulate_intermediate(&self, partial: &Value, acc: Value) -> Value {
		let mut items = match acc {
			Value::Array(a) => a,
			_ => Vec::new(),
		};
		if let Some(more) = partial.as_array() {
			items.extend_from_slice(more);
		}
		Value::Array(items)
	}
	fn compute_final(&self, acc: Value) -> Value {
		acc
	}
}

fn push(acc: Value, item: Value) -> Value {
	let mut items = match acc {
		Value::Array(a) => a,
		_ => Vec::new(),
	};
	items.push(item);
	Value::Array(items)
}

/// Wraps an [`Aggregate`] with DISTINCT semantics (spec §4.7 "attach a
/// `set` attachment"). Since an aggregate's accumulator must itself be a
/// plain `Value` to cross a `Parallel` fan-out boundary (spec §4.7), the
/// dedup set here is carried as the accumulator's own shape — a
/// `[seen_items, inner_acc]` pair — rather than as a side-channel
/// `Attachment`; `cumulate_intermediate` unions two partitions' seen
/// sets and folds in only the newly-seen items before resuming the
/// inner aggregate, so a value repeated across partitions is still
/// only ever counted once overall (spec §8 scenario 5).
pub struct Distinct<A: Aggregate> {
	pub inner: A,
}

fn unpack_distinct(v: Value) -> (Vec<Value>, Value) {
	if let Value::Array(mut items) = v {
		if items.len() == 2 {
			let inner_acc = items.pop().unwrap();
			let seen = match items.pop().unwrap() {
				Value::Array(a) => a,
				_ => Vec::new(),
			};
			return (seen, inner_acc);
		}
	}
	(Vec::new(), Value::Null)
}

fn pack_distinct(seen: Vec<Value>, inner_acc: Value) -> Value {
	Value::Array(vec![Value::Array(seen), inner_acc])
}

impl<A: Aggregate> Aggregate for Distinct<A> {
	fn default(&self) -> Value {
		pack_distinct(Vec::new(), self.inner.default())
	}

	fn cumulate_initial(&self, item: &Value, acc: Value) -> Value {
		if item.is_null_or_missing() {
			return acc;
		}
		let (mut seen, mut inner_acc) = unpack_distinct(acc);
		let key = ValueKey::from(item);
		if seen.iter().any(|v| ValueKey::from(v) == key) {
			return pack_distinct(seen, inner_acc);
		}
		inner_acc = self.inner.cumulate_initial(item, inner_acc);
		seen.push(item.clone());
		pack_distinct(seen, inner_acc)
	}

	fn cumulate_intermediate(&self, partial: &Value, acc: Value) -> Value {
		let (mut seen, mut inner_acc) = unpack_distinct(acc);
		let (partial_seen, _) = unpack_distinct(partial.clone());
		for item in partial_seen {
			let key = ValueKey::from(&item);
			if seen.iter().any(|v| ValueKey::from(v) == key) {
				continue;
			}
			inner_acc = self.inner.cumulate_initial(&item, inner_acc);
			seen.push(item);
		}
		pack_distinct(seen, inner_acc)
	}

	fn compute_final(&self, acc: Value) -> Value {
		let (_, inner_acc) = unpack_distinct(acc);
		self.inner.compute_final(inner_acc)
	}
}

/// A row-level dedup check independent of the `Aggregate` hooks above —
/// used by a streaming `DISTINCT` operator that needs to admit each
/// output row once, backed by the `Attachment::DedupSet` side channel
/// rather than an aggregate accumulator.
pub fn observe_once(seen: &mut Attachment, value: &Value) -> bool {
	match seen {
		Attachment::DedupSet(set) => set.insert(ValueKey::from(value)),
		_ => true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn merge_across_partition<A: Aggregate>(agg: &A, left: &[Value], right: &[Value]) -> Value {
		let left_acc = left.iter().fold(agg.default(), |acc, v| agg.cumulate_initial(v, acc));
		let right_acc = right.iter().fold(agg.default(), |acc, v| agg.cumulate_initial(v, acc));
		let merged = agg.cumulate_intermediate(&right_acc, left_acc);
		agg.compute_final(merged)
	}

	fn whole<A: Aggregate>(agg: &A, all: &[Value]) -> Value {
		let acc = all.iter().fold(agg.default(), |acc, v| agg.cumulate_initial(v, acc));
		agg.compute_final(acc)
	}

	#[test]
	fn sum_merge_matches_whole_partition() {
		let left = vec![Value::Number(1.0), Value::Number(2.0)];
		let right = vec![Value::Number(3.0), Value::Number(4.0)];
		let all: Vec<_> = left.iter().cloned().chain(right.iter().cloned()).collect();
		assert_eq!(merge_across_partition(&Sum, &left, &right), whole(&Sum, &all));
		assert_eq!(whole(&Sum, &all), Value::Number(10.0));
	}

	#[test]
	fn count_merge_matches_whole_partition() {
		let left = vec![Value::Number(1.0), Value::Null];
		let right = vec![Value::Number(3.0)];
		let all: Vec<_> = left.iter().cloned().chain(right.iter().cloned()).collect();
		assert_eq!(merge_across_partition(&Count, &left, &right), whole(&Count, &all));
		assert_eq!(whole(&Count, &all), Value::Number(2.0));
	}

	#[test]
	fn avg_merge_matches_whole_partition_not_average_of_averages() {
		let left = vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)];
		let right = vec![Value::Number(10.0)];
		let all: Vec<_> = left.iter().cloned().chain(right.iter().cloned()).collect();
		assert_eq!(merge_across_partition(&Avg, &left, &right), whole(&Avg, &all));
		assert_eq!(whole(&Avg, &all), Value::Number(4.0));
	}

	#[test]
	fn max_merge_matches_whole_partition() {
		let left = vec![Value::Number(1.0), Value::Number(9.0)];
		let right = vec![Value::Number(5.0)];
		let all: Vec<_> = left.iter().cloned().chain(right.iter().cloned()).collect();
		assert_eq!(merge_across_partition(&Max, &left, &right), whole(&Max, &all));
		assert_eq!(whole(&Max, &all), Value::Number(9.0));
	}

	#[test]
	fn distinct_dedup_set_admits_each_value_once() {
		let mut seen = Attachment::DedupSet(Default::default());
		assert!(observe_once(&mut seen, &Value::Number(1.0)));
		assert!(!observe_once(&mut seen, &Value::Number(1.0)));
		assert!(observe_once(&mut seen, &Value::Number(2.0)));
	}

	#[test]
	fn sum_distinct_dedups_values_repeated_across_partitions() {
		let agg = Distinct {
			inner: Sum,
		};
		let partitions = [
			vec![Value::Number(1.0), Value::Number(2.0)],
			vec![Value::Number(2.0), Value::Number(3.0)],
			vec![Value::Number(3.0), Value::Number(1.0)],
		];
		let partials: Vec<Value> = partitions
			.iter()
			.map(|part| part.iter().fold(agg.default(), |acc, v| agg.cumulate_initial(v, acc)))
			.collect();
		let merged = partials
			.into_iter()
			.reduce(|acc, partial| agg.cumulate_intermediate(&partial, acc))
			.unwrap();
		assert_eq!(agg.compute_final(merged), Value::Number(6.0));
	}
}
