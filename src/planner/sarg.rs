//! Sargability (spec §4.4): deriving an index-range description from a
//! predicate and a composite key list.
use super::span::{Bound, Range, SargSpans};
use crate::expr::{CompareOp, Expression};

/// Top-level entry point. `keys` is the index's composite key list in
/// its natural (leading-to-trailing) order; `min` is the prefix length
/// the caller wants guaranteed-matched, `total` the upper bound of keys
/// to ever consider (spec §4.4 parameters).
pub fn sarg(pred: &Expression, keys: &[Expression], min: usize, total: usize) -> (SargSpans, bool) {
	if let Expression::Or(..) = pred {
		return sarg_or(pred, keys, total);
	}
	compose_keys(pred, keys, min.min(total))
}

fn flatten_or<'a>(pred: &'a Expression, out: &mut Vec<&'a Expression>) {
	match pred {
		Expression::Or(l, r) => {
			flatten_or(l, out);
			flatten_or(r, out);
		}
		other => out.push(other),
	}
}

/// The top-level OR shortcut (spec §4.4): each disjunct is sarged
/// independently against its own sargable prefix length, then the
/// resulting spans are unioned. Overall exactness is the conjunction of
/// every disjunct's exactness, since a single inexact disjunct means the
/// union as a whole needs a residual filter.
fn sarg_or(pred: &Expression, keys: &[Expression], total: usize) -> (SargSpans, bool) {
	let mut disjuncts = Vec::new();
	flatten_or(pred, &mut disjuncts);
	let mut per_child = Vec::with_capacity(disjuncts.len());
	let mut exact = true;
	for child in disjuncts {
		let prefix = sargable_prefix_len(child, keys).clamp(1, total.max(1));
		let (spans, child_exact) = sarg(child, keys, prefix, total);
		exact = exact && child_exact;
		per_child.push(spans);
	}
	let spans = SargSpans::union(per_child).streamline();
	if spans.is_empty() {
		return (SargSpans::empty(), true);
	}
	(spans, exact)
}

/// `SargableFor` (spec §4.4): how many leading keys `pred` can bind,
/// measured by walking `keys` left to right until one produces
/// `FULL_SPANS` (unsargable for that key).
pub fn sargable_prefix_len(pred: &Expression, keys: &[Expression]) -> usize {
	let mut n = 0;
	for key in keys {
		let (spans, _) = sarg_for_key(pred, key);
		if spans.is_full() {
			break;
		}
		n += 1;
	}
	n
}

/// Base case plus composition plus truncation (spec §4.4 "Base case" /
/// "Composition" / "Truncation"). `min` keys (the statement's natural,
/// leading-to-trailing order) are visited; the retained prefix is then
/// composed right to left.
fn compose_keys(pred: &Expression, keys: &[Expression], min: usize) -> (SargSpans, bool) {
	let consider = min.min(keys.len());
	let per_key: Vec<(SargSpans, bool)> = keys[..consider].iter().map(|k| sarg_for_key(pred, k)).collect();

	// Truncation: walk left to right (leading key first) and stop at the
	// first key whose inclusion would blow the running fan-out past
	// FULL_SPAN_FANOUT; keep only the retained leading prefix (spec §9
	// "Open question" — the exact condition is preserved verbatim in
	// `SargSpans::would_overflow_fanout`).
	let mut running = 1usize;
	let mut usable = per_key.len();
	let mut truncated = false;
	for (i, (spans, _)) in per_key.iter().enumerate() {
		let sz = spans.size();
		if SargSpans::would_overflow_fanout(running, sz) {
			usable = i;
			truncated = true;
			break;
		}
		running = running.saturating_mul(sz.max(1));
	}

	if usable == 0 {
		return (SargSpans::full(), false);
	}

	let mut ns: Option<SargSpans> = None;
	let mut composed_exact = true;
	for (spans, exact) in per_key[..usable].iter().rev() {
		if spans.size() == 0 {
			ns = None;
			continue;
		}
		composed_exact = composed_exact && *exact;
		ns = Some(match ns {
			None => spans.clone(),
			Some(acc) => acc.copy().compose(spans.clone()).streamline(),
		});
		if ns.as_ref().is_some_and(SargSpans::is_empty) {
			return (SargSpans::empty(), true);
		}
	}

	let mut result = match ns {
		Some(r) => r,
		None => return (SargSpans::empty(), true),
	};
	if truncated {
		composed_exact = false;
	}
	// A composed (or even single-key) span whose own cardinality already
	// exceeds the fan-out ceiling needs a residual filter regardless of
	// the per-step truncation walk above (spec §3.5 "Fan-out after
	// composition is bounded by FULL_SPAN_FANOUT ... forces Exact=false").
	if result.size() > crate::cnf::FULL_SPAN_FANOUT {
		composed_exact = false;
	}
	result.set_exact(composed_exact);
	(result, composed_exact)
}

/// The per-key sarg visitor (spec §4.4 "Base case"): pattern-matches
/// `pred`'s shape against a single key expression `key`.
fn sarg_for_key(pred: &Expression, key: &Expression) -> (SargSpans, bool) {
	match pred {
		Expression::Compare {
			op,
			l,
			r,
		} => sarg_compare(*op, l, r, key),
		Expression::Between {
			expr,
			low,
			high,
		} if expr.equivalent_to(key) => match (as_constant(low), as_constant(high)) {
			(Some(low), Some(high)) => (
				SargSpans::term(
					Range {
						low: Bound::Inclusive(low),
						high: Bound::Inclusive(high),
					},
					true,
				),
				true,
			),
			_ => (SargSpans::full(), false),
		},
		Expression::In {
			expr,
			list,
		} if expr.equivalent_to(key) => {
			let mut values = Vec::with_capacity(list.len());
			for item in list {
				match as_constant(item) {
					Some(v) => values.push(SargSpans::term(Range::point(v), true)),
					None => return (SargSpans::full(), false),
				}
			}
			(SargSpans::union(values), true)
		}
		Expression::IsNull(e) if e.equivalent_to(key) => {
			(SargSpans::term(Range::point(crate::value::Value::Null), true), true)
		}
		Expression::IsMissing(e) if e.equivalent_to(key) => {
			(SargSpans::term(Range::point(crate::value::Value::Missing), true), true)
		}
		Expression::And(l, r) => {
			// A conjunct that never mentions this key imposes no
			// constraint on it and is dropped rather than intersected,
			// so an unrelated conjunct (captured by a different
			// composite-key position) cannot drag this key's
			// exactness down to false.
			match (references_key(l, key), references_key(r, key)) {
				(true, true) => {
					let (ls, le) = sarg_for_key(l, key);
					let (rs, re) = sarg_for_key(r, key);
					(SargSpans::intersect(vec![ls, rs]).streamline(), le && re)
				}
				(true, false) => sarg_for_key(l, key),
				(false, true) => sarg_for_key(r, key),
				(false, false) => (SargSpans::full(), true),
			}
		}
		Expression::Or(l, r) => {
			let (ls, le) = sarg_for_key(l, key);
			let (rs, re) = sarg_for_key(r, key);
			(SargSpans::union(vec![ls, rs]).streamline(), le && re)
		}
		_ => (SargSpans::full(), false),
	}
}

fn sarg_compare(op: CompareOp, l: &Expression, r: &Expression, key: &Expression) -> (SargSpans, bool) {
	let (target, value) = if l.equivalent_to(key) {
		(l, as_constant(r))
	} else if r.equivalent_to(key) {
		(r, as_constant(l))
	} else {
		(l, None)
	};
	let value = match value {
		Some(v) => v,
		None => return (SargSpans::full(), false),
	};
	let _ = target;
	let range = match op {
		CompareOp::Equal => Range::point(value),
		CompareOp::LessThan => Range {
			low: Bound::Unbounded,
			high: Bound::Exclusive(value),
		},
		CompareOp::LessThanOrEqual => Range {
			low: Bound::Unbounded,
			high: Bound::Inclusive(value),
		},
		CompareOp::GreaterThan => Range {
			low: Bound::Exclusive(value),
			high: Bound::Unbounded,
		},
		CompareOp::GreaterThanOrEqual => Range {
			low: Bound::Inclusive(value),
			high: Bound::Unbounded,
		},
		CompareOp::NotEqual | CompareOp::Like => return (SargSpans::full(), false),
	};
	(SargSpans::term(range, true), true)
}

/// Whether `key` appears anywhere in `expr`'s tree, used to tell a
/// conjunct that genuinely doesn't sarg for this key apart from one that
/// simply doesn't mention it.
fn references_key(expr: &Expression, key: &Expression) -> bool {
	if expr.equivalent_to(key) {
		return true;
	}
	expr.children().into_iter().any(|child| references_key(child, key))
}

fn as_constant(expr: &Expression) -> Option<crate::value::Value> {
	match expr {
		Expression::Constant(v) => Some(v.clone()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::Value;

	fn key(name: &str) -> Expression {
		Expression::identifier(name)
	}

	#[test]
	fn scenario_1_point_equality_on_single_key() {
		let pred = Expression::Compare {
			op: CompareOp::Equal,
			l: Box::new(key("a")),
			r: Box::new(Expression::constant(5.0)),
		};
		let (spans, exact) = sarg(&pred, &[key("a")], 1, 1);
		assert!(exact);
		assert_eq!(spans.size(), 1);
	}

	#[test]
	fn scenario_2_composite_key_composes_point_and_range() {
		let pred = Expression::And(
			Box::new(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(key("a")),
				r: Box::new(Expression::constant(1.0)),
			}),
			Box::new(Expression::Between {
				expr: Box::new(key("b")),
				low: Box::new(Expression::constant(2.0)),
				high: Box::new(Expression::constant(10.0)),
			}),
		);
		let (spans, exact) = sarg(&pred, &[key("a"), key("b")], 2, 2);
		assert!(exact);
		assert_eq!(spans.size(), 1);
	}

	#[test]
	fn scenario_3_or_of_two_points_unions_after_streamline() {
		let pred = Expression::Or(
			Box::new(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(key("a")),
				r: Box::new(Expression::constant(1.0)),
			}),
			Box::new(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(key("a")),
				r: Box::new(Expression::constant(2.0)),
			}),
		);
		let (spans, exact) = sarg(&pred, &[key("a")], 1, 1);
		assert!(exact);
		assert_eq!(spans.size(), 2);
	}

	#[test]
	fn scenario_4_large_in_list_truncates_and_goes_inexact() {
		let list: Vec<Expression> = (0..10_000).map(|i| Expression::constant(i as f64)).collect();
		let pred = Expression::In {
			expr: Box::new(key("a")),
			list,
		};
		// compose with a second key so the fan-out-based truncation check
		// (which requires two keys both > 1) actually engages.
		let second = Expression::Compare {
			op: CompareOp::Equal,
			l: Box::new(key("b")),
			r: Box::new(Expression::constant(1.0)),
		};
		let combined = Expression::And(Box::new(pred), Box::new(second));
		let (_spans, exact) = sarg(&combined, &[key("a"), key("b")], 2, 2);
		assert!(!exact);
	}

	#[test]
	fn contradictory_predicate_yields_empty_spans_exact() {
		let pred = Expression::And(
			Box::new(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(key("a")),
				r: Box::new(Expression::constant(1.0)),
			}),
			Box::new(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(key("a")),
				r: Box::new(Expression::constant(2.0)),
			}),
		);
		let (spans, exact) = sarg(&pred, &[key("a")], 1, 1);
		assert!(spans.is_empty());
		assert!(exact);
		let _ = Value::Missing;
	}
}
