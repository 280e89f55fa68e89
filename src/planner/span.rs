//! `SargSpans` (spec §3.5): the sargability domain the planner composes
//! index ranges in.
use crate::cnf::FULL_SPAN_FANOUT;
use crate::value::Value;
use std::fmt;

/// A range bound. `Unbounded` on both ends of a `Range` with equal
/// inclusive endpoints degenerates to a point span.
#[derive(Clone, Debug, PartialEq)]
pub enum Bound {
	Unbounded,
	Inclusive(Value),
	Exclusive(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Range {
	pub low: Bound,
	pub high: Bound,
}

impl Range {
	pub fn point(v: Value) -> Self {
		Range {
			low: Bound::Inclusive(v.clone()),
			high: Bound::Inclusive(v),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
enum Kind {
	Empty,
	Full,
	Term(Range),
	Union(Vec<SargSpans>),
	Intersect(Vec<SargSpans>),
	/// The right-to-left cartesian composition across composite-key
	/// positions (spec §3.5 `Compose`); `parts` is ordered left to right
	/// as composed so far.
	Composite(Vec<SargSpans>),
}

/// An index range description (spec §3.5). `EMPTY_SPANS`/`FULL_SPANS` are
/// sentinels reached via [`SargSpans::empty`]/[`SargSpans::full`]; every
/// other variant is built up by the sargability visitor in
/// `crate::planner::sarg`.
#[derive(Clone, Debug, PartialEq)]
pub struct SargSpans {
	kind: Kind,
	exact: bool,
}

impl SargSpans {
	pub fn empty() -> Self {
		SargSpans {
			kind: Kind::Empty,
			exact: true,
		}
	}

	pub fn full() -> Self {
		SargSpans {
			kind: Kind::Full,
			exact: false,
		}
	}

	pub fn term(range: Range, exact: bool) -> Self {
		SargSpans {
			kind: Kind::Term(range),
			exact,
		}
	}

	pub fn union(parts: Vec<SargSpans>) -> Self {
		let exact = parts.iter().all(|p| p.exact);
		let parts = parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>();
		if parts.is_empty() {
			return SargSpans::empty();
		}
		SargSpans {
			kind: Kind::Union(parts),
			exact,
		}
	}

	/// Pairwise-reduces overlapping `Term` ranges down to their actual
	/// intersection (detecting contradictions, spec §8 "predicate that
	/// simplifies to contradiction"); anything else falls back to an
	/// opaque `Intersect` wrapper.
	pub fn intersect(parts: Vec<SargSpans>) -> Self {
		let mut iter = parts.into_iter();
		let first = match iter.next() {
			Some(p) => p,
			None => return SargSpans::empty(),
		};
		iter.fold(first, intersect_two)
	}

	pub fn is_empty(&self) -> bool {
		matches!(self.kind, Kind::Empty)
	}

	pub fn is_full(&self) -> bool {
		matches!(self.kind, Kind::Full)
	}

	/// Whether `value` falls inside this span. Used by index-scan style
	/// operators (and by the in-memory test datastore) to turn a
	/// `SargSpans` into an actual predicate over concrete values; not
	/// part of the spec's own `SargSpans` surface, which only composes
	/// and measures spans rather than evaluating them.
	pub fn contains(&self, value: &Value) -> bool {
		match &self.kind {
			Kind::Empty => false,
			Kind::Full => true,
			Kind::Term(range) => range_contains(range, value),
			Kind::Union(parts) => parts.iter().any(|p| p.contains(value)),
			Kind::Intersect(parts) => parts.iter().all(|p| p.contains(value)),
			Kind::Composite(parts) => parts.iter().all(|p| p.contains(value)),
		}
	}

	/// Cardinality estimate (spec §3.5 `Size()`). `Full` is unbounded and
	/// reported as `usize::MAX` so any fan-out multiplication involving it
	/// saturates rather than wraps.
	pub fn size(&self) -> usize {
		match &self.kind {
			Kind::Empty => 0,
			Kind::Full => usize::MAX,
			Kind::Term(_) => 1,
			Kind::Union(parts) => parts.iter().fold(0usize, |acc, p| acc.saturating_add(p.size())),
			Kind::Intersect(parts) => parts.iter().map(SargSpans::size).min().unwrap_or(0),
			Kind::Composite(parts) => {
				parts.iter().fold(1usize, |acc, p| acc.saturating_mul(p.size()))
			}
		}
	}

	pub fn exact(&self) -> bool {
		self.exact
	}

	pub fn set_exact(&mut self, exact: bool) {
		self.exact = exact;
	}

	/// Deep copy before mutating composition (spec §3.5 `Copy()`). A plain
	/// `clone()` suffices since every variant owns its data.
	pub fn copy(&self) -> Self {
		self.clone()
	}

	/// Cartesian composition with the next (more-significant) key's spans
	/// (spec §3.5 `Compose(rhs)`), used right-to-left over composite
	/// index keys in `crate::planner::sarg::compose_keys`.
	pub fn compose(self, rhs: SargSpans) -> SargSpans {
		if self.is_empty() || rhs.is_empty() {
			return SargSpans::empty();
		}
		let exact = self.exact && rhs.exact;
		let parts = match self.kind {
			Kind::Composite(mut parts) => {
				parts.push(rhs);
				parts
			}
			other => vec![
				SargSpans {
					kind: other,
					exact: self.exact,
				},
				rhs,
			],
		};
		SargSpans {
			kind: Kind::Composite(parts),
			exact,
		}
	}

	/// Normalises the span tree (spec §3.5 `Streamline()`): drops empty
	/// union/intersect members and collapses a singleton union/composite
	/// down to its only member.
	pub fn streamline(self) -> SargSpans {
		match self.kind {
			Kind::Union(parts) => {
				let parts: Vec<_> =
					parts.into_iter().map(SargSpans::streamline).filter(|p| !p.is_empty()).collect();
				match parts.len() {
					0 => SargSpans::empty(),
					1 => parts.into_iter().next().unwrap(),
					_ => SargSpans::union(parts),
				}
			}
			Kind::Intersect(parts) => {
				let parts: Vec<_> = parts.into_iter().map(SargSpans::streamline).collect();
				if parts.iter().any(SargSpans::is_empty) {
					return SargSpans::empty();
				}
				match parts.len() {
					1 => parts.into_iter().next().unwrap(),
					_ => SargSpans::intersect(parts),
				}
			}
			Kind::Composite(parts) => {
				let parts: Vec<_> = parts.into_iter().map(SargSpans::streamline).collect();
				if parts.iter().any(SargSpans::is_empty) {
					return SargSpans::empty();
				}
				SargSpans {
					exact: parts.iter().all(|p| p.exact),
					kind: Kind::Composite(parts),
				}
			}
			kind => SargSpans {
				kind,
				exact: self.exact,
			},
		}
	}

	/// Truncates a composite composition once the running fan-out
	/// product would exceed [`FULL_SPAN_FANOUT`] (spec §4.4
	/// "Truncation"). Used by `crate::planner::sarg::compose_keys`, which
	/// walks keys right-to-left and calls this incrementally rather than
	/// after the fact, since the condition depends on the running
	/// product, not the finished composite's total size.
	pub fn would_overflow_fanout(running_size: usize, next_size: usize) -> bool {
		running_size > 1 && next_size > 1 && running_size.saturating_mul(next_size) > FULL_SPAN_FANOUT
	}
}

fn intersect_two(a: SargSpans, b: SargSpans) -> SargSpans {
	if a.is_empty() || b.is_empty() {
		return SargSpans::empty();
	}
	let exact = a.exact && b.exact;
	if a.is_full() {
		return SargSpans {
			kind: b.kind,
			exact,
		};
	}
	if b.is_full() {
		return SargSpans {
			kind: a.kind,
			exact,
		};
	}
	match (&a.kind, &b.kind) {
		(Kind::Term(ra), Kind::Term(rb)) => match range_intersect(ra, rb) {
			Some(r) => SargSpans::term(r, exact),
			None => SargSpans::empty(),
		},
		_ => SargSpans {
			kind: Kind::Intersect(vec![a, b]),
			exact,
		},
	}
}

fn range_intersect(a: &Range, b: &Range) -> Option<Range> {
	let low = max_low(&a.low, &b.low);
	let high = min_high(&a.high, &b.high);
	if bounds_empty(&low, &high) {
		None
	} else {
		Some(Range {
			low,
			high,
		})
	}
}

fn max_low(a: &Bound, b: &Bound) -> Bound {
	match (a, b) {
		(Bound::Unbounded, other) => other.clone(),
		(other, Bound::Unbounded) => other.clone(),
		_ => {
			let (av, _) = bound_value(a).unwrap();
			let (bv, _) = bound_value(b).unwrap();
			if av > bv {
				a.clone()
			} else if bv > av {
				b.clone()
			} else if matches!(a, Bound::Exclusive(_)) {
				a.clone()
			} else {
				b.clone()
			}
		}
	}
}

fn min_high(a: &Bound, b: &Bound) -> Bound {
	match (a, b) {
		(Bound::Unbounded, other) => other.clone(),
		(other, Bound::Unbounded) => other.clone(),
		_ => {
			let (av, _) = bound_value(a).unwrap();
			let (bv, _) = bound_value(b).unwrap();
			if av < bv {
				a.clone()
			} else if bv < av {
				b.clone()
			} else if matches!(a, Bound::Exclusive(_)) {
				a.clone()
			} else {
				b.clone()
			}
		}
	}
}

fn bound_value(b: &Bound) -> Option<(&crate::value::Value, bool)> {
	match b {
		Bound::Unbounded => None,
		Bound::Inclusive(v) => Some((v, true)),
		Bound::Exclusive(v) => Some((v, false)),
	}
}

fn range_contains(range: &Range, value: &Value) -> bool {
	let low_ok = match &range.low {
		Bound::Unbounded => true,
		Bound::Inclusive(v) => value >= v,
		Bound::Exclusive(v) => value > v,
	};
	let high_ok = match &range.high {
		Bound::Unbounded => true,
		Bound::Inclusive(v) => value <= v,
		Bound::Exclusive(v) => value < v,
	};
	low_ok && high_ok
}

fn bounds_empty(low: &Bound, high: &Bound) -> bool {
	match (bound_value(low), bound_value(high)) {
		(Some((lv, linc)), Some((hv, hinc))) => {
			if lv > hv {
				true
			} else if lv == hv {
				!(linc && hinc)
			} else {
				false
			}
		}
		_ => false,
	}
}

impl fmt::Display for SargSpans {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.kind {
			Kind::Empty => write!(f, "EMPTY_SPANS"),
			Kind::Full => write!(f, "FULL_SPANS"),
			Kind::Term(range) => write!(f, "{range:?}"),
			Kind::Union(parts) => {
				write!(f, "Union[")?;
				write_joined(f, parts)?;
				write!(f, "]")
			}
			Kind::Intersect(parts) => {
				write!(f, "Intersect[")?;
				write_joined(f, parts)?;
				write!(f, "]")
			}
			Kind::Composite(parts) => {
				write!(f, "Composite[")?;
				write_joined(f, parts)?;
				write!(f, "]")
			}
		}
	}
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[SargSpans]) -> fmt::Result {
	for (i, p) in parts.iter().enumerate() {
		if i > 0 {
			write!(f, ", ")?;
		}
		write!(f, "{p}")?;
	}
	Ok(())
}
