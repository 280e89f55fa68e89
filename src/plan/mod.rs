//! The physical plan (spec §3.4): a DAG of operators carrying only
//! static configuration. Runtime state lives in the execution-time twins
//! under `crate::exec`; a `PlanNode` tree is immutable and reusable
//! across executions of the same prepared statement.
mod serialize;

pub use serialize::PlanDoc;

use crate::algebra::{Field, JoinKind, MergeMatchedAction, OrderDirection, Projection};
use crate::expr::Expression;
use crate::planner::span::SargSpans;

/// An index handle the plan references abstractly by the triple the
/// datastore resolves against (spec §4.8 "references
/// `(namespace, keyspace, using, index_id)`").
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRef {
	pub namespace: String,
	pub keyspace: String,
	pub using: String,
	pub index_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScanSpec {
	pub index: IndexRef,
	pub spans: SargSpans,
	pub exact: bool,
}

/// A single plan operator (spec §3.4). Children of `Sequence`/`Parallel`
/// are themselves `PlanNode`s; all other variants carry exactly one
/// logical input, threaded implicitly by pipeline position rather than
/// as a boxed field, except where a variant's shape needs one (`Filter`,
/// `Project`, ... wrap their upstream explicitly since they are also
/// constructed standalone by the planner before being chained).
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum PlanNode {
	/// Primary-key range/point scan: no secondary index involved.
	PrimaryScan {
		keyspace: String,
		spans: SargSpans,
		exact: bool,
	},
	/// Secondary index range/point scan (spec §8 scenario 1/2/3/4).
	IndexScan(ScanSpec),
	/// `COUNT(*)` answered from the index's cardinality alone
	/// (SPEC_FULL.md supplemented feature: `ScanCount`).
	ScanCount(ScanSpec),
	/// `COUNT(DISTINCT key)` answered from a distinct-capable index
	/// (SPEC_FULL.md supplemented feature: `ScanCountDistinct`).
	ScanCountDistinct(ScanSpec),
	/// A scan whose index already guarantees distinct keys, letting the
	/// planner drop a downstream `Distinct` (SPEC_FULL.md supplemented
	/// feature: `ScanDistinct`).
	ScanDistinct(ScanSpec),
	Fetch {
		input: Box<PlanNode>,
		keyspace: String,
	},
	Join {
		kind: JoinKind,
		left: Box<PlanNode>,
		right: Box<PlanNode>,
		on: Expression,
		/// Back-reference to the outer (left) scan (SPEC_FULL.md
		/// supplemented feature: `scan_parent.go`'s parent-scan linkage),
		/// recorded at planning time so the right-hand child can recover
		/// the outer row's key without re-walking from the plan root.
		/// Distinct from the execution-time `ParentLink` of
		/// `crate::exec::operator`, which exists only for completion
		/// notification.
		parent: Option<Box<PlanNode>>,
	},
	Nest {
		left: Box<PlanNode>,
		right: Box<PlanNode>,
		on: Expression,
		alias: String,
		parent: Option<Box<PlanNode>>,
	},
	Unnest {
		input: Box<PlanNode>,
		path: Expression,
		alias: String,
		outer: bool,
		parent: Option<Box<PlanNode>>,
	},
	Filter {
		input: Box<PlanNode>,
		predicate: Expression,
	},
	Project {
		input: Box<PlanNode>,
		fields: Vec<Field>,
	},
	GroupInitial {
		input: Box<PlanNode>,
		keys: Vec<Expression>,
	},
	/// Re-merges partial accumulators produced by independent workers
	/// (spec §4.7 `CumulateIntermediate`); only meaningful downstream of
	/// a `Parallel` whose children each ran `GroupInitial`.
	GroupIntermediate {
		input: Box<PlanNode>,
		keys: Vec<Expression>,
	},
	GroupFinal {
		input: Box<PlanNode>,
		having: Option<Expression>,
	},
	Order {
		input: Box<PlanNode>,
		keys: Vec<(Expression, OrderDirection)>,
	},
	Offset {
		input: Box<PlanNode>,
		count: Expression,
	},
	Limit {
		input: Box<PlanNode>,
		count: Expression,
	},
	Distinct {
		input: Box<PlanNode>,
	},
	/// Replicates `child` across `N = context.max_parallelism()` workers
	/// (spec §4.6). `N` is an execution-time decision, not baked into the
	/// plan.
	Parallel {
		child: Box<PlanNode>,
	},
	/// Runs its children in the listed order, threading each one's output
	/// as the next one's input.
	Sequence {
		stages: Vec<PlanNode>,
	},
	UnionAll {
		inputs: Vec<PlanNode>,
	},
	Intersect {
		left: Box<PlanNode>,
		right: Box<PlanNode>,
	},
	Except {
		left: Box<PlanNode>,
		right: Box<PlanNode>,
	},
	SendInsert {
		input: Box<PlanNode>,
		keyspace: String,
	},
	/// `MERGE` (SPEC_FULL.md §3.3 addition): `input` scans the `USING`
	/// source; each row is matched against `keyspace` by `on`, then takes
	/// `when_matched` or `when_not_matched` depending on whether a target
	/// document matched.
	SendMerge {
		input: Box<PlanNode>,
		keyspace: String,
		on: Expression,
		when_matched: Option<MergeMatchedAction>,
		when_not_matched: Option<Expression>,
	},
	SendUpdate {
		input: Box<PlanNode>,
		keyspace: String,
	},
	SendDelete {
		input: Box<PlanNode>,
		keyspace: String,
	},
	/// `SELECT` of constants with no `FROM` (spec §8 "Empty FROM ... yields
	/// exactly one row"): a single-row, zero-column source.
	UnitRow,
}

impl PlanNode {
	pub fn wrap_parallel(self) -> PlanNode {
		PlanNode::Parallel {
			child: Box::new(self),
		}
	}

	pub fn then_filter(self, predicate: Expression) -> PlanNode {
		PlanNode::Filter {
			input: Box::new(self),
			predicate,
		}
	}

	pub fn then_project(self, fields: Vec<Field>) -> PlanNode {
		PlanNode::Project {
			input: Box::new(self),
			fields,
		}
	}

	pub fn then_offset(self, count: Expression) -> PlanNode {
		PlanNode::Offset {
			input: Box::new(self),
			count,
		}
	}

	pub fn then_limit(self, count: Expression) -> PlanNode {
		PlanNode::Limit {
			input: Box::new(self),
			count,
		}
	}
}

/// `SELECT expr, expr AS alias` reduced to what `Project` needs; kept
/// separate from [`Projection`] only because `Projection` also carries
/// the `distinct` flag the planner consumes itself (emitting a
/// `Distinct`/`ScanDistinct` node) rather than threading through.
pub fn project_fields(projection: &Projection) -> Vec<Field> {
	projection.fields.clone()
}
