//! The statement algebra (spec §3.3): the typed tree a parser produces
//! and [`formalize`] rewrites, which the planner (`crate::planner`) turns
//! into a physical [`crate::plan::PlanNode`] tree.
mod fetch;
mod formalize;
mod from;
mod projection;

pub use fetch::Fetch;
pub use formalize::formalize;
pub use from::{FromTerm, JoinKind};
pub use projection::{Field, GroupBy, OrderBy, OrderDirection, Projection};

use crate::expr::Expression;

/// A single `SET`/`UNSET` mutation (spec §3.3 `UpdateStatement`).
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
	Set {
		path: Expression,
		value: Expression,
	},
	Unset {
		path: Expression,
	},
}

/// `UPDATE ... FOR var IN source [WHEN cond] { mutations }` (SPEC_FULL.md
/// supplemented feature: UPDATE-FOR loop bindings).
#[derive(Clone, Debug, PartialEq)]
pub struct ForLoop {
	pub var: String,
	pub source: Expression,
	pub when: Option<Expression>,
	pub body: Vec<Mutation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Select {
	/// `None` for a `FROM`-less `SELECT` of constants (spec §8 "Empty
	/// `FROM`...yields exactly one row"); the planner answers it with a
	/// single [`crate::plan::PlanNode::UnitRow`] rather than any scan.
	pub from: Option<FromTerm>,
	pub cond: Option<Expression>,
	pub projection: Projection,
	pub group_by: Option<GroupBy>,
	pub having: Option<Expression>,
	pub order_by: Vec<OrderBy>,
	pub offset: Option<Expression>,
	pub limit: Option<Expression>,
	pub fetch: Vec<Fetch>,
	/// Spec §4.5: a request-level hint, not a guarantee; the planner may
	/// still choose not to parallelize a plan that carries it.
	pub parallel: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Update {
	pub from: FromTerm,
	pub cond: Option<Expression>,
	pub mutations: Vec<Mutation>,
	pub for_loops: Vec<ForLoop>,
	pub returning: Option<Projection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Delete {
	pub from: FromTerm,
	pub cond: Option<Expression>,
	pub returning: Option<Projection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
	pub into: String,
	pub documents: Vec<Expression>,
	pub returning: Option<Projection>,
}

/// The `WHEN MATCHED` branch of a `MERGE` (spec §3.3): a matched source
/// row either updates or deletes the target document it matched.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeMatchedAction {
	Update(Vec<Mutation>),
	Delete,
}

/// `MERGE INTO into USING source ON on WHEN MATCHED THEN ... WHEN NOT
/// MATCHED THEN INSERT ...` (SPEC_FULL.md §3.3 addition): `source` drives
/// iteration, `on` is the key-match predicate against `into`, and each
/// source row takes the matched or not-matched branch depending on
/// whether `on` found an existing target document.
#[derive(Clone, Debug, PartialEq)]
pub struct Merge {
	pub into: String,
	pub source: FromTerm,
	pub on: Expression,
	pub when_matched: Option<MergeMatchedAction>,
	/// The document to insert for a source row with no match, built from
	/// `source`'s columns.
	pub when_not_matched: Option<Expression>,
	pub returning: Option<Projection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateIndex {
	pub keyspace: String,
	pub index_name: String,
	pub keys: Vec<Expression>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DropIndex {
	pub keyspace: String,
	pub index_name: String,
}

/// The statement sum (spec §3.3). `CreateIndex`/`DropIndex`/`Explain`/
/// `Prepare`/`Execute` are thin per SPEC_FULL.md §3.3: they carry no
/// predicate/projection surface of their own and exist to round out the
/// external interface (spec §6), not to add planner complexity.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Statement {
	Select(Select),
	Update(Update),
	Delete(Delete),
	Insert(Insert),
	Merge(Merge),
	CreateIndex(CreateIndex),
	DropIndex(DropIndex),
	/// Wraps another statement, asking the planner to return its plan's
	/// `#operator` document tree instead of executing it (spec §6).
	Explain(Box<Statement>),
	/// Registers a statement under a name for later `Execute` (spec §6
	/// "prepared-statement caching").
	Prepare {
		name: String,
		statement: Box<Statement>,
	},
	Execute {
		name: String,
		positional_args: Vec<Expression>,
		named_args: Vec<(String, Expression)>,
	},
}
