//! The planner/execution-facing datastore abstraction (spec §6
//! "Planner↔Datastore" / "Execution↔Datastore" / "Request↔Execution").
//! Everything here is a trait: the engine is storage-agnostic, and the
//! only concrete implementation in this crate is the in-memory
//! `mock` used by tests.
#[cfg(test)]
pub mod mock;

use crate::err::Error;
use crate::expr::{EvalContext, Expression};
use crate::planner::span::SargSpans;
use crate::value::{AnnotatedValue, Value};
use std::time::Instant;

/// A capability an [`Index`] may or may not support, downcast for at
/// plan-build time (spec §6 "capability downcasts (e.g. CountIndex2,
/// SecondaryIndex with order)"). Modeled as a closed enum rather than
/// `Any`-based downcasting since every capability this engine plans
/// around is known statically here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
	/// Can answer `COUNT(*)` from its own metadata, no scan required.
	Count,
	/// Can answer `COUNT(DISTINCT key)` from its own metadata.
	CountDistinct,
	/// Guarantees the keys it scans are already distinct.
	Distinct,
	/// Preserves the composite key's declared order while scanning.
	Ordered,
}

/// An index over one keyspace's documents (spec §6 `Index`).
pub trait Index: Send + Sync {
	fn id(&self) -> &str;

	/// The composite key expressions this index is built over, in
	/// leading-to-trailing order (spec §3.5, planner §4.4 `keys`).
	fn range_key(&self) -> &[Expression];

	/// A partial index's predicate, if any; documents failing it are not
	/// present in the index at all (spec §6 `Condition()`).
	fn condition(&self) -> Option<&Expression>;

	fn supports(&self, capability: Capability) -> bool;

	/// Scans the index over `spans`, returning matching documents.
	/// `exact` tells the caller whether the caller must still apply the
	/// original predicate as a residual filter.
	fn scan(&self, spans: &SargSpans, exact: bool) -> Result<Vec<AnnotatedValue>, Error>;

	/// Valid only when [`Capability::Count`]/[`Capability::CountDistinct`]
	/// is supported.
	fn scan_count(&self, spans: &SargSpans, distinct: bool) -> Result<u64, Error>;
}

/// A keyspace's index catalog (spec §6 `Indexer`).
pub trait Indexer: Send + Sync {
	fn indexes(&self) -> Vec<&dyn Index>;
	fn index_by_id(&self, id: &str) -> Option<&dyn Index>;
	fn index_by_name(&self, name: &str) -> Option<&dyn Index>;
}

/// A named collection of JSON documents (spec §GLOSSARY `Keyspace`,
/// §6 `Keyspace`).
pub trait Keyspace: Send + Sync {
	fn namespace(&self) -> &str;
	fn name(&self) -> &str;

	fn indexer(&self, using: &str) -> Option<&dyn Indexer>;

	/// Primary-key fetch/scan, used when no secondary index applies.
	fn fetch(&self, spans: &SargSpans) -> Result<Vec<AnnotatedValue>, Error>;

	fn insert(&self, doc: Value) -> Result<(), Error>;
	fn update(&self, key: &Value, doc: Value) -> Result<(), Error>;
	fn delete(&self, key: &Value) -> Result<(), Error>;
}

/// Resolves a keyspace reference the planner holds as a bare
/// `(namespace, name)` pair (spec §6 "Planner↔Datastore").
pub trait Catalog: Send + Sync {
	fn keyspace(&self, namespace: &str, name: &str) -> Option<&dyn Keyspace>;
}

/// The request-level surface execution reads from (spec §6
/// "Request↔Execution"): parameter bindings, resource limits,
/// credentials, and the deadline the root operator's stop is wired to.
pub trait Request: EvalContext {
	fn max_parallelism(&self) -> usize;
	fn deadline(&self) -> Option<Instant>;
	fn credentials(&self) -> &Credentials;
}

/// An opaque authentication/authorization token (SPEC_FULL.md
/// supplemented feature: `Credentials` opaque type). The engine never
/// inspects it; it is threaded from the request down to datastore calls
/// that need to authorize against it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials(pub Option<String>);
