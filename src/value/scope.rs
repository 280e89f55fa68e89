use super::Value;
use std::sync::Arc;

/// A [`Value`] plus a parent `ScopeValue`, forming a lexical scope chain
/// (spec §3.1). Used by formalization to resolve identifiers against the
/// set of in-scope aliases, and by `FOR`/`LET`/`ANY`/`EVERY` bindings at
/// evaluation time.
#[derive(Clone, Debug, Default)]
pub struct ScopeValue {
	value: Value,
	parent: Option<Arc<ScopeValue>>,
}

impl ScopeValue {
	pub fn new(value: Value) -> Self {
		Self {
			value,
			parent: None,
		}
	}

	/// Pushes a fresh scope whose parent is `self` (spec §4.2 bindings
	/// rule). The binding's variables must be registered into `value`
	/// before the surrounding expression body is formalized against it.
	pub fn push(self: &Arc<Self>, value: Value) -> ScopeValue {
		ScopeValue {
			value,
			parent: Some(Arc::clone(self)),
		}
	}

	/// Field lookup walks inner-to-outer (spec §3.1): the innermost scope
	/// that defines `name` wins.
	pub fn lookup(&self, name: &str) -> Value {
		let here = self.value.get_field(name);
		if !here.is_missing() {
			return here;
		}
		match &self.parent {
			Some(parent) => parent.lookup(name),
			None => Value::Missing,
		}
	}

	/// Whether `name` is defined anywhere in this scope chain, used by
	/// formalization to decide whether a bare identifier should be kept as
	/// an identifier (spec §4.2 rule 1).
	pub fn defines(&self, name: &str) -> bool {
		if !self.value.get_field(name).is_missing() {
			return true;
		}
		match &self.parent {
			Some(parent) => parent.defines(name),
			None => false,
		}
	}

	/// Mutates the innermost scope only (spec §4.1 `SetField` on a
	/// `ScopeValue`).
	pub fn set_field(&mut self, name: impl Into<String>, val: Value) {
		self.value.set_field(name, val);
	}
}
