use super::{Expression, PathPart};
use crate::err::Error;
use crate::value::{ScopeValue, Value};
use std::sync::Arc;

/// Resolves every bare [`Expression::Identifier`] against the lexical
/// scope (spec §4.2): a name already bound in `scope` (a `FROM`-clause
/// alias, a `LET` binding, a loop variable) is left alone; otherwise, if
/// a primary keyspace is defined, it's rewritten as a field path off
/// `primary_alias`; if there is no primary keyspace (a `FROM`-less
/// statement, spec §8 "empty FROM"), formalization fails with
/// "undefined identifier" (spec §4.2 rule 3).
///
/// Idempotent when a primary keyspace is present: `primary_alias` is
/// itself registered in the top-level scope, so re-running this pass
/// over its own output is a no-op (spec §4.2 "formalization is
/// idempotent").
pub fn formalize(
	expr: Expression,
	scope: &Arc<ScopeValue>,
	primary_alias: Option<&str>,
) -> Result<Expression, Error> {
	match expr {
		Expression::Identifier(name) => {
			if scope.defines(&name) {
				Ok(Expression::Identifier(name))
			} else {
				match primary_alias {
					Some(primary) => Ok(Expression::Path {
						base: Box::new(Expression::Identifier(primary.to_string())),
						part: PathPart::Field(name),
					}),
					None => Err(Error::semantic(format!("undefined identifier: {name}"))),
				}
			}
		}
		Expression::Quantified {
			every,
			var,
			source,
			predicate,
		} => {
			let source = Box::new(formalize(*source, scope, primary_alias)?);
			let inner_scope = Arc::new(scope.push(mark_defined(&var)));
			let predicate = Box::new(formalize(*predicate, &inner_scope, primary_alias)?);
			Ok(Expression::Quantified {
				every,
				var,
				source,
				predicate,
			})
		}
		other => other.try_map_children(|child| formalize(child, scope, primary_alias)),
	}
}

fn mark_defined(var: &str) -> Value {
	let mut obj = crate::value::Object::default();
	obj.insert(var.to_string(), Value::Null);
	Value::Object(obj)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::expr::{CompareOp, PathPart};

	fn scope_with(aliases: &[&str]) -> Arc<ScopeValue> {
		let mut obj = crate::value::Object::default();
		for a in aliases {
			obj.insert((*a).to_string(), Value::Null);
		}
		Arc::new(ScopeValue::new(Value::Object(obj)))
	}

	#[test]
	fn bare_identifier_not_in_scope_becomes_primary_path() {
		let scope = scope_with(&["orders"]);
		let formalized = formalize(Expression::identifier("status"), &scope, Some("orders")).unwrap();
		assert_eq!(
			formalized,
			Expression::Path {
				base: Box::new(Expression::identifier("orders")),
				part: PathPart::Field("status".into()),
			}
		);
	}

	#[test]
	fn keyspace_alias_identifier_is_left_alone() {
		let scope = scope_with(&["orders"]);
		let formalized = formalize(Expression::identifier("orders"), &scope, Some("orders")).unwrap();
		assert_eq!(formalized, Expression::identifier("orders"));
	}

	#[test]
	fn formalization_is_idempotent() {
		let scope = scope_with(&["orders"]);
		let once = formalize(Expression::identifier("status"), &scope, Some("orders")).unwrap();
		let twice = formalize(once.clone(), &scope, Some("orders")).unwrap();
		assert_eq!(once, twice);
	}

	#[test]
	fn quantifier_variable_is_visible_inside_predicate_only() {
		let scope = scope_with(&["orders"]);
		let tree = Expression::Quantified {
			every: false,
			var: "item".into(),
			source: Box::new(Expression::identifier("lines")),
			predicate: Box::new(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(Expression::identifier("item")),
				r: Box::new(Expression::constant(1.0)),
			}),
		};
		let formalized = formalize(tree, &scope, Some("orders")).unwrap();
		match formalized {
			Expression::Quantified {
				source,
				predicate,
				..
			} => {
				assert_eq!(
					*source,
					Expression::Path {
						base: Box::new(Expression::identifier("orders")),
						part: PathPart::Field("lines".into()),
					}
				);
				match *predicate {
					Expression::Compare {
						l,
						..
					} => assert_eq!(*l, Expression::identifier("item")),
					_ => panic!("expected compare"),
				}
			}
			_ => panic!("expected quantified"),
		}
	}

	#[test]
	fn bare_identifier_with_no_primary_keyspace_is_undefined() {
		let scope = scope_with(&[]);
		let err = formalize(Expression::identifier("status"), &scope, None).unwrap_err();
		assert!(matches!(err, Error::Semantic(msg) if msg.contains("undefined identifier")));
	}
}
