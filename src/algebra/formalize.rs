use super::{
	Delete, Field, ForLoop, FromTerm, Insert, Merge, MergeMatchedAction, Mutation, Projection,
	Select, Statement, Update,
};
use crate::err::Error;
use crate::expr;
use crate::value::{Object, ScopeValue, Value};
use std::sync::Arc;

/// Formalizes a whole statement (spec §4.3): validates alias uniqueness
/// across its `FROM` tree, builds the top-level lexical scope from those
/// aliases, and rewrites every [`crate::expr::Expression`] the statement
/// carries via [`expr::formalize`] against that scope and the tree's
/// primary alias.
pub fn formalize(statement: Statement) -> Result<Statement, Error> {
	Ok(match statement {
		Statement::Select(s) => Statement::Select(formalize_select(s)?),
		Statement::Update(u) => Statement::Update(formalize_update(u)?),
		Statement::Delete(d) => Statement::Delete(formalize_delete(d)?),
		Statement::Insert(i) => Statement::Insert(formalize_insert(i)?),
		Statement::Merge(m) => Statement::Merge(formalize_merge(m)?),
		Statement::Explain(inner) => Statement::Explain(Box::new(formalize(*inner)?)),
		Statement::Prepare {
			name,
			statement,
		} => Statement::Prepare {
			name,
			statement: Box::new(formalize(*statement)?),
		},
		other @ (Statement::CreateIndex(_) | Statement::DropIndex(_) | Statement::Execute {
			..
		}) => other,
	})
}

fn top_level_scope(from: &FromTerm) -> Result<Arc<ScopeValue>, Error> {
	let aliases = from.aliases();
	let mut seen = std::collections::HashSet::new();
	let mut obj = Object::default();
	for alias in aliases {
		if !seen.insert(alias) {
			return Err(Error::semantic(format!("duplicate alias in FROM clause: {alias}")));
		}
		obj.insert(alias.to_string(), Value::Null);
	}
	Ok(Arc::new(ScopeValue::new(Value::Object(obj))))
}

fn empty_scope() -> Arc<ScopeValue> {
	Arc::new(ScopeValue::new(Value::Object(Object::default())))
}

fn formalize_select(mut s: Select) -> Result<Select, Error> {
	let (scope, primary) = match &s.from {
		Some(from) => (top_level_scope(from)?, Some(from.primary_alias().to_string())),
		None => (empty_scope(), None),
	};
	let primary = primary.as_deref();
	s.cond = s.cond.map(|c| expr::formalize(c, &scope, primary)).transpose()?;
	s.having = s.having.map(|c| expr::formalize(c, &scope, primary)).transpose()?;
	s.projection = formalize_projection(s.projection, &scope, primary)?;
	s.group_by = s
		.group_by
		.map(|group| -> Result<super::GroupBy, Error> {
			Ok(super::GroupBy {
				keys: group
					.keys
					.into_iter()
					.map(|k| expr::formalize(k, &scope, primary))
					.collect::<Result<_, _>>()?,
			})
		})
		.transpose()?;
	s.order_by = s
		.order_by
		.into_iter()
		.map(|order| -> Result<super::OrderBy, Error> {
			Ok(super::OrderBy {
				expr: expr::formalize(order.expr, &scope, primary)?,
				direction: order.direction,
			})
		})
		.collect::<Result<_, _>>()?;
	s.offset = s.offset.map(|e| expr::formalize(e, &scope, primary)).transpose()?;
	s.limit = s.limit.map(|e| expr::formalize(e, &scope, primary)).transpose()?;
	s.fetch = s
		.fetch
		.into_iter()
		.map(|fetch| -> Result<super::Fetch, Error> {
			Ok(super::Fetch {
				path: expr::formalize(fetch.path, &scope, primary)?,
			})
		})
		.collect::<Result<_, _>>()?;
	Ok(s)
}

fn formalize_update(mut u: Update) -> Result<Update, Error> {
	let scope = top_level_scope(&u.from)?;
	let primary = Some(u.from.primary_alias());
	u.cond = u.cond.map(|c| expr::formalize(c, &scope, primary)).transpose()?;
	u.mutations =
		u.mutations.into_iter().map(|m| formalize_mutation(m, &scope, primary)).collect::<Result<_, _>>()?;
	u.for_loops =
		u.for_loops.into_iter().map(|f| formalize_for_loop(f, &scope, primary)).collect::<Result<_, _>>()?;
	u.returning = u.returning.map(|p| formalize_projection(p, &scope, primary)).transpose()?;
	Ok(u)
}

fn formalize_delete(mut d: Delete) -> Result<Delete, Error> {
	let scope = top_level_scope(&d.from)?;
	let primary = Some(d.from.primary_alias());
	d.cond = d.cond.map(|c| expr::formalize(c, &scope, primary)).transpose()?;
	d.returning = d.returning.map(|p| formalize_projection(p, &scope, primary)).transpose()?;
	Ok(d)
}

/// `INSERT` has no `FROM` tree: the sole scope is the target keyspace's
/// own alias (spec §4.3, the statement's target doubles as its primary
/// keyspace).
fn formalize_insert(mut i: Insert) -> Result<Insert, Error> {
	let scope = empty_scope();
	let primary = Some(i.into.as_str());
	i.documents = i.documents.into_iter().map(|d| expr::formalize(d, &scope, primary)).collect::<Result<_, _>>()?;
	i.returning = i.returning.map(|p| formalize_projection(p, &scope, primary)).transpose()?;
	Ok(i)
}

/// `MERGE`'s scope is built from its `source` `FROM` term plus the target
/// keyspace's own alias, so `on`/`when_matched`/`when_not_matched` can
/// reference either side (spec §4.3, SPEC_FULL.md §3.3 addition).
fn formalize_merge(mut m: Merge) -> Result<Merge, Error> {
	let mut obj = Object::default();
	obj.insert(m.into.clone(), Value::Null);
	for alias in m.source.aliases() {
		if !obj.contains_key(alias) {
			obj.insert(alias.to_string(), Value::Null);
		}
	}
	let scope = Arc::new(ScopeValue::new(Value::Object(obj)));
	let primary = Some(m.into.as_str());

	m.on = expr::formalize(m.on, &scope, primary)?;
	m.when_matched = m
		.when_matched
		.map(|action| -> Result<MergeMatchedAction, Error> {
			Ok(match action {
				MergeMatchedAction::Update(mutations) => MergeMatchedAction::Update(
					mutations.into_iter().map(|mu| formalize_mutation(mu, &scope, primary)).collect::<Result<_, _>>()?,
				),
				MergeMatchedAction::Delete => MergeMatchedAction::Delete,
			})
		})
		.transpose()?;
	m.when_not_matched = m.when_not_matched.map(|doc| expr::formalize(doc, &scope, primary)).transpose()?;
	m.returning = m.returning.map(|p| formalize_projection(p, &scope, primary)).transpose()?;
	Ok(m)
}

fn formalize_mutation(m: Mutation, scope: &Arc<ScopeValue>, primary: Option<&str>) -> Result<Mutation, Error> {
	Ok(match m {
		Mutation::Set {
			path,
			value,
		} => Mutation::Set {
			path: expr::formalize(path, scope, primary)?,
			value: expr::formalize(value, scope, primary)?,
		},
		Mutation::Unset {
			path,
		} => Mutation::Unset {
			path: expr::formalize(path, scope, primary)?,
		},
	})
}

fn formalize_for_loop(f: ForLoop, scope: &Arc<ScopeValue>, primary: Option<&str>) -> Result<ForLoop, Error> {
	let source = expr::formalize(f.source, scope, primary)?;
	let mut obj = Object::default();
	obj.insert(f.var.clone(), Value::Null);
	let inner_scope = Arc::new(scope.push(Value::Object(obj)));
	Ok(ForLoop {
		var: f.var,
		source,
		when: f.when.map(|w| expr::formalize(w, &inner_scope, primary)).transpose()?,
		body: f.body.into_iter().map(|m| formalize_mutation(m, &inner_scope, primary)).collect::<Result<_, _>>()?,
	})
}

fn formalize_projection(mut p: Projection, scope: &Arc<ScopeValue>, primary: Option<&str>) -> Result<Projection, Error> {
	p.fields = p
		.fields
		.into_iter()
		.map(|field| -> Result<Field, Error> {
			Ok(match field {
				Field::All {
					alias,
				} => Field::All {
					alias,
				},
				Field::Single {
					expr,
					alias,
				} => Field::Single {
					expr: expr::formalize(expr, scope, primary)?,
					alias,
				},
			})
		})
		.collect::<Result<_, _>>()?;
	Ok(p)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::algebra::FromTerm;
	use crate::expr::{Expression, PathPart};

	fn select_with_cond(cond: Expression) -> Select {
		Select {
			from: Some(FromTerm::Keyspace {
				keyspace: "orders".into(),
				alias: "orders".into(),
			}),
			cond: Some(cond),
			projection: Projection {
				fields: vec![Field::All {
					alias: None,
				}],
				distinct: false,
			},
			group_by: None,
			having: None,
			order_by: vec![],
			offset: None,
			limit: None,
			fetch: vec![],
			parallel: false,
		}
	}

	#[test]
	fn bare_field_reference_resolves_to_primary_keyspace() {
		let select = select_with_cond(Expression::identifier("status"));
		let formalized = formalize_select(select).unwrap();
		assert_eq!(
			formalized.cond,
			Some(Expression::Path {
				base: Box::new(Expression::identifier("orders")),
				part: PathPart::Field("status".into()),
			})
		);
	}

	#[test]
	fn duplicate_alias_is_rejected() {
		let from = FromTerm::Join {
			kind: crate::algebra::JoinKind::Inner,
			left: Box::new(FromTerm::Keyspace {
				keyspace: "a".into(),
				alias: "x".into(),
			}),
			right: Box::new(FromTerm::Keyspace {
				keyspace: "b".into(),
				alias: "x".into(),
			}),
			on: Expression::constant(true),
		};
		assert!(top_level_scope(&from).is_err());
	}

	#[test]
	fn from_less_select_with_bare_identifier_is_undefined() {
		let select = Select {
			from: None,
			cond: None,
			projection: Projection {
				fields: vec![Field::Single {
					expr: Expression::identifier("status"),
					alias: None,
				}],
				distinct: false,
			},
			group_by: None,
			having: None,
			order_by: vec![],
			offset: None,
			limit: None,
			fetch: vec![],
			parallel: false,
		};
		assert!(formalize_select(select).is_err());
	}

	#[test]
	fn from_less_select_of_constants_formalizes() {
		let select = Select {
			from: None,
			cond: None,
			projection: Projection {
				fields: vec![Field::Single {
					expr: Expression::constant(1.0),
					alias: Some("one".into()),
				}],
				distinct: false,
			},
			group_by: None,
			having: None,
			order_by: vec![],
			offset: None,
			limit: None,
			fetch: vec![],
			parallel: false,
		};
		assert!(formalize_select(select).is_ok());
	}
}
