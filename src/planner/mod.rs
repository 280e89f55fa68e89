//! Translates a formalized [`crate::algebra::Statement`] into a physical
//! [`crate::plan::PlanNode`] (spec §4.4), choosing index scans over
//! table scans wherever a predicate sargs against an available index.
pub mod sarg;
pub mod span;

use crate::algebra::{Delete, Field, FromTerm, Insert, Merge, Select, Statement, Update};
use crate::datastore::{Capability, Catalog};
use crate::err::Error;
use crate::expr::Expression;
use crate::plan::{IndexRef, PlanNode, ScanSpec};

/// Upper bound on composite-key positions the planner will ever sarg
/// against (spec §4.4 `total` parameter) — wide enough for any realistic
/// index, a backstop rather than a tuning knob.
const MAX_KEY_POSITIONS: usize = 16;

pub fn plan(statement: &Statement, catalog: &dyn Catalog) -> Result<PlanNode, Error> {
	match statement {
		Statement::Select(select) => plan_select(select, catalog),
		Statement::Update(update) => plan_update(update, catalog),
		Statement::Delete(delete) => plan_delete(delete, catalog),
		Statement::Insert(insert) => Ok(plan_insert(insert)),
		Statement::Merge(merge) => plan_merge(merge, catalog),
		Statement::Explain(inner) => plan(inner, catalog),
		Statement::Prepare {
			statement,
			..
		} => plan(statement, catalog),
		Statement::Execute {
			..
		} => Err(Error::plan("EXECUTE must be resolved against a cached prepared plan")),
		Statement::CreateIndex(_) | Statement::DropIndex(_) => Ok(PlanNode::UnitRow),
	}
}

fn plan_select(select: &Select, catalog: &dyn Catalog) -> Result<PlanNode, Error> {
	let Some(from) = &select.from else {
		// Empty FROM (spec §8 "yields exactly one row"): a single
		// zero-column row, still subject to projection/offset/limit.
		let mut node = PlanNode::UnitRow;
		node = node.then_project(crate::plan::project_fields(&select.projection));
		if let Some(offset) = &select.offset {
			node = node.then_offset(offset.clone());
		}
		if let Some(limit) = &select.limit {
			node = node.then_limit(limit.clone());
		}
		return Ok(node);
	};

	if let Some(node) = try_plan_count_scan(select, from, catalog)? {
		return Ok(node);
	}
	if let Some(node) = try_plan_distinct_scan(select, from, catalog)? {
		return Ok(node);
	}

	let mut node = plan_from(from, select.cond.as_ref(), catalog)?;
	if let Some(cond) = &select.cond {
		node = node.then_filter(cond.clone());
	}
	if let Some(group) = &select.group_by {
		node = PlanNode::GroupInitial {
			input: Box::new(node),
			keys: group.keys.clone(),
		};
		node = PlanNode::GroupFinal {
			input: Box::new(node),
			having: select.having.clone(),
		};
	}
	if !select.order_by.is_empty() {
		node = PlanNode::Order {
			input: Box::new(node),
			keys: select.order_by.iter().map(|o| (o.expr.clone(), o.direction)).collect(),
		};
	}
	if select.projection.distinct {
		node = PlanNode::Distinct {
			input: Box::new(node),
		};
	}
	node = node.then_project(crate::plan::project_fields(&select.projection));
	if let Some(offset) = &select.offset {
		node = node.then_offset(offset.clone());
	}
	if let Some(limit) = &select.limit {
		node = node.then_limit(limit.clone());
	}
	if select.parallel {
		node = node.wrap_parallel();
	}
	Ok(node)
}

/// Recognises `SELECT COUNT(*)`/`SELECT COUNT(DISTINCT key-expr)` with no
/// other projected terms, no `GROUP BY`, and a fully sargable `cond`
/// (SPEC_FULL.md supplemented feature: `scan_index_count2.go`). `COUNT(DISTINCT
/// key)` is recognised as `FunctionCall("count", [FunctionCall("distinct",
/// [key])])`, mirroring the `Distinct<A>` aggregate wrapper's own naming.
/// Returns `None` whenever the shape doesn't match or the chosen scan isn't
/// `exact`, leaving `plan_select` to fall back to the ordinary pipeline.
fn try_plan_count_scan(select: &Select, from: &FromTerm, catalog: &dyn Catalog) -> Result<Option<PlanNode>, Error> {
	if select.group_by.is_some() {
		return Ok(None);
	}
	let FromTerm::Keyspace {
		keyspace,
		alias,
	} = from
	else {
		return Ok(None);
	};
	let [Field::Single {
		expr,
		..
	}] = select.projection.fields.as_slice()
	else {
		return Ok(None);
	};
	let Expression::FunctionCall {
		name,
		args,
	} = expr
	else {
		return Ok(None);
	};
	if name != "count" {
		return Ok(None);
	}
	let is_distinct = match args.as_slice() {
		[] => false,
		[Expression::FunctionCall {
			name: inner_name,
			args: inner_args,
		}] if inner_name == "distinct" && inner_args.len() == 1 => true,
		_ => return Ok(None),
	};

	let scan = plan_keyspace_scan(keyspace, alias, select.cond.as_ref(), catalog)?;
	let spec = match scan {
		PlanNode::IndexScan(spec) if spec.exact => spec,
		_ => return Ok(None),
	};
	let needed = if is_distinct {
		Capability::CountDistinct
	} else {
		Capability::Count
	};
	let index_supports = catalog
		.keyspace(&spec.index.namespace, keyspace)
		.and_then(|ks| ks.indexer(&spec.index.using))
		.and_then(|indexer| indexer.index_by_id(&spec.index.index_id))
		.map(|index| index.supports(needed))
		.unwrap_or(false);
	if !index_supports {
		return Ok(None);
	}

	let mut node = if is_distinct {
		PlanNode::ScanCountDistinct(spec)
	} else {
		PlanNode::ScanCount(spec)
	};
	node = node.then_project(crate::plan::project_fields(&select.projection));
	if let Some(offset) = &select.offset {
		node = node.then_offset(offset.clone());
	}
	if let Some(limit) = &select.limit {
		node = node.then_limit(limit.clone());
	}
	if select.parallel {
		node = node.wrap_parallel();
	}
	Ok(Some(node))
}

/// Recognises a plain `SELECT DISTINCT ...` (no `GROUP BY`) whose scan is
/// already distinct at the key level (SPEC_FULL.md supplemented feature:
/// `scan_distinct.go`): when the chosen index both sargs `cond` exactly
/// and supports [`Capability::Distinct`], the index layer's own guarantee
/// replaces the downstream `Distinct` operator entirely rather than
/// deduping again after the fact.
fn try_plan_distinct_scan(select: &Select, from: &FromTerm, catalog: &dyn Catalog) -> Result<Option<PlanNode>, Error> {
	if !select.projection.distinct || select.group_by.is_some() {
		return Ok(None);
	}
	let FromTerm::Keyspace {
		keyspace,
		alias,
	} = from
	else {
		return Ok(None);
	};
	let scan = plan_keyspace_scan(keyspace, alias, select.cond.as_ref(), catalog)?;
	let spec = match scan {
		PlanNode::IndexScan(spec) if spec.exact => spec,
		_ => return Ok(None),
	};
	let index_supports = catalog
		.keyspace(&spec.index.namespace, keyspace)
		.and_then(|ks| ks.indexer(&spec.index.using))
		.and_then(|indexer| indexer.index_by_id(&spec.index.index_id))
		.map(|index| index.supports(Capability::Distinct))
		.unwrap_or(false);
	if !index_supports {
		return Ok(None);
	}

	let mut node = PlanNode::ScanDistinct(spec);
	if !select.order_by.is_empty() {
		node = PlanNode::Order {
			input: Box::new(node),
			keys: select.order_by.iter().map(|o| (o.expr.clone(), o.direction)).collect(),
		};
	}
	node = node.then_project(crate::plan::project_fields(&select.projection));
	if let Some(offset) = &select.offset {
		node = node.then_offset(offset.clone());
	}
	if let Some(limit) = &select.limit {
		node = node.then_limit(limit.clone());
	}
	if select.parallel {
		node = node.wrap_parallel();
	}
	Ok(Some(node))
}

/// Builds the scan/join/nest/unnest tree for a `FROM` clause. `cond` is
/// threaded down only so a leaf keyspace scan can try to sarg the parts
/// of `cond` that mention its own alias; join/nest conditions are
/// sarged independently in `plan_join_like`.
fn plan_from(from: &FromTerm, cond: Option<&Expression>, catalog: &dyn Catalog) -> Result<PlanNode, Error> {
	match from {
		FromTerm::Keyspace {
			keyspace,
			alias,
		} => plan_keyspace_scan(keyspace, alias, cond, catalog),
		FromTerm::Join {
			kind,
			left,
			right,
			on,
		} => {
			let left_plan = Box::new(plan_from(left, cond, catalog)?);
			Ok(PlanNode::Join {
				kind: *kind,
				right: Box::new(plan_from(right, Some(on), catalog)?),
				on: on.clone(),
				parent: Some(left_plan.clone()),
				left: left_plan,
			})
		}
		FromTerm::Nest {
			left,
			right,
			on,
			alias,
		} => {
			let left_plan = Box::new(plan_from(left, cond, catalog)?);
			Ok(PlanNode::Nest {
				right: Box::new(plan_from(right, Some(on), catalog)?),
				on: on.clone(),
				alias: alias.clone(),
				parent: Some(left_plan.clone()),
				left: left_plan,
			})
		}
		FromTerm::Unnest {
			left,
			path,
			alias,
			outer,
		} => {
			let input_plan = Box::new(plan_from(left, cond, catalog)?);
			Ok(PlanNode::Unnest {
				path: path.clone(),
				alias: alias.clone(),
				outer: *outer,
				parent: Some(input_plan.clone()),
				input: input_plan,
			})
		}
	}
}

/// Picks the best available index for `keyspace`'s leaf scan: the one
/// whose `range_key` sargs `cond` most exactly (ties broken by lower
/// estimated span size), falling back to a full primary scan when no
/// index applies or no catalog/indexer is available at all.
fn plan_keyspace_scan(
	keyspace: &str,
	_alias: &str,
	cond: Option<&Expression>,
	catalog: &dyn Catalog,
) -> Result<PlanNode, Error> {
	let Some(ks) = catalog.keyspace("", keyspace) else {
		return Ok(PlanNode::PrimaryScan {
			keyspace: keyspace.to_string(),
			spans: span::SargSpans::full(),
			exact: false,
		});
	};
	let Some(pred) = cond else {
		return Ok(PlanNode::PrimaryScan {
			keyspace: keyspace.to_string(),
			spans: span::SargSpans::full(),
			exact: false,
		});
	};
	let Some(indexer) = ks.indexer("default") else {
		return Ok(PlanNode::PrimaryScan {
			keyspace: keyspace.to_string(),
			spans: span::SargSpans::full(),
			exact: false,
		});
	};

	let mut best: Option<(ScanSpec, usize)> = None;
	for index in indexer.indexes() {
		let keys = index.range_key();
		if keys.is_empty() {
			continue;
		}
		let (spans, exact) = sarg::sarg(pred, keys, keys.len(), MAX_KEY_POSITIONS.min(keys.len()));
		if spans.is_full() {
			continue;
		}
		let size = spans.size();
		let spec = ScanSpec {
			index: IndexRef {
				namespace: ks.namespace().to_string(),
				keyspace: keyspace.to_string(),
				using: "default".to_string(),
				index_id: index.id().to_string(),
			},
			spans,
			exact,
		};
		let better = match &best {
			None => true,
			Some((_, best_size)) => size < *best_size,
		};
		if better {
			best = Some((spec, size));
		}
	}

	match best {
		Some((spec, _)) => Ok(PlanNode::IndexScan(spec)),
		None => Ok(PlanNode::PrimaryScan {
			keyspace: keyspace.to_string(),
			spans: span::SargSpans::full(),
			exact: false,
		}),
	}
}

fn plan_update(update: &Update, catalog: &dyn Catalog) -> Result<PlanNode, Error> {
	let mut node = plan_from(&update.from, update.cond.as_ref(), catalog)?;
	if let Some(cond) = &update.cond {
		node = node.then_filter(cond.clone());
	}
	Ok(PlanNode::SendUpdate {
		input: Box::new(node),
		keyspace: update.from.primary_alias().to_string(),
	})
}

fn plan_delete(delete: &Delete, catalog: &dyn Catalog) -> Result<PlanNode, Error> {
	let mut node = plan_from(&delete.from, delete.cond.as_ref(), catalog)?;
	if let Some(cond) = &delete.cond {
		node = node.then_filter(cond.clone());
	}
	Ok(PlanNode::SendDelete {
		input: Box::new(node),
		keyspace: delete.from.primary_alias().to_string(),
	})
}

fn plan_insert(insert: &Insert) -> PlanNode {
	PlanNode::SendInsert {
		input: Box::new(PlanNode::UnitRow),
		keyspace: insert.into.clone(),
	}
}

fn plan_merge(merge: &Merge, catalog: &dyn Catalog) -> Result<PlanNode, Error> {
	let input = plan_from(&merge.source, Some(&merge.on), catalog)?;
	Ok(PlanNode::SendMerge {
		input: Box::new(input),
		keyspace: merge.into.clone(),
		on: merge.on.clone(),
		when_matched: merge.when_matched.clone(),
		when_not_matched: merge.when_not_matched.clone(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::algebra::Projection;
	use crate::datastore::mock::{MockIndex, MockKeyspace};
	use crate::expr::CompareOp;

	struct OneKeyspaceCatalog(MockKeyspace);
	impl Catalog for OneKeyspaceCatalog {
		fn keyspace(&self, _namespace: &str, name: &str) -> Option<&dyn crate::datastore::Keyspace> {
			if name == self.0.name() {
				Some(&self.0)
			} else {
				None
			}
		}
	}

	fn path(alias: &str, field: &str) -> Expression {
		Expression::Path {
			base: Box::new(Expression::identifier(alias)),
			part: crate::expr::PathPart::Field(field.to_string()),
		}
	}

	#[test]
	fn select_with_sargable_predicate_chooses_index_scan() {
		let index = MockIndex::new("idx_a", vec![path("orders", "a")], vec![Capability::Ordered]);
		let keyspace = MockKeyspace::new("ns", "orders", vec![], vec![index]);
		let catalog = OneKeyspaceCatalog(keyspace);

		let select = Select {
			from: Some(FromTerm::Keyspace {
				keyspace: "orders".into(),
				alias: "orders".into(),
			}),
			cond: Some(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(path("orders", "a")),
				r: Box::new(Expression::constant(5.0)),
			}),
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
		};
		let plan = plan_select(&select, &catalog).unwrap();
		let doc = plan.to_doc().into_json();
		// Project -> Filter -> IndexScan (residual filter still applied
		// even on an exact index scan: cheap and always correct).
		assert_eq!(doc["#operator"], "Project");
		assert_eq!(doc["input"]["#operator"], "Filter");
		assert_eq!(doc["input"]["input"]["#operator"], "IndexScan");
	}

	#[test]
	fn select_with_no_applicable_index_falls_back_to_primary_scan() {
		let keyspace = MockKeyspace::new("ns", "orders", vec![], vec![]);
		let catalog = OneKeyspaceCatalog(keyspace);
		let select = Select {
			from: Some(FromTerm::Keyspace {
				keyspace: "orders".into(),
				alias: "orders".into(),
			}),
			cond: None,
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
		};
		let plan = plan_select(&select, &catalog).unwrap();
		let doc = plan.to_doc().into_json();
		assert_eq!(doc["input"]["#operator"], "PrimaryScan");
	}

	fn count_field(distinct_arg: Option<Expression>) -> Field {
		let args = match distinct_arg {
			Some(key) => vec![Expression::FunctionCall {
				name: "distinct".into(),
				args: vec![key],
			}],
			None => vec![],
		};
		Field::Single {
			expr: Expression::FunctionCall {
				name: "count".into(),
				args,
			},
			alias: None,
		}
	}

	fn select_with_projection(from: FromTerm, cond: Option<Expression>, fields: Vec<Field>, distinct: bool) -> Select {
		Select {
			from: Some(from),
			cond,
			projection: Projection {
				fields,
				distinct,
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
	fn select_count_star_with_exact_scan_becomes_scan_count() {
		let index = MockIndex::new("idx_a", vec![path("orders", "a")], vec![Capability::Count]);
		let keyspace = MockKeyspace::new("ns", "orders", vec![], vec![index]);
		let catalog = OneKeyspaceCatalog(keyspace);
		let select = select_with_projection(
			FromTerm::Keyspace {
				keyspace: "orders".into(),
				alias: "orders".into(),
			},
			Some(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(path("orders", "a")),
				r: Box::new(Expression::constant(5.0)),
			}),
			vec![count_field(None)],
			false,
		);
		let plan = plan_select(&select, &catalog).unwrap();
		let doc = plan.to_doc().into_json();
		assert_eq!(doc["input"]["#operator"], "ScanCount");
	}

	#[test]
	fn select_count_distinct_with_exact_scan_becomes_scan_count_distinct() {
		let index = MockIndex::new("idx_a", vec![path("orders", "a")], vec![Capability::CountDistinct]);
		let keyspace = MockKeyspace::new("ns", "orders", vec![], vec![index]);
		let catalog = OneKeyspaceCatalog(keyspace);
		let select = select_with_projection(
			FromTerm::Keyspace {
				keyspace: "orders".into(),
				alias: "orders".into(),
			},
			Some(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(path("orders", "a")),
				r: Box::new(Expression::constant(5.0)),
			}),
			vec![count_field(Some(path("orders", "a")))],
			false,
		);
		let plan = plan_select(&select, &catalog).unwrap();
		let doc = plan.to_doc().into_json();
		assert_eq!(doc["input"]["#operator"], "ScanCountDistinct");
	}

	#[test]
	fn select_count_without_capability_falls_back_to_ordinary_pipeline() {
		let index = MockIndex::new("idx_a", vec![path("orders", "a")], vec![Capability::Ordered]);
		let keyspace = MockKeyspace::new("ns", "orders", vec![], vec![index]);
		let catalog = OneKeyspaceCatalog(keyspace);
		let select = select_with_projection(
			FromTerm::Keyspace {
				keyspace: "orders".into(),
				alias: "orders".into(),
			},
			Some(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(path("orders", "a")),
				r: Box::new(Expression::constant(5.0)),
			}),
			vec![count_field(None)],
			false,
		);
		let plan = plan_select(&select, &catalog).unwrap();
		let doc = plan.to_doc().into_json();
		// No Count capability on the index: falls back to the ordinary
		// scan/filter/project pipeline rather than a ScanCount node.
		assert_eq!(doc["#operator"], "Project");
		assert_eq!(doc["input"]["#operator"], "Filter");
		assert_eq!(doc["input"]["input"]["#operator"], "IndexScan");
	}

	#[test]
	fn select_distinct_with_distinct_capable_index_becomes_scan_distinct() {
		let index = MockIndex::new("idx_a", vec![path("orders", "a")], vec![Capability::Distinct]);
		let keyspace = MockKeyspace::new("ns", "orders", vec![], vec![index]);
		let catalog = OneKeyspaceCatalog(keyspace);
		let select = select_with_projection(
			FromTerm::Keyspace {
				keyspace: "orders".into(),
				alias: "orders".into(),
			},
			Some(Expression::Compare {
				op: CompareOp::Equal,
				l: Box::new(path("orders", "a")),
				r: Box::new(Expression::constant(5.0)),
			}),
			vec![Field::All {
				alias: None,
			}],
			true,
		);
		let plan = plan_select(&select, &catalog).unwrap();
		let doc = plan.to_doc().into_json();
		assert_eq!(doc["input"]["#operator"], "ScanDistinct");
	}

	#[test]
	fn select_with_no_from_yields_a_single_unit_row() {
		let keyspace = MockKeyspace::new("ns", "orders", vec![], vec![]);
		let catalog = OneKeyspaceCatalog(keyspace);
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
		let plan = plan_select(&select, &catalog).unwrap();
		let doc = plan.to_doc().into_json();
		assert_eq!(doc["input"]["#operator"], "UnitRow");
	}
}
