use super::PlanNode;
use serde_json::{json, Value as Json};

/// A plan operator serialised with a `#operator` discriminator (spec
/// §4.8), used for `EXPLAIN` output and prepared-statement caching.
/// Expression fields serialise as their textual `Display` form; index
/// references serialise as the `(namespace, keyspace, using, index_id)`
/// tuple the datastore re-resolves at deserialization time.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanDoc(pub Json);

impl PlanDoc {
	pub fn into_json(self) -> Json {
		self.0
	}
}

fn index_ref_doc(index: &super::IndexRef) -> Json {
	json!({
		"namespace": index.namespace,
		"keyspace": index.keyspace,
		"using": index.using,
		"index_id": index.index_id,
	})
}

impl PlanNode {
	pub fn to_doc(&self) -> PlanDoc {
		PlanDoc(self.to_json())
	}

	fn to_json(&self) -> Json {
		match self {
			PlanNode::PrimaryScan {
				keyspace,
				spans,
				exact,
			} => json!({
				"#operator": "PrimaryScan",
				"keyspace": keyspace,
				"spans": spans.to_string(),
				"exact": exact,
			}),
			PlanNode::IndexScan(spec) => scan_doc("IndexScan", spec),
			PlanNode::ScanCount(spec) => scan_doc("ScanCount", spec),
			PlanNode::ScanCountDistinct(spec) => scan_doc("ScanCountDistinct", spec),
			PlanNode::ScanDistinct(spec) => scan_doc("ScanDistinct", spec),
			PlanNode::Fetch {
				input,
				keyspace,
			} => json!({
				"#operator": "Fetch",
				"input": input.to_json(),
				"keyspace": keyspace,
			}),
			PlanNode::Join {
				kind,
				left,
				right,
				on,
				parent,
			} => json!({
				"#operator": "Join",
				"kind": format!("{kind:?}"),
				"left": left.to_json(),
				"right": right.to_json(),
				"on": on.to_string(),
				"parent": parent.as_ref().map(|p| p.to_json()),
			}),
			PlanNode::Nest {
				left,
				right,
				on,
				alias,
				parent,
			} => json!({
				"#operator": "Nest",
				"left": left.to_json(),
				"right": right.to_json(),
				"on": on.to_string(),
				"alias": alias,
				"parent": parent.as_ref().map(|p| p.to_json()),
			}),
			PlanNode::Unnest {
				input,
				path,
				alias,
				outer,
				parent,
			} => json!({
				"#operator": "Unnest",
				"input": input.to_json(),
				"path": path.to_string(),
				"alias": alias,
				"outer": outer,
				"parent": parent.as_ref().map(|p| p.to_json()),
			}),
			PlanNode::Filter {
				input,
				predicate,
			} => json!({
				"#operator": "Filter",
				"input": input.to_json(),
				"predicate": predicate.to_string(),
			}),
			PlanNode::Project {
				input,
				fields,
			} => json!({
				"#operator": "Project",
				"input": input.to_json(),
				"fields": fields.iter().map(field_doc).collect::<Vec<_>>(),
			}),
			PlanNode::GroupInitial {
				input,
				keys,
			} => json!({
				"#operator": "GroupInitial",
				"input": input.to_json(),
				"keys": keys.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
			}),
			PlanNode::GroupIntermediate {
				input,
				keys,
			} => json!({
				"#operator": "GroupIntermediate",
				"input": input.to_json(),
				"keys": keys.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
			}),
			PlanNode::GroupFinal {
				input,
				having,
			} => json!({
				"#operator": "GroupFinal",
				"input": input.to_json(),
				"having": having.as_ref().map(|h| h.to_string()),
			}),
			PlanNode::Order {
				input,
				keys,
			} => json!({
				"#operator": "Order",
				"input": input.to_json(),
				"keys": keys.iter().map(|(e, d)| json!({
					"expr": e.to_string(),
					"direction": format!("{d:?}"),
				})).collect::<Vec<_>>(),
			}),
			PlanNode::Offset {
				input,
				count,
			} => json!({
				"#operator": "Offset",
				"input": input.to_json(),
				"count": count.to_string(),
			}),
			PlanNode::Limit {
				input,
				count,
			} => json!({
				"#operator": "Limit",
				"input": input.to_json(),
				"count": count.to_string(),
			}),
			PlanNode::Distinct {
				input,
			} => json!({
				"#operator": "Distinct",
				"input": input.to_json(),
			}),
			PlanNode::Parallel {
				child,
			} => json!({
				"#operator": "Parallel",
				"child": child.to_json(),
			}),
			PlanNode::Sequence {
				stages,
			} => json!({
				"#operator": "Sequence",
				"stages": stages.iter().map(PlanNode::to_json).collect::<Vec<_>>(),
			}),
			PlanNode::UnionAll {
				inputs,
			} => json!({
				"#operator": "UnionAll",
				"inputs": inputs.iter().map(PlanNode::to_json).collect::<Vec<_>>(),
			}),
			PlanNode::Intersect {
				left,
				right,
			} => json!({
				"#operator": "Intersect",
				"left": left.to_json(),
				"right": right.to_json(),
			}),
			PlanNode::Except {
				left,
				right,
			} => json!({
				"#operator": "Except",
				"left": left.to_json(),
				"right": right.to_json(),
			}),
			PlanNode::SendInsert {
				input,
				keyspace,
			} => json!({
				"#operator": "SendInsert",
				"input": input.to_json(),
				"keyspace": keyspace,
			}),
			PlanNode::SendMerge {
				input,
				keyspace,
				on,
				when_matched,
				when_not_matched,
			} => json!({
				"#operator": "SendMerge",
				"input": input.to_json(),
				"keyspace": keyspace,
				"on": on.to_string(),
				"when_matched": when_matched.as_ref().map(matched_action_doc),
				"when_not_matched": when_not_matched.as_ref().map(|e| e.to_string()),
			}),
			PlanNode::SendUpdate {
				input,
				keyspace,
			} => json!({
				"#operator": "SendUpdate",
				"input": input.to_json(),
				"keyspace": keyspace,
			}),
			PlanNode::SendDelete {
				input,
				keyspace,
			} => json!({
				"#operator": "SendDelete",
				"input": input.to_json(),
				"keyspace": keyspace,
			}),
			PlanNode::UnitRow => json!({
				"#operator": "UnitRow",
			}),
		}
	}
}

fn scan_doc(name: &str, spec: &super::ScanSpec) -> Json {
	json!({
		"#operator": name,
		"index": index_ref_doc(&spec.index),
		"spans": spec.spans.to_string(),
		"exact": spec.exact,
	})
}

fn matched_action_doc(action: &crate::algebra::MergeMatchedAction) -> Json {
	match action {
		crate::algebra::MergeMatchedAction::Update(mutations) => json!({
			"update": mutations.iter().map(mutation_doc).collect::<Vec<_>>(),
		}),
		crate::algebra::MergeMatchedAction::Delete => json!({"delete": true}),
	}
}

fn mutation_doc(mutation: &crate::algebra::Mutation) -> Json {
	match mutation {
		crate::algebra::Mutation::Set {
			path,
			value,
		} => json!({"set": path.to_string(), "value": value.to_string()}),
		crate::algebra::Mutation::Unset {
			path,
		} => json!({"unset": path.to_string()}),
	}
}

fn field_doc(field: &crate::algebra::Field) -> Json {
	match field {
		crate::algebra::Field::All {
			alias,
		} => json!({"all": true, "alias": alias}),
		crate::algebra::Field::Single {
			expr,
			alias,
		} => json!({"expr": expr.to_string(), "alias": alias}),
	}
}
