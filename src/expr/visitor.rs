use super::Expression;

/// A read-only walk over an expression tree (spec §3.2 `Visitor`). Default
/// methods recurse into children via [`Expression::children`]; override
/// only the node kinds a given pass cares about.
pub trait Visitor {
	fn visit(&mut self, expr: &Expression) {
		self.visit_children(expr);
	}

	fn visit_children(&mut self, expr: &Expression) {
		for child in expr.children() {
			self.visit(child);
		}
	}
}

/// Collects every free identifier and parameter referenced in a tree,
/// used by the planner to decide which `FromTerm` a predicate belongs to.
#[derive(Default)]
pub struct IdentifierCollector {
	pub identifiers: Vec<String>,
}

impl Visitor for IdentifierCollector {
	fn visit(&mut self, expr: &Expression) {
		if let Expression::Identifier(name) = expr {
			self.identifiers.push(name.clone());
		}
		self.visit_children(expr);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::expr::{CompareOp, Expression};

	#[test]
	fn collects_identifiers_from_nested_compare() {
		let tree = Expression::Compare {
			op: CompareOp::Equal,
			l: Box::new(Expression::Path {
				base: Box::new(Expression::identifier("user")),
				part: crate::expr::PathPart::Field("age".into()),
			}),
			r: Box::new(Expression::constant(21.0)),
		};
		let mut collector = IdentifierCollector::default();
		collector.visit(&tree);
		assert_eq!(collector.identifiers, vec!["user".to_string()]);
	}
}
