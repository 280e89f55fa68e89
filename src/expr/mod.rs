//! The scalar expression tree (spec §3.2) and its two passes: evaluation
//! and formalization.
mod eval;
mod formalize;
mod visitor;

pub use formalize::formalize;
pub use visitor::Visitor;

use crate::algebra::Select;
use crate::err::Error;
use crate::value::{AnnotatedValue, Value};
use std::fmt;

/// A path step off a base expression (spec §3.2 "path-field and
/// path-index").
#[derive(Clone, Debug, PartialEq)]
pub enum PathPart {
	Field(String),
	Index(i64),
}

impl fmt::Display for PathPart {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PathPart::Field(name) => write!(f, ".{name}"),
			PathPart::Index(i) => write!(f, "[{i}]"),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
	Add,
	Sub,
	Mul,
	Div,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
	Equal,
	NotEqual,
	LessThan,
	LessThanOrEqual,
	GreaterThan,
	GreaterThanOrEqual,
	Like,
}

impl fmt::Display for CompareOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			CompareOp::Equal => "=",
			CompareOp::NotEqual => "!=",
			CompareOp::LessThan => "<",
			CompareOp::LessThanOrEqual => "<=",
			CompareOp::GreaterThan => ">",
			CompareOp::GreaterThanOrEqual => ">=",
			CompareOp::Like => "~",
		};
		write!(f, "{s}")
	}
}

/// A node in the scalar expression tree (spec §3.2). Built by the parser
/// (out of scope here), rewritten exactly once by [`formalize`], and
/// read-only thereafter: mutating a formalized tree is forbidden (spec
/// §3.2 lifecycle).
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Expression {
	Constant(Value),
	Identifier(String),
	Path {
		base: Box<Expression>,
		part: PathPart,
	},
	Arith {
		op: ArithOp,
		l: Box<Expression>,
		r: Box<Expression>,
	},
	Not(Box<Expression>),
	And(Box<Expression>, Box<Expression>),
	Or(Box<Expression>, Box<Expression>),
	Compare {
		op: CompareOp,
		l: Box<Expression>,
		r: Box<Expression>,
	},
	IsNull(Box<Expression>),
	IsMissing(Box<Expression>),
	/// `IS VALUED`: neither `MISSING` nor `NULL`.
	IsValued(Box<Expression>),
	Between {
		expr: Box<Expression>,
		low: Box<Expression>,
		high: Box<Expression>,
	},
	/// `expr IN (list...)`: membership of `expr` in a list of scalars.
	In {
		expr: Box<Expression>,
		list: Vec<Expression>,
	},
	/// `expr WITHIN (list...)`: every element of the array-valued `expr` is
	/// a member of `list`.
	Within {
		expr: Box<Expression>,
		list: Vec<Expression>,
	},
	/// `ANY var IN source SATISFIES predicate` (with `every = false`) or
	/// `EVERY var IN source SATISFIES predicate` (`every = true`).
	Quantified {
		every: bool,
		var: String,
		source: Box<Expression>,
		predicate: Box<Expression>,
	},
	Case {
		whens: Vec<(Expression, Expression)>,
		otherwise: Option<Box<Expression>>,
	},
	FunctionCall {
		name: String,
		args: Vec<Expression>,
	},
	PositionalParam(usize),
	NamedParam(String),
	Subquery(Box<Select>),
}

impl Expression {
	pub fn constant(v: impl Into<Value>) -> Self {
		Expression::Constant(v.into())
	}

	pub fn identifier(name: impl Into<String>) -> Self {
		Expression::Identifier(name.into())
	}

	/// Static type tag, when known without evaluating. Spec §3.2: most
	/// nodes are dynamic (`None` here means "JSON", i.e. unknown until
	/// evaluated).
	pub fn static_type(&self) -> Option<&'static str> {
		match self {
			Expression::Constant(Value::Number(_)) => Some("number"),
			Expression::Constant(Value::String(_)) => Some("string"),
			Expression::Constant(Value::Bool(_)) => Some("boolean"),
			Expression::Constant(Value::Array(_)) => Some("array"),
			Expression::Constant(Value::Object(_)) => Some("object"),
			Expression::And(..) | Expression::Or(..) | Expression::Not(_) => Some("boolean"),
			Expression::Compare {
				..
			}
			| Expression::IsNull(_)
			| Expression::IsMissing(_)
			| Expression::IsValued(_)
			| Expression::Between {
				..
			}
			| Expression::In {
				..
			}
			| Expression::Within {
				..
			}
			| Expression::Quantified {
				..
			} => Some("boolean"),
			_ => None,
		}
	}

	/// Ordered child expressions (spec §3.2 `children()`).
	pub fn children(&self) -> Vec<&Expression> {
		match self {
			Expression::Constant(_)
			| Expression::Identifier(_)
			| Expression::PositionalParam(_)
			| Expression::NamedParam(_)
			| Expression::Subquery(_) => vec![],
			Expression::Path {
				base,
				..
			} => vec![base],
			Expression::Arith {
				l,
				r,
				..
			} => vec![l, r],
			Expression::Not(e) => vec![e],
			Expression::And(l, r) | Expression::Or(l, r) => vec![l, r],
			Expression::Compare {
				l,
				r,
				..
			} => vec![l, r],
			Expression::IsNull(e) | Expression::IsMissing(e) | Expression::IsValued(e) => {
				vec![e]
			}
			Expression::Between {
				expr,
				low,
				high,
			} => vec![expr, low, high],
			Expression::In {
				expr,
				list,
			}
			| Expression::Within {
				expr,
				list,
			} => {
				let mut v = vec![expr.as_ref()];
				v.extend(list.iter());
				v
			}
			Expression::Quantified {
				source,
				predicate,
				..
			} => vec![source, predicate],
			Expression::Case {
				whens,
				otherwise,
			} => {
				let mut v = vec![];
				for (w, t) in whens {
					v.push(w);
					v.push(t);
				}
				if let Some(o) = otherwise {
					v.push(o);
				}
				v
			}
			Expression::FunctionCall {
				args,
				..
			} => args.iter().collect(),
		}
	}

	/// In-place rewrite of immediate children (spec §3.2 `mapChildren`).
	/// Per spec §9's idiomatic-Rust guidance, this is a constructor-based
	/// rewrite rather than true mutation-in-place.
	pub fn map_children(self, mut f: impl FnMut(Expression) -> Expression) -> Expression {
		match self {
			Expression::Path {
				base,
				part,
			} => Expression::Path {
				base: Box::new(f(*base)),
				part,
			},
			Expression::Arith {
				op,
				l,
				r,
			} => Expression::Arith {
				op,
				l: Box::new(f(*l)),
				r: Box::new(f(*r)),
			},
			Expression::Not(e) => Expression::Not(Box::new(f(*e))),
			Expression::And(l, r) => Expression::And(Box::new(f(*l)), Box::new(f(*r))),
			Expression::Or(l, r) => Expression::Or(Box::new(f(*l)), Box::new(f(*r))),
			Expression::Compare {
				op,
				l,
				r,
			} => Expression::Compare {
				op,
				l: Box::new(f(*l)),
				r: Box::new(f(*r)),
			},
			Expression::IsNull(e) => Expression::IsNull(Box::new(f(*e))),
			Expression::IsMissing(e) => Expression::IsMissing(Box::new(f(*e))),
			Expression::IsValued(e) => Expression::IsValued(Box::new(f(*e))),
			Expression::Between {
				expr,
				low,
				high,
			} => Expression::Between {
				expr: Box::new(f(*expr)),
				low: Box::new(f(*low)),
				high: Box::new(f(*high)),
			},
			Expression::In {
				expr,
				list,
			} => Expression::In {
				expr: Box::new(f(*expr)),
				list: list.into_iter().map(&mut f).collect(),
			},
			Expression::Within {
				expr,
				list,
			} => Expression::Within {
				expr: Box::new(f(*expr)),
				list: list.into_iter().map(&mut f).collect(),
			},
			Expression::Quantified {
				every,
				var,
				source,
				predicate,
			} => Expression::Quantified {
				every,
				var,
				source: Box::new(f(*source)),
				predicate: Box::new(f(*predicate)),
			},
			Expression::Case {
				whens,
				otherwise,
			} => Expression::Case {
				whens: whens.into_iter().map(|(w, t)| (f(w), f(t))).collect(),
				otherwise: otherwise.map(|o| Box::new(f(*o))),
			},
			Expression::FunctionCall {
				name,
				args,
			} => Expression::FunctionCall {
				name,
				args: args.into_iter().map(&mut f).collect(),
			},
			leaf => leaf,
		}
	}

	/// Fallible counterpart of [`Expression::map_children`], for rewrites
	/// that can fail partway through (formalization's "undefined
	/// identifier", spec §4.2 rule 3).
	pub fn try_map_children<E>(
		self,
		mut f: impl FnMut(Expression) -> Result<Expression, E>,
	) -> Result<Expression, E> {
		Ok(match self {
			Expression::Path {
				base,
				part,
			} => Expression::Path {
				base: Box::new(f(*base)?),
				part,
			},
			Expression::Arith {
				op,
				l,
				r,
			} => Expression::Arith {
				op,
				l: Box::new(f(*l)?),
				r: Box::new(f(*r)?),
			},
			Expression::Not(e) => Expression::Not(Box::new(f(*e)?)),
			Expression::And(l, r) => Expression::And(Box::new(f(*l)?), Box::new(f(*r)?)),
			Expression::Or(l, r) => Expression::Or(Box::new(f(*l)?), Box::new(f(*r)?)),
			Expression::Compare {
				op,
				l,
				r,
			} => Expression::Compare {
				op,
				l: Box::new(f(*l)?),
				r: Box::new(f(*r)?),
			},
			Expression::IsNull(e) => Expression::IsNull(Box::new(f(*e)?)),
			Expression::IsMissing(e) => Expression::IsMissing(Box::new(f(*e)?)),
			Expression::IsValued(e) => Expression::IsValued(Box::new(f(*e)?)),
			Expression::Between {
				expr,
				low,
				high,
			} => Expression::Between {
				expr: Box::new(f(*expr)?),
				low: Box::new(f(*low)?),
				high: Box::new(f(*high)?),
			},
			Expression::In {
				expr,
				list,
			} => Expression::In {
				expr: Box::new(f(*expr)?),
				list: list.into_iter().map(&mut f).collect::<Result<_, _>>()?,
			},
			Expression::Within {
				expr,
				list,
			} => Expression::Within {
				expr: Box::new(f(*expr)?),
				list: list.into_iter().map(&mut f).collect::<Result<_, _>>()?,
			},
			Expression::Quantified {
				every,
				var,
				source,
				predicate,
			} => Expression::Quantified {
				every,
				var,
				source: Box::new(f(*source)?),
				predicate: Box::new(f(*predicate)?),
			},
			Expression::Case {
				whens,
				otherwise,
			} => Expression::Case {
				whens: whens
					.into_iter()
					.map(|(w, t)| Ok((f(w)?, f(t)?)))
					.collect::<Result<_, E>>()?,
				otherwise: otherwise.map(|o| f(*o)).transpose()?.map(Box::new),
			},
			Expression::FunctionCall {
				name,
				args,
			} => Expression::FunctionCall {
				name,
				args: args.into_iter().map(&mut f).collect::<Result<_, _>>()?,
			},
			leaf => leaf,
		})
	}

	/// Deep structural equality (spec §3.2 `equivalentTo`).
	pub fn equivalent_to(&self, other: &Expression) -> bool {
		self == other
	}

	/// Whether this expression's truth-set is a subset of `other`'s (spec
	/// §3.2 `subsetOf`). Deliberately conservative: only the shapes the
	/// planner actually needs (a conjunction is a subset of any of its own
	/// conjuncts) are recognised; anything else falls back to equivalence.
	pub fn subset_of(&self, other: &Expression) -> bool {
		if self.equivalent_to(other) {
			return true;
		}
		if let Expression::And(l, r) = self {
			return l.subset_of(other) || r.subset_of(other);
		}
		false
	}

	/// Whether this node shape is one the planner can sarg (spec §3.2
	/// `indexable()`): a comparison, range, or membership test whose
	/// non-path side is free of identifiers.
	pub fn indexable(&self) -> bool {
		match self {
			Expression::Compare {
				l,
				r,
				..
			} => is_path_like(l) && is_closed(r) || is_path_like(r) && is_closed(l),
			Expression::Between {
				expr,
				low,
				high,
			} => is_path_like(expr) && is_closed(low) && is_closed(high),
			Expression::In {
				expr,
				list,
			} => is_path_like(expr) && list.iter().all(is_closed),
			Expression::IsNull(e) | Expression::IsMissing(e) => is_path_like(e),
			_ => false,
		}
	}
}

fn is_path_like(e: &Expression) -> bool {
	matches!(e, Expression::Identifier(_) | Expression::Path { .. })
}

/// No free identifiers: a constant, parameter, or a closed function call
/// over closed arguments.
fn is_closed(e: &Expression) -> bool {
	match e {
		Expression::Constant(_) | Expression::PositionalParam(_) | Expression::NamedParam(_) => {
			true
		}
		Expression::FunctionCall {
			args,
			..
		} => args.iter().all(is_closed),
		_ => false,
	}
}

impl fmt::Display for Expression {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Expression::Constant(v) => write!(f, "{v}"),
			Expression::Identifier(name) => write!(f, "{name}"),
			Expression::Path {
				base,
				part,
			} => write!(f, "{base}{part}"),
			Expression::Arith {
				op,
				l,
				r,
			} => {
				let sym = match op {
					ArithOp::Add => "+",
					ArithOp::Sub => "-",
					ArithOp::Mul => "*",
					ArithOp::Div => "/",
				};
				write!(f, "({l} {sym} {r})")
			}
			Expression::Not(e) => write!(f, "NOT ({e})"),
			Expression::And(l, r) => write!(f, "({l} AND {r})"),
			Expression::Or(l, r) => write!(f, "({l} OR {r})"),
			Expression::Compare {
				op,
				l,
				r,
			} => write!(f, "({l} {op} {r})"),
			Expression::IsNull(e) => write!(f, "({e} IS NULL)"),
			Expression::IsMissing(e) => write!(f, "({e} IS MISSING)"),
			Expression::IsValued(e) => write!(f, "({e} IS VALUED)"),
			Expression::Between {
				expr,
				low,
				high,
			} => write!(f, "({expr} BETWEEN {low} AND {high})"),
			Expression::In {
				expr,
				list,
			} => write!(f, "({expr} IN [{}])", fmt_list(list)),
			Expression::Within {
				expr,
				list,
			} => write!(f, "({expr} WITHIN [{}])", fmt_list(list)),
			Expression::Quantified {
				every,
				var,
				source,
				predicate,
			} => {
				let kw = if *every {
					"EVERY"
				} else {
					"ANY"
				};
				write!(f, "({kw} {var} IN {source} SATISFIES {predicate})")
			}
			Expression::Case {
				whens,
				otherwise,
			} => {
				write!(f, "CASE")?;
				for (w, t) in whens {
					write!(f, " WHEN {w} THEN {t}")?;
				}
				if let Some(o) = otherwise {
					write!(f, " ELSE {o}")?;
				}
				write!(f, " END")
			}
			Expression::FunctionCall {
				name,
				args,
			} => write!(f, "{name}({})", fmt_list(args)),
			Expression::PositionalParam(i) => write!(f, "${i}"),
			Expression::NamedParam(name) => write!(f, "${name}"),
			Expression::Subquery(_) => write!(f, "(...)"),
		}
	}
}

fn fmt_list(items: &[Expression]) -> String {
	items.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

/// Evaluation context (spec §3.2 `evaluate(item, context)`). Carries the
/// request-level parameter bindings an `Expression::PositionalParam`/
/// `NamedParam` resolves against (supplemented feature 1 in SPEC_FULL.md:
/// parameters resolve via the request, not the scope chain).
pub trait EvalContext {
	fn positional_arg(&self, index: usize) -> Option<&Value>;
	fn named_arg(&self, name: &str) -> Option<&Value>;
}

impl Expression {
	pub fn evaluate(&self, item: &AnnotatedValue, ctx: &dyn EvalContext) -> Result<Value, Error> {
		eval::evaluate(self, item, ctx)
	}
}
