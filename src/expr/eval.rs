use super::{ArithOp, CompareOp, EvalContext, Expression, PathPart};
use crate::err::Error;
use crate::value::{AnnotatedValue, Object, TryArith, Value};

/// Evaluates `expr` against `item` (spec §3.2 `evaluate(item, context)`).
/// `item`'s value doubles as the current binding environment: identifier
/// lookup is a field access on it, and `ANY`/`EVERY` extend it with the
/// bound variable for the duration of the predicate.
pub fn evaluate(
	expr: &Expression,
	item: &AnnotatedValue,
	ctx: &dyn EvalContext,
) -> Result<Value, Error> {
	match expr {
		Expression::Constant(v) => Ok(v.clone()),
		Expression::Identifier(name) => Ok(item.value.get_field(name)),
		Expression::Path {
			base,
			part,
		} => {
			let base = evaluate(base, item, ctx)?;
			Ok(apply_path(&base, part))
		}
		Expression::Arith {
			op,
			l,
			r,
		} => {
			let l = evaluate(l, item, ctx)?;
			let r = evaluate(r, item, ctx)?;
			Ok(match op {
				ArithOp::Add => l.try_add(r),
				ArithOp::Sub => l.try_sub(r),
				ArithOp::Mul => l.try_mul(r),
				ArithOp::Div => l.try_div(r),
			})
		}
		Expression::Not(e) => {
			let v = evaluate(e, item, ctx)?;
			Ok(match three_valued(&v) {
				Some(b) => Value::Bool(!b),
				None => Value::Null,
			})
		}
		Expression::And(l, r) => eval_and(l, r, item, ctx),
		Expression::Or(l, r) => eval_or(l, r, item, ctx),
		Expression::Compare {
			op,
			l,
			r,
		} => {
			let l = evaluate(l, item, ctx)?;
			let r = evaluate(r, item, ctx)?;
			Ok(eval_compare(*op, &l, &r))
		}
		Expression::IsNull(e) => {
			let v = evaluate(e, item, ctx)?;
			Ok(Value::Bool(v.is_null()))
		}
		Expression::IsMissing(e) => {
			let v = evaluate(e, item, ctx)?;
			Ok(Value::Bool(v.is_missing()))
		}
		Expression::IsValued(e) => {
			let v = evaluate(e, item, ctx)?;
			Ok(Value::Bool(!v.is_null_or_missing()))
		}
		Expression::Between {
			expr,
			low,
			high,
		} => {
			let v = evaluate(expr, item, ctx)?;
			let low = evaluate(low, item, ctx)?;
			let high = evaluate(high, item, ctx)?;
			if v.is_null_or_missing() || low.is_null_or_missing() || high.is_null_or_missing() {
				return Ok(Value::Null);
			}
			Ok(Value::Bool(low <= v && v <= high))
		}
		Expression::In {
			expr,
			list,
		} => {
			let v = evaluate(expr, item, ctx)?;
			if v.is_missing() {
				return Ok(Value::Missing);
			}
			for candidate in list {
				if evaluate(candidate, item, ctx)? == v {
					return Ok(Value::Bool(true));
				}
			}
			Ok(Value::Bool(false))
		}
		Expression::Within {
			expr,
			list,
		} => {
			let v = evaluate(expr, item, ctx)?;
			let elems = match v.as_array() {
				Some(a) => a,
				None => return Ok(Value::Null),
			};
			let mut members = Vec::with_capacity(list.len());
			for candidate in list {
				members.push(evaluate(candidate, item, ctx)?);
			}
			Ok(Value::Bool(elems.iter().all(|e| members.contains(e))))
		}
		Expression::Quantified {
			every,
			var,
			source,
			predicate,
		} => {
			let source = evaluate(source, item, ctx)?;
			let elems = match source.as_array() {
				Some(a) => a,
				None => return Ok(Value::Bool(false)),
			};
			if *every {
				for elem in elems {
					if !evaluate(predicate, &bind(item, var, elem.clone()), ctx)?.is_truthy() {
						return Ok(Value::Bool(false));
					}
				}
				Ok(Value::Bool(true))
			} else {
				for elem in elems {
					if evaluate(predicate, &bind(item, var, elem.clone()), ctx)?.is_truthy() {
						return Ok(Value::Bool(true));
					}
				}
				Ok(Value::Bool(false))
			}
		}
		Expression::Case {
			whens,
			otherwise,
		} => {
			for (when, then) in whens {
				if evaluate(when, item, ctx)?.is_truthy() {
					return evaluate(then, item, ctx);
				}
			}
			match otherwise {
				Some(e) => evaluate(e, item, ctx),
				None => Ok(Value::Null),
			}
		}
		Expression::FunctionCall {
			name,
			args,
		} => {
			let mut evaluated = Vec::with_capacity(args.len());
			for a in args {
				evaluated.push(evaluate(a, item, ctx)?);
			}
			crate::exec::functions::call_scalar(name, &evaluated)
		}
		Expression::PositionalParam(i) => {
			Ok(ctx.positional_arg(*i).cloned().unwrap_or(Value::Missing))
		}
		Expression::NamedParam(name) => {
			Ok(ctx.named_arg(name).cloned().unwrap_or(Value::Missing))
		}
		Expression::Subquery(_) => {
			Err(Error::runtime("sub-query evaluation requires the execution runtime"))
		}
	}
}

fn apply_path(base: &Value, part: &PathPart) -> Value {
	match part {
		PathPart::Field(name) => base.get_field(name),
		PathPart::Index(i) => match base.as_array() {
			Some(arr) => {
				let len = arr.len() as i64;
				let idx = if *i < 0 {
					*i + len
				} else {
					*i
				};
				if idx < 0 || idx >= len {
					Value::Missing
				} else {
					arr[idx as usize].clone()
				}
			}
			None => Value::Missing,
		},
	}
}

fn three_valued(v: &Value) -> Option<bool> {
	match v {
		Value::Bool(b) => Some(*b),
		Value::Missing | Value::Null => None,
		other => Some(other.is_truthy()),
	}
}

/// Three-valued AND (spec §4.1): `FALSE` short-circuits even past an
/// unknown operand; otherwise any unknown operand makes the result
/// unknown (`NULL`).
fn eval_and(
	l: &Expression,
	r: &Expression,
	item: &AnnotatedValue,
	ctx: &dyn EvalContext,
) -> Result<Value, Error> {
	let lv = evaluate(l, item, ctx)?;
	if three_valued(&lv) == Some(false) {
		return Ok(Value::Bool(false));
	}
	let rv = evaluate(r, item, ctx)?;
	if three_valued(&rv) == Some(false) {
		return Ok(Value::Bool(false));
	}
	match (three_valued(&lv), three_valued(&rv)) {
		(Some(true), Some(true)) => Ok(Value::Bool(true)),
		_ => Ok(Value::Null),
	}
}

/// Three-valued OR: `TRUE` short-circuits; otherwise unknown propagates.
fn eval_or(
	l: &Expression,
	r: &Expression,
	item: &AnnotatedValue,
	ctx: &dyn EvalContext,
) -> Result<Value, Error> {
	let lv = evaluate(l, item, ctx)?;
	if three_valued(&lv) == Some(true) {
		return Ok(Value::Bool(true));
	}
	let rv = evaluate(r, item, ctx)?;
	if three_valued(&rv) == Some(true) {
		return Ok(Value::Bool(true));
	}
	match (three_valued(&lv), three_valued(&rv)) {
		(Some(false), Some(false)) => Ok(Value::Bool(false)),
		_ => Ok(Value::Null),
	}
}

fn eval_compare(op: CompareOp, l: &Value, r: &Value) -> Value {
	if l.is_missing() || r.is_missing() {
		return Value::Missing;
	}
	if l.is_null() || r.is_null() {
		return Value::Null;
	}
	match op {
		CompareOp::Equal => Value::Bool(l == r),
		CompareOp::NotEqual => Value::Bool(l != r),
		CompareOp::LessThan => Value::Bool(l < r),
		CompareOp::LessThanOrEqual => Value::Bool(l <= r),
		CompareOp::GreaterThan => Value::Bool(l > r),
		CompareOp::GreaterThanOrEqual => Value::Bool(l >= r),
		CompareOp::Like => match (l.as_str(), r.as_str()) {
			(Some(haystack), Some(pattern)) => Value::Bool(like_match(haystack, pattern)),
			_ => Value::Null,
		},
	}
}

/// `%` matches any run of characters, `_` matches exactly one.
fn like_match(haystack: &str, pattern: &str) -> bool {
	fn rec(h: &[char], p: &[char]) -> bool {
		match p.first() {
			None => h.is_empty(),
			Some('%') => rec(h, &p[1..]) || (!h.is_empty() && rec(&h[1..], p)),
			Some('_') => !h.is_empty() && rec(&h[1..], &p[1..]),
			Some(c) => h.first() == Some(c) && rec(&h[1..], &p[1..]),
		}
	}
	let h: Vec<char> = haystack.chars().collect();
	let p: Vec<char> = pattern.chars().collect();
	rec(&h, &p)
}

fn bind(item: &AnnotatedValue, var: &str, value: Value) -> AnnotatedValue {
	let mut obj = match &item.value {
		Value::Object(o) => o.clone(),
		_ => Object::default(),
	};
	obj.insert(var.to_string(), value);
	AnnotatedValue::new(Value::Object(obj))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::Object;
	use std::collections::BTreeMap;

	struct NoParams;
	impl EvalContext for NoParams {
		fn positional_arg(&self, _index: usize) -> Option<&Value> {
			None
		}
		fn named_arg(&self, _name: &str) -> Option<&Value> {
			None
		}
	}

	fn doc(pairs: &[(&str, Value)]) -> AnnotatedValue {
		let mut m = BTreeMap::new();
		for (k, v) in pairs {
			m.insert((*k).to_string(), v.clone());
		}
		AnnotatedValue::new(Value::Object(Object(m)))
	}

	#[test]
	fn and_is_false_when_either_operand_is_false_even_if_other_is_null() {
		let expr = Expression::And(
			Box::new(Expression::constant(false)),
			Box::new(Expression::identifier("missing_field")),
		);
		let result = evaluate(&expr, &doc(&[]), &NoParams).unwrap();
		assert_eq!(result, Value::Bool(false));
	}

	#[test]
	fn like_supports_percent_and_underscore() {
		assert!(like_match("hello", "h_l%"));
		assert!(!like_match("hello", "h_x%"));
	}

	#[test]
	fn any_quantifier_binds_loop_variable() {
		let expr = Expression::Quantified {
			every: false,
			var: "x".into(),
			source: Box::new(Expression::identifier("items")),
			predicate: Box::new(Expression::Compare {
				op: CompareOp::GreaterThan,
				l: Box::new(Expression::identifier("x")),
				r: Box::new(Expression::constant(2.0)),
			}),
		};
		let item = doc(&[("items", Value::Array(vec![Value::Number(1.0), Value::Number(3.0)]))]);
		assert_eq!(evaluate(&expr, &item, &NoParams).unwrap(), Value::Bool(true));
	}

	#[test]
	fn between_with_missing_bound_yields_null() {
		let expr = Expression::Between {
			expr: Box::new(Expression::constant(5.0)),
			low: Box::new(Expression::identifier("absent")),
			high: Box::new(Expression::constant(10.0)),
		};
		assert_eq!(evaluate(&expr, &doc(&[]), &NoParams).unwrap(), Value::Null);
	}
}
