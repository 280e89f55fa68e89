//! Scalar function dispatch table (spec §3.2 `FunctionCall`), grounded
//! on the teacher's `sql/function.rs` built-in registry: a flat match
//! on function name rather than a trait-object-per-function, since the
//! set is closed and small.
use crate::err::Error;
use crate::value::Value;

pub fn call_scalar(name: &str, args: &[Value]) -> Result<Value, Error> {
	match name.to_ascii_uppercase().as_str() {
		"LENGTH" => length(args),
		"UPPER" => string_map(args, |s| s.to_uppercase()),
		"LOWER" => string_map(args, |s| s.to_lowercase()),
		"TRIM" => string_map(args, |s| s.trim().to_string()),
		"ABS" => number_map(args, f64::abs),
		"CEIL" => number_map(args, f64::ceil),
		"FLOOR" => number_map(args, f64::floor),
		"ROUND" => number_map(args, f64::round),
		"CONCAT" => concat(args),
		"ARRAY_LENGTH" => array_length(args),
		other => Err(Error::runtime(format!("unknown function {other}"))),
	}
}

fn one_arg(args: &[Value], fname: &str) -> Result<&Value, Error> {
	match args {
		[v] => Ok(v),
		_ => Err(Error::runtime(format!("{fname} expects exactly one argument"))),
	}
}

fn length(args: &[Value]) -> Result<Value, Error> {
	let v = one_arg(args, "LENGTH")?;
	if v.is_null_or_missing() {
		return Ok(v.clone());
	}
	match v.as_str() {
		Some(s) => Ok(Value::Number(s.chars().count() as f64)),
		None => Ok(Value::Null),
	}
}

fn array_length(args: &[Value]) -> Result<Value, Error> {
	let v = one_arg(args, "ARRAY_LENGTH")?;
	if v.is_null_or_missing() {
		return Ok(v.clone());
	}
	match v.as_array() {
		Some(a) => Ok(Value::Number(a.len() as f64)),
		None => Ok(Value::Null),
	}
}

fn string_map(args: &[Value], f: impl FnOnce(&str) -> String) -> Result<Value, Error> {
	let v = one_arg(args, "string function")?;
	if v.is_null_or_missing() {
		return Ok(v.clone());
	}
	match v.as_str() {
		Some(s) => Ok(Value::String(f(s))),
		None => Ok(Value::Null),
	}
}

fn number_map(args: &[Value], f: impl FnOnce(f64) -> f64) -> Result<Value, Error> {
	let v = one_arg(args, "numeric function")?;
	if v.is_null_or_missing() {
		return Ok(v.clone());
	}
	match v.as_number() {
		Some(n) => Ok(Value::Number(f(n))),
		None => Ok(Value::Null),
	}
}

fn concat(args: &[Value]) -> Result<Value, Error> {
	let mut out = String::new();
	for v in args {
		if v.is_null_or_missing() {
			return Ok(v.clone());
		}
		match v.as_str() {
			Some(s) => out.push_str(s),
			None => return Ok(Value::Null),
		}
	}
	Ok(Value::String(out))
}
