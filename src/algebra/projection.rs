use crate::expr::Expression;

/// A single projected output column (spec §3.3).
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
	/// `SELECT *` for one alias, or the whole primary document.
	All {
		alias: Option<String>,
	},
	Single {
		expr: Expression,
		/// `AS name`, defaulting to the expression's own rendered text
		/// when omitted (spec §3.3).
		alias: String,
	},
}

#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
	pub fields: Vec<Field>,
	/// `SELECT DISTINCT`: de-duplicates whole result rows (spec §4.6,
	/// distinct from the per-aggregate `DISTINCT` keyword in §4.7).
	pub distinct: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
	Asc,
	Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
	pub expr: Expression,
	pub direction: OrderDirection,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupBy {
	pub keys: Vec<Expression>,
}
