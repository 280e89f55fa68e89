use crate::expr::Expression;

/// `FETCH path`: after the primary result set is computed, resolve a
/// reference-valued path into the referenced document inline (spec §3.3,
/// teacher concept `Fetchs`). Out of scope: the reference resolution
/// itself lives in the datastore layer, not in the algebra.
#[derive(Clone, Debug, PartialEq)]
pub struct Fetch {
	pub path: Expression,
}
