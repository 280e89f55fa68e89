//! Runtime-tunable knobs, parsed from the environment with compiled-in
//! fallbacks. Nothing here changes query semantics; these are resource
//! and fan-out limits only.
use once_cell::sync::Lazy;

/// Fan-out ceiling for a composed [`crate::planner::span::SargSpans`]. A
/// composition whose cartesian size would exceed this is truncated and
/// marked inexact (see `planner::sarg::compose_keys`).
pub const FULL_SPAN_FANOUT: usize = 8192;

/// Capacity of the bounded item channel between two pipeline operators.
pub static OPERATOR_CHANNEL_BUFFER_SIZE: Lazy<usize> =
	lazy_env_parse!("DOCQL_OPERATOR_CHANNEL_BUFFER_SIZE", usize, 256);

/// Default degree of fan-out for a `Parallel` operator when the request
/// does not specify a `MaxParallelism`.
pub static DEFAULT_MAX_PARALLELISM: Lazy<usize> =
	lazy_env_parse!("DOCQL_MAX_PARALLELISM", usize, 4);

/// Upper bound on how many scan/fetch operators may have in-flight work at
/// once across a single request, independent of the parallelism of any one
/// `Parallel` operator.
#[allow(dead_code)]
pub const MAX_CONCURRENT_TASKS: usize = 64;

/// Batch size used by index scan operators when pulling documents from the
/// datastore.
pub const PROCESSOR_BATCH_SIZE: usize = 50;
