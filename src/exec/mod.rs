//! Streaming execution runtime (spec §4.5/§4.6/§4.7): the operator base
//! every plan node's runtime twin is built on, `Parallel` fan-out, scalar
//! function dispatch, and the aggregate hook pattern.
pub mod aggregate;
pub mod context;
pub mod filter;
pub mod functions;
pub mod operator;
pub mod parallel;

pub use context::Context;
pub use operator::{item_channel, run_with_recovery, stop_channel, Operator, ParentLink, RunOnceGuard};
pub use parallel::Parallel;
