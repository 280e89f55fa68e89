#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

#[doc(hidden)]
pub mod cnf;
#[doc(hidden)]
pub mod err;

pub mod value;

pub mod expr;

pub mod algebra;

pub mod plan;

pub mod planner;

pub mod exec;

pub mod datastore;
