//! Crate-wide error type.
//!
//! Mirrors the error-kind taxonomy every layer of the engine reports
//! against: parse/lex, semantic (formalization), plan, runtime, and the
//! catch-all internal kind a panic boundary converts into.
use std::fmt;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
	/// A parse or lex error, reported at algebra construction time.
	#[error("parse error at offset {offset}: {message}")]
	Parse { message: String, offset: usize },

	/// Formalization failed: undefined identifier, duplicate alias, or a
	/// missing FROM alias.
	#[error("semantic error: {0}")]
	Semantic(String),

	/// The planner could not produce a usable plan: index not found, a
	/// capability downcast failed, or plan unmarshalling failed.
	#[error("plan error: {0}")]
	Plan(String),

	/// A runtime/evaluation failure: bad aggregate partial, datastore
	/// failure, authentication denial.
	#[error("runtime error: {0}")]
	Runtime(String),

	/// The request was cancelled (client disconnect or deadline) while an
	/// operator was still running.
	#[error("request cancelled")]
	Cancelled,

	/// A bug: surfaced from a caught panic. Never constructed directly by
	/// engine logic.
	#[error("internal error: {0}")]
	Internal(String),
}

impl Error {
	pub fn semantic(message: impl Into<String>) -> Self {
		Self::Semantic(message.into())
	}

	pub fn plan(message: impl Into<String>) -> Self {
		Self::Plan(message.into())
	}

	pub fn runtime(message: impl Into<String>) -> Self {
		Self::Runtime(message.into())
	}

	/// Converts a caught panic payload into an internal error, the way an
	/// operator's `run_once` recovery boundary (spec: execution §4.5) is
	/// required to.
	pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
		let message = describe_panic(payload);
		Self::Internal(message)
	}
}

fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"operator panicked with a non-string payload".to_string()
	}
}

impl<T> From<channel::SendError<T>> for Error {
	fn from(_: channel::SendError<T>) -> Self {
		Error::Internal("send on a closed item channel".to_string())
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(e: tokio::task::JoinError) -> Self {
		if e.is_panic() {
			Error::Internal(format!("operator task panicked: {e}"))
		} else {
			Error::Cancelled
		}
	}
}

/// A lightweight wrapper used to attach a byte offset to otherwise
/// offset-less error construction sites (e.g. when the parser stack only
/// has a node, not the original source span, at hand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub usize);

impl fmt::Display for Offset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
