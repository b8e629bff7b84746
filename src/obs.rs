//! Optional observability helpers for executor, credential, and pagination operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `scraper_core.op` with the `op` and `stage`
//!   (current step, e.g. `retry` or `issue`) fields, plus the per-attempt events logged by the executor.
//! - Enable `metrics` to increment the `scraper_core_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// One logical request driven through the retrying executor.
	Execute,
	/// Credential acquisition (cache hit, store selection, or origination).
	Acquire,
	/// Credential invalidation after a throttling signal.
	Invalidate,
	/// One page fetched by the cursor paginator.
	Paginate,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Execute => "execute",
			OpKind::Acquire => "acquire",
			OpKind::Invalidate => "invalidate",
			OpKind::Paginate => "paginate",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}

	/// Maps a result into its success/failure label.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure }
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
