// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"scraper_core_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_op_outcome_accepts_every_label() {
		for kind in [OpKind::Execute, OpKind::Acquire, OpKind::Invalidate, OpKind::Paginate] {
			record_op_outcome(kind, OpOutcome::Attempt);
			record_op_outcome(kind, OpOutcome::Failure);
		}
	}
}
