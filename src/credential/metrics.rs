// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for credential acquisition.
#[derive(Debug, Default)]
pub struct CredentialMetrics {
	reused: AtomicU64,
	selected: AtomicU64,
	issued: AtomicU64,
	invalidated: AtomicU64,
	failure: AtomicU64,
}
impl CredentialMetrics {
	/// Acquisitions answered by the credential already held in-process.
	pub fn reused(&self) -> u64 {
		self.reused.load(Ordering::Relaxed)
	}

	/// Acquisitions answered by selecting an entry from the shared store.
	pub fn selected(&self) -> u64 {
		self.selected.load(Ordering::Relaxed)
	}

	/// Credentials originated through the issuer.
	pub fn issued(&self) -> u64 {
		self.issued.load(Ordering::Relaxed)
	}

	/// Invalidations applied to a held credential.
	pub fn invalidated(&self) -> u64 {
		self.invalidated.load(Ordering::Relaxed)
	}

	/// Failed acquisitions.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_reused(&self) {
		self.reused.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_selected(&self) {
		self.selected.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_issued(&self) {
		self.issued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_invalidated(&self) {
		self.invalidated.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
