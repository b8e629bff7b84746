//! Rolling window of page fingerprints used to detect pagination cycles.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Fingerprint of a page: SHA-256 over its sorted, de-duplicated item keys.
///
/// Order-insensitive, so a server replaying the same page in a different order still matches.
pub fn page_fingerprint<I, K>(keys: I) -> String
where
	I: IntoIterator<Item = K>,
	K: AsRef<str>,
{
	let mut keys = keys.into_iter().map(|k| k.as_ref().to_owned()).collect::<Vec<_>>();

	keys.sort_unstable();
	keys.dedup();

	let mut hasher = Sha256::new();

	for (i, key) in keys.iter().enumerate() {
		if i > 0 {
			hasher.update(b"\n");
		}

		hasher.update(key.as_bytes());
	}

	STANDARD_NO_PAD.encode(hasher.finalize())
}

/// The last `capacity` fingerprints seen.
#[derive(Clone, Debug, Default)]
pub struct FingerprintWindow {
	capacity: usize,
	seen: VecDeque<String>,
}
impl FingerprintWindow {
	/// Window remembering `capacity` fingerprints; `0` never reports a repeat.
	pub fn new(capacity: usize) -> Self {
		Self { capacity, seen: VecDeque::with_capacity(capacity) }
	}

	/// Whether the window remembers anything at all.
	pub fn is_enabled(&self) -> bool {
		self.capacity > 0
	}

	/// Records `fingerprint`; returns `true` when it is already in the window.
	pub fn observe(&mut self, fingerprint: &str) -> bool {
		if !self.is_enabled() {
			return false;
		}
		if self.seen.iter().any(|seen| seen == fingerprint) {
			return true;
		}
		if self.seen.len() == self.capacity {
			self.seen.pop_front();
		}

		self.seen.push_back(fingerprint.to_owned());

		false
	}
}
