//! Storage contracts and built-in stores for shared credential snapshots.
//!
//! A store holds one [`StoreSnapshot`] per service. Every read-modify-write goes through
//! [`CredentialStore::transact`], which implementations run under mutual exclusion (an advisory
//! file lock for [`FileStore`], a mutex for [`MemoryStore`]) so cooperating writers re-read,
//! purge, and write back instead of overwriting each other.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Layout version written to persisted snapshots; any other version is discarded on load.
pub const STORE_VERSION: u32 = 1;

/// Future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Mutation applied inside [`CredentialStore::transact`]; returns `true` when the snapshot
/// changed and must be written back.
pub type StoreMutation<'a> = Box<dyn FnOnce(&mut StoreSnapshot) -> bool + 'a + Send>;

/// Storage backend shared by every [`CredentialCache`](crate::credential::CredentialCache) of a
/// service.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Runs `mutation` against the current snapshot while holding the store's exclusive lock,
	/// persisting the result when the mutation reports a change.
	fn transact<'a>(&'a self, mutation: StoreMutation<'a>) -> StoreFuture<'a, ()>;

	/// Returns a copy of the current snapshot.
	fn snapshot(&self) -> StoreFuture<'_, StoreSnapshot>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Persisted record for one service: `{ version, tokens: { token -> entry } }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
	/// Layout version; see [`STORE_VERSION`].
	pub version: u32,
	/// Entries keyed by the opaque token string.
	pub tokens: BTreeMap<String, TokenEntry>,
}
impl StoreSnapshot {
	/// Removes entries whose validity window has elapsed and returns how many were dropped.
	pub fn purge_expired(&mut self, now: OffsetDateTime, validity: Duration) -> usize {
		let before = self.tokens.len();

		self.tokens.retain(|_, entry| !entry.is_expired_at(now, validity));

		before - self.tokens.len()
	}

	/// Tokens that are neither expired nor blocked at `now`, in key order.
	pub fn usable(&self, now: OffsetDateTime, validity: Duration) -> Vec<&str> {
		self.tokens
			.iter()
			.filter(|(_, entry)| entry.is_usable_at(now, validity))
			.map(|(token, _)| token.as_str())
			.collect()
	}
}
impl Default for StoreSnapshot {
	fn default() -> Self {
		Self { version: STORE_VERSION, tokens: BTreeMap::new() }
	}
}

/// Metadata kept per token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
	/// Instant the token was originated.
	#[serde(with = "time::serde::timestamp")]
	pub issued_at: OffsetDateTime,
	/// Instant before which the token must not be used.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::timestamp::option")]
	pub blocked_until: Option<OffsetDateTime>,
}
impl TokenEntry {
	/// Entry for a token issued at `issued_at`.
	pub fn issued(issued_at: OffsetDateTime) -> Self {
		Self { issued_at, blocked_until: None }
	}

	/// Returns `true` once `validity` has elapsed since issuance.
	pub fn is_expired_at(&self, now: OffsetDateTime, validity: Duration) -> bool {
		self.issued_at + validity <= now
	}

	/// Returns `true` while a block deadline lies in the future.
	pub fn is_blocked_at(&self, now: OffsetDateTime) -> bool {
		self.blocked_until.is_some_and(|until| until > now)
	}

	/// Returns `true` when the token is neither expired nor blocked.
	pub fn is_usable_at(&self, now: OffsetDateTime, validity: Duration) -> bool {
		!self.is_expired_at(now, validity) && !self.is_blocked_at(now)
	}
}
