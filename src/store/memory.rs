//! Thread-safe in-memory [`CredentialStore`] for single-process use and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreFuture, StoreMutation, StoreSnapshot},
};

/// Keeps the snapshot in-process; clones share the same snapshot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<Mutex<StoreSnapshot>>);
impl MemoryStore {
	/// Starts from an existing snapshot.
	pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
		Self(Arc::new(Mutex::new(snapshot)))
	}
}
impl CredentialStore for MemoryStore {
	fn transact<'a>(&'a self, mutation: StoreMutation<'a>) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.0.lock();

			mutation(&mut *guard);

			Ok(())
		})
	}

	fn snapshot(&self) -> StoreFuture<'_, StoreSnapshot> {
		let snapshot = self.0.lock().clone();

		Box::pin(async move { Ok(snapshot) })
	}
}
