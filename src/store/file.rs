//! File-backed [`CredentialStore`] shared by cooperating processes on one machine.

// std
use std::{
	env,
	fs::{self, File, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	service::ServiceId,
	store::{CredentialStore, STORE_VERSION, StoreError, StoreFuture, StoreMutation, StoreSnapshot},
};

/// Persists one [`StoreSnapshot`] as JSON, guarded by an advisory lock on a sibling
/// `<file>.lock`.
///
/// Every transaction locks, re-reads, mutates, writes back (via a temp file and rename), and
/// unlocks synchronously, so the lock is never held across an `.await`. A corrupt or
/// foreign-version file is logged, deleted, and treated as empty.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	lock_path: PathBuf,
}
impl FileStore {
	/// Opens a store at `path`, creating the parent directory when missing.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let mut lock_path = path.clone().into_os_string();

		lock_path.push(".lock");

		Ok(Self { path, lock_path: lock_path.into() })
	}

	/// Conventional per-user location: `$XDG_CACHE_HOME` when absolute, else `~/.cache`, then
	/// `<app>/<service>-credentials.json`.
	pub fn default_path(app: &str, service: &ServiceId) -> Result<PathBuf, StoreError> {
		let cache_home = env::var_os("XDG_CACHE_HOME")
			.map(PathBuf::from)
			.filter(|p| p.is_absolute())
			.or_else(|| {
				env::var_os("HOME")
					.or_else(|| env::var_os("USERPROFILE"))
					.map(|home| PathBuf::from(home).join(".cache"))
			})
			.ok_or_else(|| StoreError::Backend {
				message: "Neither XDG_CACHE_HOME nor a home directory is set".into(),
			})?;

		Ok(cache_home.join(app).join(format!("{service}-credentials.json")))
	}

	/// Opens the store at [`default_path`](Self::default_path).
	pub fn open_default(app: &str, service: &ServiceId) -> Result<Self, StoreError> {
		Self::open(Self::default_path(app, service)?)
	}

	/// Path of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn with_lock<T>(&self, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
		let lock = OpenOptions::new()
			.create(true)
			.truncate(false)
			.read(true)
			.write(true)
			.open(&self.lock_path)
			.map_err(|e| backend("open", &self.lock_path, e))?;

		lock.lock().map_err(|e| backend("lock", &self.lock_path, e))?;

		let result = f();

		lock.unlock().map_err(|e| backend("unlock", &self.lock_path, e))?;

		result
	}

	fn load(&self) -> Result<StoreSnapshot, StoreError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoreSnapshot::default()),
			Err(e) => return Err(backend("read", &self.path, e)),
		};

		if bytes.is_empty() {
			return Ok(StoreSnapshot::default());
		}

		match serde_json::from_slice::<StoreSnapshot>(&bytes) {
			Ok(snapshot) if snapshot.version == STORE_VERSION => Ok(snapshot),
			Ok(snapshot) => {
				log_event!(
					warn,
					path = %self.path.display(),
					version = snapshot.version,
					"Credential store has an unsupported version, discarding it"
				);

				self.discard()
			},
			Err(e) => {
				log_event!(
					warn,
					path = %self.path.display(),
					error = %e,
					"Credential store is corrupt, discarding it"
				);

				self.discard()
			},
		}
	}

	fn discard(&self) -> Result<StoreSnapshot, StoreError> {
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(StoreSnapshot::default()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreSnapshot::default()),
			Err(e) => Err(backend("remove", &self.path, e)),
		}
	}

	fn persist(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| backend("create", &tmp_path, e))?;

			file.write_all(&serialized).map_err(|e| backend("write", &tmp_path, e))?;
			file.sync_all().map_err(|e| backend("sync", &tmp_path, e))?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| backend("replace", &self.path, e))
	}

	fn transact_now(&self, mutation: StoreMutation<'_>) -> Result<(), StoreError> {
		self.with_lock(|| {
			let mut snapshot = self.load()?;

			if mutation(&mut snapshot) {
				self.persist(&snapshot)?;

				log_event!(debug, path = %self.path.display(), entries = snapshot.tokens.len(), "Credential store written");
			}

			Ok(())
		})
	}
}
impl CredentialStore for FileStore {
	fn transact<'a>(&'a self, mutation: StoreMutation<'a>) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.transact_now(mutation) })
	}

	fn snapshot(&self) -> StoreFuture<'_, StoreSnapshot> {
		Box::pin(async move { self.with_lock(|| self.load()) })
	}
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
		return Ok(());
	};
	let mut builder = fs::DirBuilder::new();

	builder.recursive(true);

	#[cfg(unix)]
	{
		use std::os::unix::fs::DirBuilderExt;

		builder.mode(0o700);
	}

	builder.create(parent).map_err(|e| backend("create directory", parent, e))
}

fn backend(action: &str, path: &Path, e: std::io::Error) -> StoreError {
	StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}

#[cfg(test)]
mod tests {
	// std
	use std::process;
	// self
	use super::*;
	use crate::store::TokenEntry;

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"scraper_core_file_store_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn cleanup(store: &FileStore) {
		let _ = fs::remove_file(&store.path);
		let _ = fs::remove_file(&store.lock_path);
	}

	#[tokio::test]
	async fn transact_persists_and_reloads() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("File store should open.");

		store
			.transact(Box::new(|snapshot| {
				snapshot.tokens.insert("abc".into(), TokenEntry::issued(OffsetDateTime::now_utc()));

				true
			}))
			.await
			.expect("Transaction should succeed.");

		let reopened = FileStore::open(&path).expect("File store should reopen.");
		let snapshot = reopened.snapshot().await.expect("Snapshot should load.");

		assert!(snapshot.tokens.contains_key("abc"));
		assert_eq!(snapshot.version, STORE_VERSION);

		cleanup(&store);
	}

	#[tokio::test]
	async fn clean_mutation_does_not_write() {
		let store = FileStore::open(temp_path("clean")).expect("File store should open.");

		store.transact(Box::new(|_| false)).await.expect("Transaction should succeed.");

		assert!(!store.path().exists());

		cleanup(&store);
	}

	#[tokio::test]
	async fn corrupt_or_foreign_store_is_discarded() {
		let store = FileStore::open(temp_path("corrupt")).expect("File store should open.");

		fs::write(store.path(), b"{not json").expect("Corrupt fixture should be written.");

		let snapshot = store.snapshot().await.expect("Corrupt store should read as empty.");

		assert!(snapshot.tokens.is_empty());
		assert!(!store.path().exists());

		fs::write(store.path(), br#"{"version":99,"tokens":{"x":{"issued_at":0}}}"#)
			.expect("Foreign-version fixture should be written.");

		let snapshot = store.snapshot().await.expect("Foreign store should read as empty.");

		assert!(snapshot.tokens.is_empty());

		cleanup(&store);
	}

	#[test]
	fn default_path_is_per_service() {
		let service = ServiceId::new("twitter-guest").expect("Service fixture should be valid.");

		if let Ok(path) = FileStore::default_path("scraper-core", &service) {
			assert!(path.ends_with("scraper-core/twitter-guest-credentials.json"));
		}
	}
}
