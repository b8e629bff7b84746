//! Per-process credential cache backed by a shared store.

// crates.io
use rand::seq::IndexedRandom;
// self
use crate::{
	_prelude::*,
	credential::{Credential, CredentialIssuer, CredentialMetrics},
	executor::RequestExecutor,
	obs::{self, OpKind, OpOutcome, OpSpan},
	service::ServiceId,
	store::{CredentialStore, TokenEntry},
};

/// Validity and blocking policy for one service's credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
	/// Lifetime of a credential from issuance; entries older than this are purged.
	pub validity: Duration,
	/// Block applied by [`CredentialCache::invalidate`] when no deadline is supplied.
	pub default_block: Duration,
	/// Ceiling for any block deadline, measured from the moment of invalidation.
	pub max_block: Duration,
}
impl CacheConfig {
	/// Overrides the validity window.
	pub fn with_validity(mut self, validity: Duration) -> Self {
		self.validity = validity;

		self
	}

	/// Overrides the default block.
	pub fn with_default_block(mut self, block: Duration) -> Self {
		self.default_block = block;

		self
	}

	/// Overrides the block ceiling.
	pub fn with_max_block(mut self, block: Duration) -> Self {
		self.max_block = block;

		self
	}

	fn block_deadline(&self, now: OffsetDateTime, requested: Option<OffsetDateTime>) -> OffsetDateTime {
		let ceiling = now + self.max_block.max(Duration::ZERO);

		requested.unwrap_or(now + self.default_block).clamp(now, ceiling)
	}
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			validity: Duration::hours(3),
			default_block: Duration::minutes(15),
			max_block: Duration::hours(1),
		}
	}
}

/// Hands out usable credentials for one service.
///
/// One instance lives for the duration of a scraper run and is shared (behind an [`Arc`]) by
/// every paginator, signer, and guard of that run. Cooperating processes share only the
/// [`CredentialStore`].
pub struct CredentialCache {
	service: ServiceId,
	store: Arc<dyn CredentialStore>,
	issuer: Arc<dyn CredentialIssuer>,
	executor: RequestExecutor,
	config: CacheConfig,
	current: Mutex<Option<Credential>>,
	origination: AsyncMutex<()>,
	metrics: Arc<CredentialMetrics>,
}
impl CredentialCache {
	/// Creates a cache for `service`; issuance requests go through `executor`.
	pub fn new(
		service: ServiceId,
		store: Arc<dyn CredentialStore>,
		issuer: Arc<dyn CredentialIssuer>,
		executor: RequestExecutor,
	) -> Self {
		Self {
			service,
			store,
			issuer,
			executor,
			config: CacheConfig::default(),
			current: Mutex::new(None),
			origination: AsyncMutex::new(()),
			metrics: Default::default(),
		}
	}

	/// Overrides the validity and blocking policy.
	pub fn with_config(mut self, config: CacheConfig) -> Self {
		self.config = config;

		self
	}

	/// Service this cache serves.
	pub fn service(&self) -> &ServiceId {
		&self.service
	}

	/// Active configuration.
	pub fn config(&self) -> &CacheConfig {
		&self.config
	}

	/// Acquisition counters.
	pub fn metrics(&self) -> &CredentialMetrics {
		&self.metrics
	}

	/// Credential currently held in-process, if any.
	pub fn current(&self) -> Option<Credential> {
		self.current.lock().clone()
	}

	/// Returns a credential that is neither expired nor blocked.
	///
	/// Order of preference: the held credential, a uniformly random usable entry from the store,
	/// then a freshly originated one. Concurrent callers in one process share a single
	/// origination.
	pub async fn acquire(&self) -> Result<Credential> {
		const KIND: OpKind = OpKind::Acquire;

		let span = OpSpan::new(KIND, "held");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.acquire_inner(&span)).await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	async fn acquire_inner(&self, span: &OpSpan) -> Result<Credential> {
		if let Some(held) = self.held() {
			self.metrics.record_reused();

			return Ok(held);
		}

		let _singleflight = self.origination.lock().await;

		if let Some(held) = self.held() {
			self.metrics.record_reused();

			return Ok(held);
		}

		span.record_stage("select");

		if let Some(selected) = self.select_from_store().await? {
			log_event!(debug, service = %self.service, token = %selected.token, "Credential selected from store");

			*self.current.lock() = Some(selected.clone());
			self.metrics.record_selected();

			return Ok(selected);
		}

		span.record_stage("issue");

		let issued = self.originate().await?;

		log_event!(info, service = %self.service, token = %issued.token, "Credential originated");

		*self.current.lock() = Some(issued.clone());
		self.metrics.record_issued();

		Ok(issued)
	}

	/// Blocks the held credential until `block_until` (or for the configured default block),
	/// clamped to `[now, now + max_block]`, and drops it so the next [`acquire`](Self::acquire)
	/// picks another one. Does nothing when no credential is held.
	pub async fn invalidate(&self, block_until: Option<OffsetDateTime>) -> Result<()> {
		const KIND: OpKind = OpKind::Invalidate;

		let span = OpSpan::new(KIND, "block");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let Some(held) = self.current.lock().take() else {
					return Ok(());
				};
				let until = self.config.block_deadline(OffsetDateTime::now_utc(), block_until);
				let token = held.token.expose().to_owned();

				log_event!(info, service = %self.service, token = %held.token, %until, "Credential blocked");

				self.store
					.transact(Box::new(move |snapshot| match snapshot.tokens.get_mut(&token) {
						Some(entry) => {
							entry.blocked_until = Some(until);

							true
						},
						None => false,
					}))
					.await?;
				self.metrics.record_invalidated();

				Ok(())
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	fn held(&self) -> Option<Credential> {
		let now = OffsetDateTime::now_utc();

		self.current.lock().as_ref().filter(|c| c.is_usable_at(now)).cloned()
	}

	async fn select_from_store(&self) -> Result<Option<Credential>> {
		let validity = self.config.validity;
		let mut picked: Option<(String, TokenEntry)> = None;
		let slot = &mut picked;

		self.store
			.transact(Box::new(move |snapshot| {
				let now = OffsetDateTime::now_utc();
				let purged = snapshot.purge_expired(now, validity);
				let usable = snapshot.usable(now, validity);

				*slot = usable.choose(&mut rand::rng()).and_then(|token| {
					snapshot.tokens.get(*token).map(|entry| ((*token).to_owned(), *entry))
				});

				purged > 0
			}))
			.await?;

		Ok(picked.map(|(token, entry)| Credential::from_entry(token, &entry, validity)))
	}

	async fn originate(&self) -> Result<Credential> {
		let token = self.issuer.issue(&self.executor).await.map_err(|e| match e {
			Error::Cancelled | Error::CredentialUnavailable { .. } => e,
			other => Error::CredentialUnavailable { reason: other.to_string() },
		})?;
		let validity = self.config.validity;
		let entry = TokenEntry::issued(OffsetDateTime::now_utc());
		let stored = token.clone();

		self.store
			.transact(Box::new(move |snapshot| {
				snapshot.purge_expired(entry.issued_at, validity);
				snapshot.tokens.insert(stored, entry);

				true
			}))
			.await?;

		Ok(Credential::from_entry(token, &entry, validity))
	}
}
impl Debug for CredentialCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialCache")
			.field("service", &self.service)
			.field("config", &self.config)
			.field("current", &self.current.lock().as_ref().map(|c| c.token.fingerprint()))
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		credential::{EndpointIssuer, IssueStep},
		request::{Method, RequestDescriptor},
		store::{MemoryStore, StoreSnapshot},
	};

	const ACTIVATE: &str = "https://api.example.com/1.1/guest/activate.json";

	fn cache(transport: &ScriptedTransport, store: MemoryStore) -> CredentialCache {
		let issuer = EndpointIssuer::new().step(IssueStep::json_field(
			RequestDescriptor::parse(Method::Post, ACTIVATE).expect("Fixture URL should parse."),
			"guest_token",
		));

		CredentialCache::new(
			ServiceId::new("twitter-guest").expect("Service fixture should be valid."),
			Arc::new(store),
			Arc::new(issuer),
			scripted_executor(transport, 0),
		)
	}

	fn token_reply(token: &str) -> ScriptedReply {
		Ok(json_response(ACTIVATE, 200, json!({ "guest_token": token })))
	}

	#[tokio::test]
	async fn empty_store_originates_once_then_reuses() {
		let transport = ScriptedTransport::new([token_reply("t1")]);
		let store = MemoryStore::default();
		let cache = cache(&transport, store.clone());
		let first = cache.acquire().await.expect("Origination should succeed.");
		let second = cache.acquire().await.expect("Reuse should succeed.");

		assert_eq!(first.token.expose(), "t1");
		assert_eq!(second, first);
		assert_eq!(transport.sent_count(), 1);
		assert_eq!(cache.metrics().issued(), 1);
		assert_eq!(cache.metrics().reused(), 1);
		assert_eq!(store.snapshot().await.expect("Snapshot should load.").tokens.len(), 1);
	}

	#[tokio::test]
	async fn selects_usable_entries_and_purges_expired_ones() {
		let now = OffsetDateTime::now_utc();
		let mut snapshot = StoreSnapshot::default();

		snapshot.tokens.insert("stale".into(), TokenEntry::issued(now - Duration::hours(4)));
		snapshot.tokens.insert(
			"blocked".into(),
			TokenEntry { issued_at: now, blocked_until: Some(now + Duration::minutes(5)) },
		);
		snapshot.tokens.insert("good".into(), TokenEntry::issued(now - Duration::minutes(1)));

		let transport = ScriptedTransport::default();
		let store = MemoryStore::with_snapshot(snapshot);
		let cache = cache(&transport, store.clone());
		let credential = cache.acquire().await.expect("Selection should succeed.");
		let left = store.snapshot().await.expect("Snapshot should load.");

		assert_eq!(credential.token.expose(), "good");
		assert_eq!(transport.sent_count(), 0);
		assert!(!left.tokens.contains_key("stale"));
		assert_eq!(cache.metrics().selected(), 1);
	}

	#[tokio::test]
	async fn invalidate_blocks_and_forces_a_new_credential() {
		let transport = ScriptedTransport::new([token_reply("t1"), token_reply("t2")]);
		let store = MemoryStore::default();
		let cache = cache(&transport, store.clone());

		cache.acquire().await.expect("Origination should succeed.");

		let deadline = OffsetDateTime::now_utc() + Duration::minutes(10);

		cache.invalidate(Some(deadline)).await.expect("Invalidation should succeed.");

		assert!(cache.current().is_none());

		let next = cache.acquire().await.expect("Second origination should succeed.");
		let snapshot = store.snapshot().await.expect("Snapshot should load.");
		let blocked = snapshot.tokens.get("t1").expect("Blocked entry should be kept.");

		assert_eq!(next.token.expose(), "t2");
		assert_eq!(blocked.blocked_until.map(|t| t.unix_timestamp()), Some(deadline.unix_timestamp()));
		assert_eq!(cache.metrics().invalidated(), 1);
	}

	#[test]
	fn block_deadline_is_clamped() {
		let config = CacheConfig::default();
		let now = OffsetDateTime::now_utc();

		assert_eq!(config.block_deadline(now, None), now + Duration::minutes(15));
		assert_eq!(config.block_deadline(now, Some(now + Duration::days(2))), now + Duration::hours(1));
		assert_eq!(config.block_deadline(now, Some(now - Duration::hours(1))), now);
	}

	#[tokio::test]
	async fn issuance_failure_is_credential_unavailable() {
		let transport = ScriptedTransport::new([Ok(text_response(ACTIVATE, 503, "down"))]);
		let cache = cache(&transport, MemoryStore::default());
		let err = cache.acquire().await.expect_err("Issuance without a token should fail.");

		assert!(matches!(err, Error::CredentialUnavailable { .. }));
		assert_eq!(cache.metrics().failures(), 1);
	}
}
