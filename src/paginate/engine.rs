//! The paginator: a lazy, single-pass, non-restartable walk over a cursor stream.

// crates.io
use futures::{Stream, stream};
// self
use crate::{
	_prelude::*,
	credential::CredentialCache,
	executor::RequestExecutor,
	obs::{self, OpKind, OpOutcome, OpSpan},
	paginate::{
		CursorState, CursorTemplate, Direction, FingerprintWindow, Page, PageContext,
		PageExtractor, Transition, page_fingerprint,
	},
	request::RequestDescriptor,
};

type ItemKey<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Tunables for the stall and cycle heuristics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginatorConfig {
	/// Extra requests allowed for a cursor that keeps coming back with an empty page.
	pub stall_retries: u32,
	/// Number of recent page fingerprints remembered for cycle detection; `0` disables it.
	pub fingerprint_window: usize,
}
impl PaginatorConfig {
	/// Overrides the stall budget.
	pub fn with_stall_retries(mut self, retries: u32) -> Self {
		self.stall_retries = retries;

		self
	}

	/// Overrides the fingerprint window size.
	pub fn with_fingerprint_window(mut self, size: usize) -> Self {
		self.fingerprint_window = size;

		self
	}
}
impl Default for PaginatorConfig {
	fn default() -> Self {
		Self { stall_retries: 3, fingerprint_window: 16 }
	}
}

/// Why a traversal ended without an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
	/// The server stopped offering continuations.
	Completed,
	/// A page repeated one already seen within the fingerprint window; it was not yielded.
	CycleDetected {
		/// Fingerprint of the repeated page.
		fingerprint: String,
		/// Cursor that produced the repeated page.
		cursor: Option<String>,
	},
}

/// Shared view of how a traversal ended.
///
/// Obtained from [`Paginator::termination_handle`]; it stays readable after the paginator has been
/// moved into [`Paginator::into_stream`].
#[derive(Clone, Debug, Default)]
pub struct TerminationHandle(Arc<Mutex<Option<Termination>>>);
impl TerminationHandle {
	/// How the traversal ended; `None` while it is still running or after a failure.
	pub fn get(&self) -> Option<Termination> {
		self.0.lock().clone()
	}

	/// Whether the traversal was stopped by a detected cycle.
	pub fn is_cycle(&self) -> bool {
		matches!(*self.0.lock(), Some(Termination::CycleDetected { .. }))
	}

	fn set(&self, termination: Termination) {
		*self.0.lock() = Some(termination);
	}
}

/// Walks a cursor stream page by page.
///
/// Nothing is fetched until [`next_page`](Self::next_page), [`next_item`](Self::next_item), or the
/// stream returned by [`into_stream`](Self::into_stream) is polled. Pages are requested strictly
/// one after another. Once the traversal stops or fails, every further call yields `None`.
pub struct Paginator<T> {
	executor: RequestExecutor,
	initial: RequestDescriptor,
	template: CursorTemplate,
	extractor: Arc<dyn PageExtractor<T>>,
	credentials: Option<Arc<CredentialCache>>,
	config: PaginatorConfig,
	item_key: Option<ItemKey<T>>,
	window: FingerprintWindow,
	state: CursorState,
	buffer: VecDeque<T>,
	termination: TerminationHandle,
	finished: bool,
}
impl<T> Paginator<T> {
	/// Creates a paginator that starts with `initial` and continues with `template`.
	pub fn new<E>(
		executor: RequestExecutor,
		initial: RequestDescriptor,
		template: CursorTemplate,
		extractor: E,
	) -> Self
	where
		E: 'static + PageExtractor<T>,
	{
		let config = PaginatorConfig::default();

		Self {
			executor,
			initial,
			template,
			extractor: Arc::new(extractor),
			credentials: None,
			window: FingerprintWindow::new(config.fingerprint_window),
			config,
			item_key: None,
			state: CursorState::new(Direction::default(), None),
			buffer: VecDeque::new(),
			termination: TerminationHandle::default(),
			finished: false,
		}
	}

	/// Starts from `cursor` through the template instead of sending the initial request.
	pub fn starting_at(mut self, cursor: impl Into<String>) -> Self {
		self.state.cursor = Some(cursor.into());

		self
	}

	/// Sets the traversal mode.
	pub fn direction(mut self, mode: Direction) -> Self {
		self.state = CursorState::new(mode, self.state.cursor.take());

		self
	}

	/// Acquires a credential from `cache` before every page request.
	pub fn with_credentials(mut self, cache: Arc<CredentialCache>) -> Self {
		self.credentials = Some(cache);

		self
	}

	/// Overrides the stall and cycle tunables.
	pub fn with_config(mut self, config: PaginatorConfig) -> Self {
		self.window = FingerprintWindow::new(config.fingerprint_window);
		self.config = config;

		self
	}

	/// Enables cycle detection, identifying items by `key`.
	pub fn detect_cycles_by<F>(mut self, key: F) -> Self
	where
		F: 'static + Fn(&T) -> String + Send + Sync,
	{
		self.item_key = Some(Arc::new(key));

		self
	}

	/// Current traversal state.
	pub fn state(&self) -> &CursorState {
		&self.state
	}

	/// How the traversal ended; `None` while it is still running or after a failure.
	pub fn termination(&self) -> Option<Termination> {
		self.termination.get()
	}

	/// Handle reporting the termination once this paginator has been turned into a stream.
	pub fn termination_handle(&self) -> TerminationHandle {
		self.termination.clone()
	}

	/// Whether the traversal is over.
	pub fn is_finished(&self) -> bool {
		self.finished
	}

	/// Fetches and returns the next page, or `None` once the traversal has ended.
	///
	/// The page ending the traversal is still returned; the following call yields `None`. A
	/// failure is returned once and ends the traversal.
	pub async fn next_page(&mut self) -> Result<Option<Page<T>>> {
		if self.finished {
			return Ok(None);
		}

		let stage = match (&self.state.cursor, self.state.stalls) {
			(None, _) => "initial",
			(Some(_), 0) => "cursor",
			(Some(_), _) => "stall_retry",
		};
		let span = OpSpan::new(OpKind::Paginate, stage);

		obs::record_op_outcome(OpKind::Paginate, OpOutcome::Attempt);

		let result = span.instrument(self.fetch_page()).await;

		obs::record_op_outcome(OpKind::Paginate, OpOutcome::of(&result));

		if result.is_err() {
			self.finished = true;
		}

		result
	}

	/// Returns the next item, fetching further pages as needed.
	pub async fn next_item(&mut self) -> Result<Option<T>> {
		loop {
			if let Some(item) = self.buffer.pop_front() {
				return Ok(Some(item));
			}

			match self.next_page().await? {
				Some(page) => self.buffer.extend(page.items),
				None => return Ok(None),
			}
		}
	}

	/// Converts the paginator into a stream of items.
	///
	/// The stream ends after the first error it yields. Take a
	/// [`termination_handle`](Self::termination_handle) first to learn whether it ended normally
	/// or on a detected cycle.
	pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
		stream::unfold(self, |mut paginator| async move {
			match paginator.next_item().await {
				Ok(Some(item)) => Some((Ok(item), paginator)),
				Ok(None) => None,
				Err(e) => Some((Err(e), paginator)),
			}
		})
	}

	async fn fetch_page(&mut self) -> Result<Option<Page<T>>> {
		if self.executor.cancellation().is_cancelled() {
			return Err(Error::Cancelled);
		}
		if let Some(cache) = &self.credentials {
			cache.acquire().await?;
		}

		let requested = self.state.cursor.clone();
		let descriptor = match &requested {
			Some(cursor) => self.template.with_cursor(cursor),
			None => self.initial.clone(),
		};
		let ctx = PageContext {
			direction: self.state.direction,
			capture_opposite: self.state.wants_opposite(),
			page_index: self.state.requests,
		};
		let mut response = self.executor.execute(&descriptor).await?;

		self.state.requests += 1;

		let page = self.extractor.extract(&mut response, &ctx).map_err(|e| {
			Error::MalformedResponse { url: response.final_url.clone(), reason: e.reason }
		})?;

		log_event!(
			debug,
			page = ctx.page_index,
			items = page.items.len(),
			direction = %ctx.direction,
			"Page extracted"
		);

		if let Some(fingerprint) = self.repeated_fingerprint(&page) {
			log_event!(
				warn,
				cursor = requested.as_deref().unwrap_or_default(),
				%fingerprint,
				"Pagination cycle detected, stopping"
			);

			self.finish(Termination::CycleDetected { fingerprint, cursor: requested });

			return Ok(None);
		}
		if self.state.advance(&page, self.config.stall_retries) == Transition::Stop {
			log_event!(debug, requests = self.state.requests, "Pagination completed");

			self.finish(Termination::Completed);
		}

		Ok(Some(page))
	}

	fn repeated_fingerprint(&mut self, page: &Page<T>) -> Option<String> {
		let key = self.item_key.as_ref()?;

		if page.items.is_empty() || !self.window.is_enabled() {
			return None;
		}

		let fingerprint = page_fingerprint(page.items.iter().map(|item| key(item)));

		self.window.observe(&fingerprint).then_some(fingerprint)
	}

	fn finish(&mut self, termination: Termination) {
		self.termination.set(termination);
		self.finished = true;
	}
}
impl<T> Debug for Paginator<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Paginator")
			.field("state", &self.state)
			.field("config", &self.config)
			.field("buffered", &self.buffer.len())
			.field("termination", &self.termination.get())
			.field("finished", &self.finished)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::StreamExt;
	use serde_json::{Value, json};
	// self
	use super::*;
	use crate::{
		_preludet::*,
		paginate::{ExtractError, ScrollDirection},
		request::{Method, Response, expect_json},
	};

	const URL: &str = "https://api.example.com/2/timeline.json";

	/// Test payload: `{"items": [..], "top": .., "bottom": .., "prompt": .., "stop": ..}`.
	fn extract(response: &mut Response, ctx: &PageContext) -> Result<Page<String>, ExtractError> {
		let body = response.json()?.clone();
		let items = body
			.get("items")
			.and_then(Value::as_array)
			.ok_or_else(|| ExtractError::missing("items"))?
			.iter()
			.filter_map(|v| v.as_str().map(str::to_owned))
			.collect();
		let cursor = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_owned);
		let (primary, opposite) = match ctx.direction {
			ScrollDirection::Forward => (cursor("top"), cursor("bottom")),
			ScrollDirection::Backward => (cursor("bottom"), None),
		};
		let mut page = Page::new(items);

		page.primary = primary;
		page.alternate = cursor("prompt");
		page.stop_on_empty = body.get("stop").and_then(Value::as_bool);

		if ctx.capture_opposite && let Some(bottom) = opposite {
			page = page.with_opposite(bottom, false);
		}

		Ok(page)
	}

	fn paginator(transport: &ScriptedTransport, retries: u32) -> Paginator<String> {
		paginator_over(scripted_executor(transport, retries), retries)
	}

	fn paginator_over(executor: RequestExecutor, retries: u32) -> Paginator<String> {
		let initial = RequestDescriptor::parse(Method::Get, URL)
			.expect("Fixture URL should parse.")
			.query("q", "rust")
			.validate_with(expect_json());

		Paginator::new(executor, initial.clone(), CursorTemplate::query(initial, "cursor"), extract)
			.with_config(PaginatorConfig::default().with_stall_retries(retries))
	}

	fn page(body: Value) -> ScriptedReply {
		Ok(json_response(URL, 200, body))
	}

	fn cursors(transport: &ScriptedTransport) -> Vec<Option<String>> {
		transport
			.sent()
			.iter()
			.map(|sent| {
				sent.request
					.url
					.query_pairs()
					.find(|(k, _)| k == "cursor")
					.map(|(_, v)| v.into_owned())
			})
			.collect()
	}

	async fn drain(paginator: &mut Paginator<String>) -> Vec<String> {
		let mut items = Vec::new();

		while let Some(item) = paginator.next_item().await.expect("Traversal should not fail.") {
			items.push(item);
		}

		items
	}

	#[tokio::test]
	async fn transient_echo_is_retried_and_traversal_completes() {
		let transport = ScriptedTransport::new([
			page(json!({"items": ["a", "b"], "top": "B"})),
			page(json!({"items": [], "top": "B"})),
			page(json!({"items": ["c"]})),
		]);
		let mut paginator = paginator(&transport, 1);

		assert_eq!(drain(&mut paginator).await, ["a", "b", "c"]);
		assert_eq!(cursors(&transport), [None, Some("B".into()), Some("B".into())]);
		assert_eq!(paginator.termination(), Some(Termination::Completed));
		assert!(paginator.next_page().await.expect("Finished paginator should not fail.").is_none());
	}

	#[tokio::test]
	async fn stalled_cursor_is_requested_retries_plus_one_times() {
		let retries = 3;
		let transport = ScriptedTransport::new(
			std::iter::once(page(json!({"items": ["a"], "top": "C"})))
				.chain((0..=retries).map(|_| page(json!({"items": [], "top": "C"})))),
		);
		let mut paginator = paginator(&transport, retries);

		assert_eq!(drain(&mut paginator).await, ["a"]);

		let requested_c = cursors(&transport).iter().filter(|c| c.as_deref() == Some("C")).count();

		assert_eq!(requested_c, retries as usize + 1);
		assert_eq!(transport.sent_count(), retries as usize + 2);
		assert_eq!(paginator.state().stalls, retries + 1);
	}

	#[tokio::test]
	async fn both_mode_finishes_forward_then_walks_the_deferred_cursor() {
		let transport = ScriptedTransport::new([
			page(json!({"items": ["f1"], "top": "T1", "bottom": "B1"})),
			page(json!({"items": ["f2"], "top": "T2", "bottom": "B-later"})),
			page(json!({"items": [], "stop": true, "top": "T3"})),
			page(json!({"items": ["b1"], "bottom": "B2"})),
			page(json!({"items": ["b2"]})),
		]);
		let mut paginator = paginator(&transport, 3).direction(Direction::Both);

		assert_eq!(drain(&mut paginator).await, ["f1", "f2", "b1", "b2"]);
		assert_eq!(
			cursors(&transport),
			[
				None,
				Some("T1".into()),
				Some("T2".into()),
				Some("B1".into()),
				Some("B2".into())
			]
		);
		assert_eq!(paginator.state().direction, ScrollDirection::Backward);
	}

	#[tokio::test]
	async fn repeated_page_ends_with_a_cycle_instead_of_looping() {
		let transport = ScriptedTransport::new([
			page(json!({"items": ["a", "b"], "top": "X"})),
			page(json!({"items": ["c"], "top": "Y"})),
			page(json!({"items": ["b", "a"], "top": "X"})),
		]);
		let mut paginator = paginator(&transport, 3).detect_cycles_by(|item: &String| item.clone());

		assert_eq!(drain(&mut paginator).await, ["a", "b", "c"]);
		assert!(matches!(
			paginator.termination(),
			Some(Termination::CycleDetected { cursor: Some(cursor), .. }) if cursor == "Y"
		));
	}

	#[tokio::test]
	async fn stream_consumers_can_tell_a_cycle_from_completion() {
		let cycling = ScriptedTransport::new([
			page(json!({"items": ["a"], "top": "X"})),
			page(json!({"items": ["a"], "top": "X"})),
		]);
		let completing = ScriptedTransport::new([page(json!({"items": ["a"]}))]);
		let cycled = paginator(&cycling, 3).detect_cycles_by(|item: &String| item.clone());
		let completed = paginator(&completing, 3).detect_cycles_by(|item: &String| item.clone());
		let cycled_end = cycled.termination_handle();
		let completed_end = completed.termination_handle();

		assert!(cycled_end.get().is_none());

		let cycled_items = cycled.into_stream().collect::<Vec<_>>().await;
		let completed_items = completed.into_stream().collect::<Vec<_>>().await;

		assert_eq!(cycled_items.len(), 1);
		assert_eq!(completed_items.len(), 1);
		assert!(cycled_end.is_cycle());
		assert!(matches!(
			cycled_end.get(),
			Some(Termination::CycleDetected { cursor: Some(cursor), .. }) if cursor == "X"
		));
		assert!(!completed_end.is_cycle());
		assert_eq!(completed_end.get(), Some(Termination::Completed));
	}

	#[tokio::test]
	async fn cancellation_between_pages_stops_without_further_requests() {
		let transport = ScriptedTransport::new([
			page(json!({"items": ["a"], "top": "B"})),
			page(json!({"items": ["b"]})),
		]);
		let token = CancellationToken::new();
		let mut paginator =
			paginator_over(scripted_executor(&transport, 3).with_cancellation(token.clone()), 3);

		assert!(paginator.next_page().await.expect("First page should load.").is_some());

		token.cancel();

		let err = paginator.next_page().await.expect_err("Cancelled traversal should fail.");

		assert!(matches!(err, Error::Cancelled));
		assert_eq!(transport.sent_count(), 1);
		assert!(paginator.next_item().await.expect("Cancelled paginator should be inert.").is_none());
		assert!(paginator.termination().is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn cancellation_during_page_backoff_aborts_the_traversal() {
		let transport = ScriptedTransport::new([
			page(json!({"items": ["a"], "top": "B"})),
			Ok(text_response(URL, 503, "busy")),
			page(json!({"items": ["b"]})),
		]);
		let token = CancellationToken::new();
		let mut paginator =
			paginator_over(scripted_executor(&transport, 3).with_cancellation(token.clone()), 3);

		assert_eq!(paginator.next_item().await.expect("First item should load."), Some("a".into()));

		let canceller = tokio::spawn(async move {
			tokio::time::sleep(std::time::Duration::from_millis(500)).await;
			token.cancel();
		});
		let err = paginator.next_item().await.expect_err("Cancellation should abort the backoff.");

		canceller.await.expect("Canceller task should finish.");

		assert!(matches!(err, Error::Cancelled));
		assert_eq!(transport.sent_count(), 2);
		assert!(paginator.is_finished());
	}

	#[tokio::test]
	async fn malformed_page_is_fatal_and_not_retried() {
		let transport = ScriptedTransport::new([page(json!({"timeline": {}}))]);
		let mut paginator = paginator(&transport, 3);
		let err = paginator.next_item().await.expect_err("Missing items should be fatal.");

		assert!(matches!(err, Error::MalformedResponse { ref reason, .. } if reason.contains("items")));
		assert_eq!(transport.sent_count(), 1);
		assert!(paginator.next_item().await.expect("Failed paginator should be inert.").is_none());
		assert!(paginator.termination().is_none());
	}

	#[tokio::test]
	async fn starting_cursor_skips_the_initial_request_and_streams_items() {
		let transport = ScriptedTransport::new([page(json!({"items": ["z"]}))]);
		let items = paginator(&transport, 0)
			.starting_at("S")
			.into_stream()
			.collect::<Vec<_>>()
			.await;

		assert_eq!(items.len(), 1);
		assert_eq!(items[0].as_deref().ok(), Some("z"));
		assert_eq!(cursors(&transport), [Some("S".into())]);
	}
}
