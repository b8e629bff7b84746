//! Retrying request executor with exponential backoff and caller-defined validation.

// self
use crate::{
	_prelude::*,
	error::AttemptFailure,
	http::HttpTransport,
	obs::{self, OpKind, OpOutcome, OpSpan},
	request::{RequestDescriptor, Response},
};

/// Retry budget and backoff schedule for [`RequestExecutor`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
	/// Retries after the first attempt; a request is sent at most `retries + 1` times.
	pub retries: u32,
	/// Delay before the first retry; doubles for every following one.
	pub backoff_base: Duration,
	/// Ceiling applied to any single backoff delay.
	pub max_backoff: Duration,
}
impl ExecutorConfig {
	/// Overrides the retry budget.
	pub fn with_retries(mut self, retries: u32) -> Self {
		self.retries = retries;

		self
	}

	/// Overrides the backoff base.
	pub fn with_backoff_base(mut self, base: Duration) -> Self {
		self.backoff_base = base;

		self
	}

	/// Overrides the backoff ceiling.
	pub fn with_max_backoff(mut self, max: Duration) -> Self {
		self.max_backoff = max;

		self
	}

	/// Delay slept after failed attempt number `attempt` (zero-based): `base * 2^attempt`,
	/// capped at [`max_backoff`](Self::max_backoff).
	pub fn backoff(&self, attempt: u32) -> Duration {
		2_i32
			.checked_pow(attempt)
			.and_then(|factor| self.backoff_base.checked_mul(factor))
			.map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
			.max(Duration::ZERO)
	}
}
impl Default for ExecutorConfig {
	fn default() -> Self {
		Self {
			retries: 3,
			backoff_base: Duration::seconds(1),
			max_backoff: Duration::minutes(5),
		}
	}
}

/// Sends logical requests, retrying transport and validation failures with exponential backoff.
///
/// The executor holds no per-request state; clones share the transport and cancellation token.
#[derive(Clone)]
pub struct RequestExecutor {
	transport: Arc<dyn HttpTransport>,
	config: ExecutorConfig,
	cancel: CancellationToken,
}
impl RequestExecutor {
	/// Creates an executor over `transport`.
	pub fn new(transport: Arc<dyn HttpTransport>, config: ExecutorConfig) -> Self {
		Self { transport, config, cancel: CancellationToken::new() }
	}

	/// Uses `token` to abort in-flight sends and backoff sleeps.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancel = token;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &ExecutorConfig {
		&self.config
	}

	/// Cancellation token observed by this executor.
	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Sends `descriptor` until its validator accepts a response or the retry budget runs out.
	///
	/// Every attempt prepares a fresh request, so signers observe state changed by the previous
	/// attempt's validator. A validator returning `Err` aborts immediately.
	pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<Response> {
		let span = OpSpan::new(OpKind::Execute, "send");

		obs::record_op_outcome(OpKind::Execute, OpOutcome::Attempt);

		let result = span.instrument(self.run(descriptor, &span)).await;

		obs::record_op_outcome(OpKind::Execute, OpOutcome::of(&result));

		result
	}

	async fn run(&self, descriptor: &RequestDescriptor, span: &OpSpan) -> Result<Response> {
		let retries = self.config.retries;
		let mut failures = Vec::new();
		let mut last_url = descriptor.target_url();

		for attempt in 0..=retries {
			if self.cancel.is_cancelled() {
				return Err(Error::Cancelled);
			}
			if attempt > 0 {
				span.record_stage("retry");
			}

			let request = descriptor.prepare();
			let url = request.url.clone();

			last_url = url.clone();

			log_event!(info, attempt, "Retrieving {url}");

			let sent = tokio::select! {
				biased;
				_ = self.cancel.cancelled() => return Err(Error::Cancelled),
				sent = self.transport.send(request) => sent,
			};
			let failure = match sent {
				Ok(mut response) => {
					let verdict = match &descriptor.validator {
						Some(validator) => validator.validate(&mut response).await?,
						None => crate::request::Validation::accept(),
					};

					if verdict.ok {
						log_event!(info, status = response.status, "{url} succeeded");

						return Ok(response);
					}

					AttemptFailure::Validation {
						reason: verdict.reason.unwrap_or_else(|| "rejected by validator".into()),
					}
				},
				Err(e) => AttemptFailure::Transport { message: e.to_string() },
			};
			let last = attempt == retries;

			if last {
				log_event!(error, attempt, "Error retrieving {url}: {failure}");
			} else {
				log_event!(info, attempt, "Error retrieving {url}: {failure}, retrying");
			}

			failures.push(failure);

			if !last {
				let delay = self.config.backoff(attempt);

				log_event!(info, "Waiting {:.0} seconds", delay.as_seconds_f64());

				span.record_stage("backoff");

				tokio::select! {
					biased;
					_ = self.cancel.cancelled() => return Err(Error::Cancelled),
					_ = tokio::time::sleep(delay.unsigned_abs()) => {},
				}
			}
		}

		let attempts = retries + 1;
		let last_failure = failures.last().cloned().unwrap_or(AttemptFailure::Transport {
			message: "no attempt was made".into(),
		});

		log_event!(error, "{attempts} requests to {last_url} failed, giving up.");

		Err(Error::RetryExhausted { url: last_url, attempts, last_failure, failures })
	}
}
impl Debug for RequestExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("config", &self.config)
			.field("cancelled", &self.cancel.is_cancelled())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		error::TransportError,
		request::{Method, Validation, expect_json},
	};

	const URL: &str = "https://api.example.com/2/timeline.json";

	fn descriptor() -> RequestDescriptor {
		RequestDescriptor::parse(Method::Get, URL)
			.expect("Fixture URL should parse.")
			.validate_with(expect_json())
	}

	fn gaps(sent: &[SentRequest]) -> Vec<StdDuration> {
		sent.windows(2).map(|w| w[1].at - w[0].at).collect()
	}

	#[test]
	fn backoff_doubles_and_caps() {
		let config = ExecutorConfig::default().with_max_backoff(Duration::seconds(5));

		assert_eq!(config.backoff(0), Duration::seconds(1));
		assert_eq!(config.backoff(2), Duration::seconds(4));
		assert_eq!(config.backoff(3), Duration::seconds(5));
		assert_eq!(config.backoff(40), Duration::seconds(5));
	}

	#[tokio::test(start_paused = true)]
	async fn success_on_third_attempt_sleeps_exactly_twice() {
		let transport = ScriptedTransport::new([
			Ok(text_response(URL, 503, "busy")),
			Err(TransportError::Timeout),
			Ok(json_response(URL, 200, json!({"ok": true}))),
		]);
		let executor = scripted_executor(&transport, 3);
		let response = executor.execute(&descriptor()).await.expect("Third attempt should succeed.");

		assert_eq!(response.status, 200);
		assert_eq!(response.payload(), Some(&json!({"ok": true})));
		assert_eq!(
			gaps(&transport.sent()),
			[StdDuration::from_secs(1), StdDuration::from_secs(2)]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn exhaustion_after_retries_plus_one_attempts() {
		let transport = ScriptedTransport::new((0..4).map(|_| Ok(text_response(URL, 429, ""))));
		let executor = scripted_executor(&transport, 3);
		let started = tokio::time::Instant::now();
		let err = executor.execute(&descriptor()).await.expect_err("Every attempt should fail.");

		assert_eq!(transport.sent_count(), 4);
		assert_eq!(
			gaps(&transport.sent()),
			[StdDuration::from_secs(1), StdDuration::from_secs(2), StdDuration::from_secs(4)]
		);
		// No sleep after the final attempt.
		assert_eq!(tokio::time::Instant::now() - started, StdDuration::from_secs(7));

		match err {
			Error::RetryExhausted { url, attempts, last_failure, failures } => {
				assert_eq!(url.as_str(), URL);
				assert_eq!(attempts, 4);
				assert_eq!(failures.len(), 4);
				assert_eq!(
					last_failure,
					AttemptFailure::Validation { reason: "non-2xx status code (429)".into() }
				);
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn exhaustion_reports_the_url_with_its_query() {
		let transport = ScriptedTransport::new([Ok(text_response(URL, 503, ""))]);
		let executor = scripted_executor(&transport, 0);
		let paged = descriptor().query("cursor", "CURSOR-42");
		let err = executor.execute(&paged).await.expect_err("The only attempt should fail.");

		assert!(err.to_string().starts_with(&format!("1 requests to {URL}?cursor=CURSOR-42 failed")));
		assert!(matches!(
			err,
			Error::RetryExhausted { ref url, .. } if url.query() == Some("cursor=CURSOR-42")
		));
	}

	#[tokio::test(start_paused = true)]
	async fn missing_validator_accepts_any_response() {
		let transport = ScriptedTransport::new([Ok(text_response(URL, 500, "oops"))]);
		let executor = scripted_executor(&transport, 3);
		let plain = RequestDescriptor::parse(Method::Get, URL).expect("Fixture URL should parse.");
		let response = executor.execute(&plain).await.expect("Any response should be accepted.");

		assert_eq!(response.status, 500);
		assert_eq!(transport.sent_count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn validator_state_changes_reach_the_next_attempt() {
		let flips = Arc::new(Mutex::new(0_u32));
		let seen = flips.clone();
		let transport = ScriptedTransport::new([
			Ok(text_response(URL, 403, "")),
			Ok(text_response(URL, 200, "")),
		]);
		let executor = scripted_executor(&transport, 1);
		let descriptor = RequestDescriptor::parse(Method::Get, URL)
			.expect("Fixture URL should parse.")
			.validate_fn(move |response| {
				if response.status == 403 {
					*seen.lock() += 1;

					Validation::reject("blocked (403)")
				} else {
					Validation::accept()
				}
			});

		executor.execute(&descriptor).await.expect("Second attempt should succeed.");

		assert_eq!(*flips.lock(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn cancellation_interrupts_backoff() {
		let transport = ScriptedTransport::new([Ok(text_response(URL, 503, ""))]);
		let token = CancellationToken::new();
		let executor = scripted_executor(&transport, 5).with_cancellation(token.clone());
		let canceller = tokio::spawn(async move {
			tokio::time::sleep(StdDuration::from_millis(500)).await;
			token.cancel();
		});
		let err = executor.execute(&descriptor()).await.expect_err("Cancellation should abort.");

		canceller.await.expect("Canceller task should finish.");

		assert!(matches!(err, Error::Cancelled));
		assert_eq!(transport.sent_count(), 1);
	}
}
