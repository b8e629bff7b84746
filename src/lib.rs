//! Resilient paginated API-client core for scrapers: a retrying request executor, a credential
//! cache shared across cooperating processes, and a cursor-driven pagination engine that yields
//! items lazily.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

/// Emits a `tracing` event when the `tracing` feature is enabled; compiles to nothing otherwise.
macro_rules! log_event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		::tracing::$level!($($arg)+);
	};
}

pub mod credential;
pub mod error;
pub mod executor;
pub mod http;
pub mod obs;
pub mod paginate;
pub mod request;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		error::TransportError,
		executor::{ExecutorConfig, RequestExecutor},
		http::{HttpTransport, TransportFuture},
		request::{OutgoingRequest, Response},
	};

	/// Scripted reply handed out by [`ScriptedTransport`].
	pub type ScriptedReply = Result<Response, TransportError>;

	/// Request observed by [`ScriptedTransport`], stamped with the Tokio clock.
	#[derive(Clone, Debug)]
	pub struct SentRequest {
		/// The prepared request exactly as the executor sent it.
		pub request: OutgoingRequest,
		/// Tokio instant at which the request was sent (deterministic under a paused clock).
		pub at: tokio::time::Instant,
	}

	/// In-memory [`HttpTransport`] that replays a queue of replies and records every request.
	///
	/// Once the queue is drained every further request fails with a transport error, so tests
	/// notice unexpected traffic.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedTransport {
		replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
		sent: Arc<Mutex<Vec<SentRequest>>>,
	}
	impl ScriptedTransport {
		/// Builds a transport that replays `replies` in order.
		pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
			Self {
				replies: Arc::new(Mutex::new(replies.into_iter().collect())),
				sent: Default::default(),
			}
		}

		/// Appends another reply to the queue.
		pub fn push(&self, reply: ScriptedReply) {
			self.replies.lock().push_back(reply);
		}

		/// Returns every request observed so far.
		pub fn sent(&self) -> Vec<SentRequest> {
			self.sent.lock().clone()
		}

		/// Number of requests observed so far.
		pub fn sent_count(&self) -> usize {
			self.sent.lock().len()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn send(&self, request: OutgoingRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				self.sent
					.lock()
					.push(SentRequest { request, at: tokio::time::Instant::now() });

				self.replies.lock().pop_front().unwrap_or_else(|| {
					Err(TransportError::network(std::io::Error::other("Script exhausted.")))
				})
			})
		}
	}

	/// Builds a response for `url` with the given status and JSON body.
	pub fn json_response(url: &str, status: u16, body: serde_json::Value) -> Response {
		Response::new(
			status,
			vec![("content-type".into(), "application/json;charset=utf-8".into())],
			body.to_string().into_bytes(),
			Url::parse(url).expect("Test response URL should parse."),
		)
	}

	/// Builds a plain-text response for `url`.
	pub fn text_response(url: &str, status: u16, body: &str) -> Response {
		Response::new(
			status,
			vec![("content-type".into(), "text/plain".into())],
			body.as_bytes().to_vec(),
			Url::parse(url).expect("Test response URL should parse."),
		)
	}

	/// Executor over `transport` with `retries` retries and a one second backoff base.
	pub fn scripted_executor(transport: &ScriptedTransport, retries: u32) -> RequestExecutor {
		RequestExecutor::new(
			Arc::new(transport.clone()),
			ExecutorConfig::default().with_retries(retries),
		)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
