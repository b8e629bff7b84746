//! Crate-level error types shared by the executor, credential cache, and paginator.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced to callers once local recovery is exhausted.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Every attempt for one logical request failed.
	#[error("{attempts} requests to {url} failed, giving up; last failure: {last_failure}.")]
	RetryExhausted {
		/// Target URL of the logical request (without per-attempt query string).
		url: Url,
		/// Number of attempts performed.
		attempts: u32,
		/// Cause of the final failed attempt.
		last_failure: AttemptFailure,
		/// Causes of every failed attempt, oldest first.
		failures: Vec<AttemptFailure>,
	},
	/// No usable credential could be selected or originated.
	#[error("No usable credential could be obtained: {reason}.")]
	CredentialUnavailable {
		/// Human-readable cause.
		reason: String,
	},
	/// A response lacked the structure the caller's extractor requires; never retried.
	#[error("Response from {url} is malformed: {reason}.")]
	MalformedResponse {
		/// Final URL of the offending response.
		url: Url,
		/// Extractor- or parser-supplied cause.
		reason: String,
	},
	/// The caller cancelled the operation.
	#[error("Operation was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns `true` when the error came from exhausting the retry budget.
	pub fn is_retry_exhausted(&self) -> bool {
		matches!(self, Self::RetryExhausted { .. })
	}
}

/// Cause of a single failed attempt, recovered locally by retrying.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AttemptFailure {
	/// The request never produced a response (connection error, timeout).
	#[error("transport failure: {message}")]
	Transport {
		/// Rendered transport error.
		message: String,
	},
	/// A response arrived but the caller's validator rejected it.
	#[error("validation failure: {reason}")]
	Validation {
		/// Reason reported by the validator.
		reason: String,
	},
}

/// Configuration and validation failures raised while building clients or requests.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A URL could not be parsed.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A JSON body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialization(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, timeout) reported by an
/// [`HttpTransport`](crate::http::HttpTransport).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error: {source}.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The per-request timeout elapsed.
	#[error("Request timed out.")]
	Timeout,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn store_error_converts_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk full"));

		let source = StdError::source(&error)
			.expect("Storage error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn retry_exhausted_names_url_attempts_and_cause() {
		let last = AttemptFailure::Validation { reason: "blocked (429)".into() };
		let error = Error::RetryExhausted {
			url: Url::parse("https://api.example.com/timeline").expect("Fixture URL should parse."),
			attempts: 4,
			last_failure: last.clone(),
			failures: vec![last],
		};
		let rendered = error.to_string();

		assert!(error.is_retry_exhausted());
		assert!(rendered.starts_with("4 requests to https://api.example.com/timeline failed"));
		assert!(rendered.contains("blocked (429)"));
	}
}
