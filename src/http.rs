//! Transport seam between the executor and an HTTP stack.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP client. Implementations send one
//! [`OutgoingRequest`] and hand back the raw [`Response`]; they never retry, validate, or sign.
//! Those concerns live in the [`RequestExecutor`](crate::executor::RequestExecutor).

// self
use crate::{
	_prelude::*,
	error::TransportError,
	request::{OutgoingRequest, Response},
};
#[cfg(feature = "reqwest")]
use crate::{
	error::ConfigError,
	request::{Method, RedirectPolicy},
};

/// Future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Response, TransportError>> + 'a + Send>>;

/// Sends a single prepared request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back many executors and
/// paginators concurrently. Non-2xx statuses are ordinary responses, not errors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the full response body.
	fn send(&self, request: OutgoingRequest) -> TransportFuture<'_>;
}

/// [`HttpTransport`] backed by [`reqwest`], honoring per-request redirect policies.
///
/// reqwest fixes redirect handling per client, so two clients are kept: one that follows
/// redirects and one that does not.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	follow: ReqwestClient,
	manual: ReqwestClient,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with default reqwest clients.
	pub fn new() -> Result<Self, ConfigError> {
		let follow = ReqwestClient::builder().build()?;
		let manual =
			ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self { follow, manual })
	}

	/// Wraps caller-configured clients.
	///
	/// `manual` must be built with redirect following disabled.
	pub fn with_clients(follow: ReqwestClient, manual: ReqwestClient) -> Self {
		Self { follow, manual }
	}

	fn client(&self, policy: RedirectPolicy) -> &ReqwestClient {
		match policy {
			RedirectPolicy::Follow => &self.follow,
			RedirectPolicy::Manual => &self.manual,
		}
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: OutgoingRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let client = self.client(request.redirect);
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
			};
			let mut builder = client
				.request(method, request.url.clone())
				.timeout(request.timeout.unsigned_abs());

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let final_url = response.url().clone();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned()))
				})
				.collect();
			let body = response.bytes().await?.to_vec();

			Ok(Response::new(status, headers, body, final_url))
		})
	}
}
