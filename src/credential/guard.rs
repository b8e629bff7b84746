//! Glue between the credential cache and the request pipeline.

// self
use crate::{
	_prelude::*,
	credential::CredentialCache,
	request::{OutgoingRequest, RequestSigner, Response, ResponseValidator, ValidateFuture, Validation},
};

/// Stamps the currently held credential onto every prepared attempt.
#[derive(Clone, Debug)]
pub struct CredentialSigner {
	cache: Arc<CredentialCache>,
	header: String,
	cookie: Option<String>,
}
impl CredentialSigner {
	/// Writes the credential into `header`.
	pub fn new(cache: Arc<CredentialCache>, header: impl Into<String>) -> Self {
		Self { cache, header: header.into(), cookie: None }
	}

	/// Also sends the credential as the cookie `name`.
	pub fn with_cookie(mut self, name: impl Into<String>) -> Self {
		self.cookie = Some(name.into());

		self
	}
}
impl RequestSigner for CredentialSigner {
	fn sign(&self, request: &mut OutgoingRequest) {
		let Some(credential) = self.cache.current() else {
			request.remove_header(&self.header);

			return;
		};
		let token = credential.token.expose();

		request.set_header(self.header.as_str(), token);

		if let Some(name) = &self.cookie {
			let pair = format!("{name}={token}");
			let cookie = match request.header("cookie") {
				Some(existing) if !existing.is_empty() => format!("{existing}; {pair}"),
				_ => pair,
			};

			request.set_header("cookie", cookie);
		}
	}
}

/// Validator that turns throttling statuses into credential rotation.
///
/// On a throttle status the held credential is invalidated (until the response's rate-limit
/// reset, else its `Retry-After`, else the cache's default block), a fresh one is acquired, and
/// the response is rejected as `blocked (<status>)` so the executor retries with the new
/// credential. Every other response is judged by the wrapped validator, if any.
#[derive(Clone)]
pub struct ThrottleGuard {
	cache: Arc<CredentialCache>,
	inner: Option<Arc<dyn ResponseValidator>>,
	statuses: Vec<u16>,
}
impl ThrottleGuard {
	/// Statuses treated as throttling by default.
	pub const DEFAULT_STATUSES: [u16; 2] = [403, 429];

	/// Creates a guard with no inner validator.
	pub fn new(cache: Arc<CredentialCache>) -> Self {
		Self { cache, inner: None, statuses: Self::DEFAULT_STATUSES.to_vec() }
	}

	/// Delegates non-throttled responses to `validator`.
	pub fn wrap(mut self, validator: Arc<dyn ResponseValidator>) -> Self {
		self.inner = Some(validator);

		self
	}

	/// Overrides the throttling statuses.
	pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
		self.statuses = statuses.into_iter().collect();

		self
	}
}
impl ResponseValidator for ThrottleGuard {
	fn validate<'a>(&'a self, response: &'a mut Response) -> ValidateFuture<'a> {
		Box::pin(async move {
			if self.statuses.contains(&response.status) {
				log_event!(info, status = response.status, url = %response.final_url, "Credential throttled");

				self.cache.invalidate(response.throttled_until()).await?;
				self.cache.acquire().await?;

				return Ok(Validation::reject(format!("blocked ({})", response.status)));
			}

			match &self.inner {
				Some(inner) => inner.validate(response).await,
				None => Ok(Validation::accept()),
			}
		})
	}
}
impl Debug for ThrottleGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ThrottleGuard")
			.field("cache", &self.cache)
			.field("statuses", &self.statuses)
			.field("inner_set", &self.inner.is_some())
			.finish()
	}
}
