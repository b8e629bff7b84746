//! Response validators deciding whether an attempt succeeded.

// std
use std::future;
// self
use crate::{_prelude::*, request::Response};

/// Future returned by [`ResponseValidator::validate`].
pub type ValidateFuture<'a> = Pin<Box<dyn Future<Output = Result<Validation>> + 'a + Send>>;

/// Verdict on a single response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validation {
	/// Whether the response counts as a success.
	pub ok: bool,
	/// Rejection reason, surfaced in logs and retry-exhaustion errors.
	pub reason: Option<String>,
}
impl Validation {
	/// Accepts the response.
	pub fn accept() -> Self {
		Self { ok: true, reason: None }
	}

	/// Rejects the response; the executor will retry while budget remains.
	pub fn reject(reason: impl Into<String>) -> Self {
		Self { ok: false, reason: Some(reason.into()) }
	}
}

/// Caller-supplied judgement of a response.
///
/// Validators may have side effects, such as invalidating a credential on a throttling status,
/// and may cache a parsed body via [`Response::set_payload`]. Returning `Err` aborts the logical
/// request immediately without further retries.
pub trait ResponseValidator
where
	Self: Send + Sync,
{
	/// Judges `response`.
	fn validate<'a>(&'a self, response: &'a mut Response) -> ValidateFuture<'a>;
}

/// Adapter turning a synchronous closure into a [`ResponseValidator`].
pub struct FnValidator<F>(F);
impl<F> FnValidator<F>
where
	F: Fn(&mut Response) -> Validation + Send + Sync,
{
	/// Wraps `f`.
	pub fn new(f: F) -> Self {
		Self(f)
	}
}
impl<F> ResponseValidator for FnValidator<F>
where
	F: Fn(&mut Response) -> Validation + Send + Sync,
{
	fn validate<'a>(&'a self, response: &'a mut Response) -> ValidateFuture<'a> {
		let verdict = (self.0)(response);

		Box::pin(future::ready(Ok(verdict)))
	}
}

/// Accepts any 2xx status.
pub fn expect_success() -> Arc<dyn ResponseValidator> {
	Arc::new(FnValidator::new(|response: &mut Response| {
		if response.is_success() {
			Validation::accept()
		} else {
			Validation::reject(format!("non-2xx status code ({})", response.status))
		}
	}))
}

/// Accepts 2xx responses whose body is JSON, caching the parsed payload on the response.
///
/// A JSON content type with an unparseable body is rejected so the attempt is retried.
pub fn expect_json() -> Arc<dyn ResponseValidator> {
	Arc::new(FnValidator::new(check_json))
}

fn check_json(response: &mut Response) -> Validation {
	if !response.is_success() {
		return Validation::reject(format!("non-2xx status code ({})", response.status));
	}
	if response.content_type().as_deref() != Some("application/json") {
		return Validation::reject("content type is not JSON");
	}

	match response.json() {
		Ok(_) => Validation::accept(),
		Err(_) => Validation::reject("body is not valid JSON"),
	}
}
