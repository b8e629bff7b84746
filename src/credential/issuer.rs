//! Origination of new credentials from a service's issuance endpoints.

// self
use crate::{
	_prelude::*,
	executor::RequestExecutor,
	request::{RequestDescriptor, Response},
};

/// Future returned by [`CredentialIssuer::issue`], resolving to the raw token string.
pub type IssueFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a + Send>>;

/// Obtains a brand-new token from the service.
pub trait CredentialIssuer
where
	Self: Send + Sync,
{
	/// Originates a token, sending whatever requests the service requires through `executor`.
	fn issue<'a>(&'a self, executor: &'a RequestExecutor) -> IssueFuture<'a>;
}

type TokenExtractor = Arc<dyn Fn(&mut Response) -> Option<String> + Send + Sync>;

/// One issuance request plus the rule that pulls a token out of its response.
#[derive(Clone)]
pub struct IssueStep {
	/// Request to send.
	pub descriptor: RequestDescriptor,
	extract: TokenExtractor,
}
impl IssueStep {
	/// Builds a step with a custom extractor.
	pub fn new<F>(descriptor: RequestDescriptor, extract: F) -> Self
	where
		F: 'static + Fn(&mut Response) -> Option<String> + Send + Sync,
	{
		Self { descriptor, extract: Arc::new(extract) }
	}

	/// Reads the token from the cookie `name` set by the response.
	pub fn cookie(descriptor: RequestDescriptor, name: impl Into<String>) -> Self {
		let name = name.into();

		Self::new(descriptor, move |response| {
			response.cookie(&name).filter(|v| !v.is_empty()).map(str::to_owned)
		})
	}

	/// Reads the token from a top-level JSON field (string or integer).
	pub fn json_field(descriptor: RequestDescriptor, field: impl Into<String>) -> Self {
		let field = field.into();

		Self::new(descriptor, move |response| {
			let value = response.json().ok()?.get(&field)?;

			value
				.as_str()
				.filter(|v| !v.is_empty())
				.map(str::to_owned)
				.or_else(|| value.as_u64().map(|n| n.to_string()))
		})
	}
}
impl Debug for IssueStep {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssueStep").field("descriptor", &self.descriptor).finish_non_exhaustive()
	}
}

/// Issuer that runs an ordered list of [`IssueStep`]s; the first step yielding a token wins.
///
/// A typical guest-token service needs two: load the landing page and read a cookie, then fall
/// back to an activation call that returns the token as JSON.
#[derive(Clone, Debug, Default)]
pub struct EndpointIssuer {
	steps: Vec<IssueStep>,
}
impl EndpointIssuer {
	/// Creates an issuer with no steps.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a step.
	pub fn step(mut self, step: IssueStep) -> Self {
		self.steps.push(step);

		self
	}
}
impl CredentialIssuer for EndpointIssuer {
	fn issue<'a>(&'a self, executor: &'a RequestExecutor) -> IssueFuture<'a> {
		Box::pin(async move {
			for (index, step) in self.steps.iter().enumerate() {
				let mut response = executor.execute(&step.descriptor).await?;

				if let Some(token) = (step.extract)(&mut response) {
					log_event!(debug, step = index, "Credential issued");

					return Ok(token);
				}

				log_event!(debug, step = index, url = %response.final_url, "Issuance step yielded no token");
			}

			Err(Error::CredentialUnavailable {
				reason: "no issuance step yielded a token".into(),
			})
		})
	}
}
