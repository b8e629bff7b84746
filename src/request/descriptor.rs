//! Immutable request descriptors and the per-attempt requests prepared from them.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	request::{FnValidator, ResponseValidator, Validation},
};

/// HTTP methods used by scrapers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Whether the transport follows HTTP redirects for a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectPolicy {
	#[default]
	/// Follow redirects; [`Response::final_url`](crate::request::Response) reports the last hop.
	Follow,
	/// Return the redirect response itself.
	Manual,
}

/// Hook that stamps per-attempt state (credentials, rotating headers) onto a prepared request.
///
/// Signers run inside [`RequestDescriptor::prepare`], i.e. once per attempt, so state changed by
/// a validator between attempts is picked up by the next one.
pub trait RequestSigner
where
	Self: Send + Sync,
{
	/// Mutates the freshly prepared request in place.
	fn sign(&self, request: &mut OutgoingRequest);
}

/// Immutable description of one logical request.
#[derive(Clone)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Target URL without the descriptor's query parameters.
	pub url: Url,
	/// Query parameters, appended in order.
	pub query: Vec<(String, String)>,
	/// Static request headers.
	pub headers: Vec<(String, String)>,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	/// Per-attempt network timeout.
	pub timeout: Duration,
	/// Redirect handling for this request.
	pub redirect: RedirectPolicy,
	/// Validator deciding whether a response counts as a success.
	pub validator: Option<Arc<dyn ResponseValidator>>,
	/// Signer applied to every prepared attempt.
	pub signer: Option<Arc<dyn RequestSigner>>,
}
impl RequestDescriptor {
	/// Default per-attempt timeout.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(10);

	/// Creates a descriptor for `method` + `url` with default settings.
	pub fn new(method: Method, url: Url) -> Self {
		Self {
			method,
			url,
			query: Vec::new(),
			headers: Vec::new(),
			body: None,
			timeout: Self::DEFAULT_TIMEOUT,
			redirect: RedirectPolicy::default(),
			validator: None,
			signer: None,
		}
	}

	/// Creates a `GET` descriptor.
	pub fn get(url: Url) -> Self {
		Self::new(Method::Get, url)
	}

	/// Creates a `POST` descriptor.
	pub fn post(url: Url) -> Self {
		Self::new(Method::Post, url)
	}

	/// Parses `url` and creates a descriptor for it.
	pub fn parse(method: Method, url: &str) -> Result<Self, ConfigError> {
		let parsed = Url::parse(url)
			.map_err(|source| ConfigError::InvalidUrl { value: url.to_owned(), source })?;

		Ok(Self::new(method, parsed))
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a query parameter, overwriting the first existing value in place so parameter order
	/// is preserved; appends it when absent.
	pub fn set_query(mut self, key: &str, value: impl Into<String>) -> Self {
		let value = value.into();

		match self.query.iter_mut().find(|(k, _)| k == key) {
			Some(slot) => slot.1 = value,
			None => self.query.push((key.to_owned(), value)),
		}

		self
	}

	/// Removes every query parameter named `key`.
	pub fn remove_query(mut self, key: &str) -> Self {
		self.query.retain(|(k, _)| k != key);

		self
	}

	/// Sets a header, replacing any existing header with the same (case-insensitive) name.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		set_header(&mut self.headers, name.into(), value.into());

		self
	}

	/// Sets a raw request body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Sets an `application/x-www-form-urlencoded` body.
	pub fn form<I, K, V>(self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let encoded = form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish();

		self.header("content-type", "application/x-www-form-urlencoded").body(encoded)
	}

	/// Sets a JSON body.
	pub fn json<T>(self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let encoded = serde_json::to_vec(value)?;

		Ok(self.header("content-type", "application/json").body(encoded))
	}

	/// Overrides the per-attempt timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = if timeout.is_positive() { timeout } else { Self::DEFAULT_TIMEOUT };

		self
	}

	/// Overrides the redirect policy.
	pub fn redirect(mut self, policy: RedirectPolicy) -> Self {
		self.redirect = policy;

		self
	}

	/// Attaches a response validator.
	pub fn validate_with(mut self, validator: Arc<dyn ResponseValidator>) -> Self {
		self.validator = Some(validator);

		self
	}

	/// Attaches a synchronous validator closure.
	pub fn validate_fn<F>(self, validator: F) -> Self
	where
		F: 'static + Fn(&mut crate::request::Response) -> Validation + Send + Sync,
	{
		self.validate_with(Arc::new(FnValidator::new(validator)))
	}

	/// Attaches a per-attempt signer.
	pub fn sign_with(mut self, signer: Arc<dyn RequestSigner>) -> Self {
		self.signer = Some(signer);

		self
	}

	/// Full target URL including query parameters.
	pub fn target_url(&self) -> Url {
		let mut url = self.url.clone();

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		url
	}

	/// Builds a fresh outgoing request; called once per attempt.
	pub fn prepare(&self) -> OutgoingRequest {
		let mut request = OutgoingRequest {
			method: self.method,
			url: self.target_url(),
			headers: self.headers.clone(),
			body: self.body.clone(),
			timeout: self.timeout,
			redirect: self.redirect,
		};

		if let Some(signer) = &self.signer {
			signer.sign(&mut request);
		}

		request
	}
}
impl Debug for RequestDescriptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDescriptor")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("query", &self.query)
			.field("headers", &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>())
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.field("timeout", &self.timeout)
			.field("redirect", &self.redirect)
			.field("validator_set", &self.validator.is_some())
			.field("signer_set", &self.signer.is_some())
			.finish()
	}
}

/// Concrete request handed to an [`HttpTransport`](crate::http::HttpTransport) for one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingRequest {
	/// HTTP method.
	pub method: Method,
	/// Fully-formed URL including query string.
	pub url: Url,
	/// Headers to send.
	pub headers: Vec<(String, String)>,
	/// Optional body.
	pub body: Option<Vec<u8>>,
	/// Network timeout for this attempt.
	pub timeout: Duration,
	/// Redirect handling.
	pub redirect: RedirectPolicy,
}
impl OutgoingRequest {
	/// Returns the first header value named `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	/// Sets a header, replacing any existing header with the same name.
	pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
		set_header(&mut self.headers, name.into(), value.into());
	}

	/// Removes every header named `name`.
	pub fn remove_header(&mut self, name: &str) {
		self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
	}
}

fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
	headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
	headers.push((name, value));
}
