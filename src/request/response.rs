//! Responses returned by transports and judged by validators.

// std
use std::borrow::Cow;
// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Response to one attempt, including a parsed-payload slot validators may fill.
#[derive(Clone, Debug)]
pub struct Response {
	/// HTTP status code.
	pub status: u16,
	/// Response headers in wire order; names are matched case-insensitively.
	pub headers: Vec<(String, String)>,
	/// Raw body bytes.
	pub body: Vec<u8>,
	/// URL of the final hop after redirects.
	pub final_url: Url,
	payload: Option<Value>,
}
impl Response {
	/// Creates a response with an empty payload slot.
	pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>, final_url: Url) -> Self {
		Self { status, headers, body, final_url, payload: None }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the first header value named `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.header_values(name).next()
	}

	/// Iterates every header value named `name` (case-insensitive).
	pub fn header_values<'a, 'n>(
		&'a self,
		name: &'n str,
	) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
		self.headers
			.iter()
			.filter(move |(k, _)| k.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.as_str())
	}

	/// Media type of the body without parameters, lowercased (e.g. `application/json`).
	pub fn content_type(&self) -> Option<String> {
		let raw = self.header("content-type")?;
		let media = raw.split(';').next().unwrap_or_default().trim();

		(!media.is_empty()).then(|| media.to_ascii_lowercase())
	}

	/// Returns the value of the cookie `name` set by this response, if any.
	pub fn cookie(&self, name: &str) -> Option<&str> {
		self.header_values("set-cookie").find_map(|raw| {
			let pair = raw.split(';').next()?;
			let (key, value) = pair.split_once('=')?;

			(key.trim() == name).then(|| value.trim())
		})
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Parses the body as JSON once and caches it in the payload slot.
	///
	/// Invalid JSON is a [`Error::MalformedResponse`]: retrying cannot repair it.
	pub fn json(&mut self) -> Result<&Value> {
		if self.payload.is_none() {
			let value = serde_json::from_slice::<Value>(&self.body).map_err(|e| {
				Error::MalformedResponse {
					url: self.final_url.clone(),
					reason: format!("invalid JSON: {e}"),
				}
			})?;

			self.payload = Some(value);
		}

		self.payload.as_ref().ok_or_else(|| Error::MalformedResponse {
			url: self.final_url.clone(),
			reason: "payload slot is empty".into(),
		})
	}

	/// Deserializes the body (or the cached payload) into `T`, reporting the failing JSON path.
	pub fn json_as<T>(&mut self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let url = self.final_url.clone();
		let value = self.json()?;

		serde_path_to_error::deserialize(value).map_err(|e| Error::MalformedResponse {
			url,
			reason: format!("unexpected structure at `{}`: {}", e.path(), e.inner()),
		})
	}

	/// Payload cached by a validator or a previous [`json`](Self::json) call.
	pub fn payload(&self) -> Option<&Value> {
		self.payload.as_ref()
	}

	/// Stores an already-parsed payload.
	pub fn set_payload(&mut self, payload: Value) {
		self.payload = Some(payload);
	}

	/// Relative delay from a `Retry-After` header (delta seconds or an RFC 2822 date).
	pub fn retry_after(&self) -> Option<Duration> {
		let raw = self.header("retry-after")?.trim();

		if let Ok(secs) = raw.parse::<u64>() {
			return Some(Duration::seconds(i64::try_from(secs).ok()?));
		}
		if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
			let delta = moment - OffsetDateTime::now_utc();

			if delta.is_positive() {
				return Some(delta);
			}
		}

		None
	}

	/// Absolute instant from an `x-rate-limit-reset` header (Unix seconds).
	pub fn rate_limit_reset(&self) -> Option<OffsetDateTime> {
		let secs = self.header("x-rate-limit-reset")?.trim().parse::<i64>().ok()?;

		OffsetDateTime::from_unix_timestamp(secs).ok()
	}

	/// Best-effort instant at which a throttled caller may try again.
	pub fn throttled_until(&self) -> Option<OffsetDateTime> {
		self.rate_limit_reset()
			.or_else(|| self.retry_after().map(|delay| OffsetDateTime::now_utc() + delay))
	}
}
