//! Pages and the extractor contract.

// self
use crate::{
	_prelude::*,
	paginate::{OppositeCursor, ScrollDirection},
	request::Response,
};

/// Items and candidate continuations pulled from one response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
	/// Items in server order.
	pub items: Vec<T>,
	/// Continuation for the direction being scrolled.
	pub primary: Option<String>,
	/// Fallback continuation offered when the server filtered part of the results.
	pub alternate: Option<String>,
	/// Cursor for the opposite direction; only consulted in [`Direction::Both`] mode.
	///
	/// [`Direction::Both`]: crate::paginate::Direction::Both
	pub opposite: Option<OppositeCursor>,
	/// Server hint that an empty page ends this direction; `None` keeps the previous value.
	pub stop_on_empty: Option<bool>,
}
impl<T> Page<T> {
	/// Page holding `items` and no cursors.
	pub fn new(items: Vec<T>) -> Self {
		Self { items, primary: None, alternate: None, opposite: None, stop_on_empty: None }
	}

	/// Sets the primary continuation.
	pub fn with_primary(mut self, cursor: impl Into<String>) -> Self {
		self.primary = Some(cursor.into());

		self
	}

	/// Sets the alternate ("prompt") continuation.
	pub fn with_alternate(mut self, cursor: impl Into<String>) -> Self {
		self.alternate = Some(cursor.into());

		self
	}

	/// Sets the opposite-direction cursor and its stop-on-empty flag.
	pub fn with_opposite(mut self, cursor: impl Into<String>, stop_on_empty: bool) -> Self {
		self.opposite = Some(OppositeCursor { cursor: cursor.into(), stop_on_empty });

		self
	}

	/// Sets the stop-on-empty hint.
	pub fn with_stop_on_empty(mut self, stop: bool) -> Self {
		self.stop_on_empty = Some(stop);

		self
	}
}

/// What the engine tells the extractor about the page being parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageContext {
	/// Direction being scrolled; the extractor reports this direction's cursor as primary.
	pub direction: ScrollDirection,
	/// Whether an opposite-direction cursor is still wanted.
	pub capture_opposite: bool,
	/// Number of pages fetched before this one.
	pub page_index: u32,
}

/// Extractor failure; surfaced as [`Error::MalformedResponse`] and never retried.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{reason}")]
pub struct ExtractError {
	/// What was missing or unexpected.
	pub reason: String,
}
impl ExtractError {
	/// Builds an error with a free-form reason.
	pub fn new(reason: impl Into<String>) -> Self {
		Self { reason: reason.into() }
	}

	/// A required key was absent.
	pub fn missing(key: &str) -> Self {
		Self::new(format!("missing `{key}`"))
	}
}
impl From<Error> for ExtractError {
	fn from(e: Error) -> Self {
		match e {
			Error::MalformedResponse { reason, .. } => Self { reason },
			other => Self::new(other.to_string()),
		}
	}
}

/// Turns a response into a [`Page`].
pub trait PageExtractor<T>
where
	Self: Send + Sync,
{
	/// Extracts items and cursors from `response`.
	fn extract(&self, response: &mut Response, ctx: &PageContext) -> Result<Page<T>, ExtractError>;
}
impl<T, F> PageExtractor<T> for F
where
	F: Fn(&mut Response, &PageContext) -> Result<Page<T>, ExtractError> + Send + Sync,
{
	fn extract(&self, response: &mut Response, ctx: &PageContext) -> Result<Page<T>, ExtractError> {
		self(response, ctx)
	}
}
