//! Cursor-driven pagination over the retrying executor.
//!
//! A [`Paginator`] walks a server-defined cursor stream one page at a time: it fetches a page only
//! when the consumer asks for more, hands the response to a caller-supplied [`PageExtractor`], and
//! decides from the extracted cursors whether to continue, switch direction, or stop. Payload
//! shape is entirely the extractor's business.
//!
//! Traversal ends on its own; [`Paginator::termination`] (or a [`TerminationHandle`] when items are
//! consumed as a stream) then tells normal completion apart from a
//! detected pagination cycle. Failures (exhausted retries, unavailable credentials, malformed
//! pages) are returned once and end the traversal.

mod cursor;
mod engine;
mod fingerprint;
mod page;

pub use cursor::*;
pub use engine::*;
pub use fingerprint::*;
pub use page::*;

// self
use crate::_prelude::*;

/// Traversal mode requested by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
	/// Follow the forward ("top") cursor only.
	#[default]
	Forward,
	/// Follow the backward ("bottom") cursor only.
	Backward,
	/// Walk forward to exhaustion, then resume once from the first backward cursor seen.
	Both,
}
impl Direction {
	/// Direction scrolled first.
	pub const fn initial_scroll(self) -> ScrollDirection {
		match self {
			Direction::Forward | Direction::Both => ScrollDirection::Forward,
			Direction::Backward => ScrollDirection::Backward,
		}
	}
}

/// Direction of the page currently being requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
	/// Towards newer entries.
	Forward,
	/// Towards older entries.
	Backward,
}
impl ScrollDirection {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			ScrollDirection::Forward => "forward",
			ScrollDirection::Backward => "backward",
		}
	}
}
impl Display for ScrollDirection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
