//! Cursor bookkeeping and the transition rules applied after every page.

// self
use crate::{
	_prelude::*,
	paginate::{Direction, Page, ScrollDirection},
	request::RequestDescriptor,
};

type CursorApplier = Arc<dyn Fn(&RequestDescriptor, &str) -> RequestDescriptor + Send + Sync>;

/// Request used for every page after the first, with a slot for the cursor.
#[derive(Clone)]
pub struct CursorTemplate {
	descriptor: RequestDescriptor,
	apply: CursorApplier,
}
impl CursorTemplate {
	/// Places the cursor in the query parameter `param`, keeping its position when the template
	/// already lists it.
	pub fn query(descriptor: RequestDescriptor, param: impl Into<String>) -> Self {
		let param = param.into();

		Self::with_fn(descriptor, move |base, cursor| base.clone().set_query(&param, cursor))
	}

	/// Places the cursor with a custom function (for example inside a JSON-encoded parameter).
	pub fn with_fn<F>(descriptor: RequestDescriptor, apply: F) -> Self
	where
		F: 'static + Fn(&RequestDescriptor, &str) -> RequestDescriptor + Send + Sync,
	{
		Self { descriptor, apply: Arc::new(apply) }
	}

	/// Template descriptor without a cursor.
	pub fn descriptor(&self) -> &RequestDescriptor {
		&self.descriptor
	}

	/// Descriptor requesting the page at `cursor`.
	pub fn with_cursor(&self, cursor: &str) -> RequestDescriptor {
		(self.apply)(&self.descriptor, cursor)
	}
}
impl Debug for CursorTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CursorTemplate").field("descriptor", &self.descriptor).finish_non_exhaustive()
	}
}

/// Opposite-direction cursor deferred until the current direction is exhausted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OppositeCursor {
	/// Cursor value.
	pub cursor: String,
	/// Stop-on-empty flag that applies once the traversal switches to this cursor.
	pub stop_on_empty: bool,
}

/// Decision taken after a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
	/// Request `cursor` next.
	Continue {
		/// Next cursor.
		cursor: String,
	},
	/// The active direction flipped; request the deferred `cursor` next.
	SwitchDirection {
		/// Deferred opposite-direction cursor.
		cursor: String,
	},
	/// Traversal is over.
	Stop,
}

/// Mutable traversal state of one paginator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorState {
	/// Cursor of the next request; `None` means the initial, non-paginated request.
	pub cursor: Option<String>,
	/// Direction currently scrolled.
	pub direction: ScrollDirection,
	/// Traversal mode requested by the caller.
	pub mode: Direction,
	/// Opposite-direction cursor captured in [`Direction::Both`] mode.
	pub deferred: Option<OppositeCursor>,
	/// Whether the deferred cursor has been switched to.
	pub deferred_consumed: bool,
	/// Sticky stop-on-empty hint; changes only when a page states it.
	pub stop_on_empty: bool,
	/// Consecutive empty pages that echoed the requested cursor.
	pub stalls: u32,
	/// Empty pages seen over the whole traversal.
	pub empty_pages: u32,
	/// Pages requested so far.
	pub requests: u32,
}
impl CursorState {
	/// Fresh state for `mode`, starting at `cursor`.
	pub fn new(mode: Direction, cursor: Option<String>) -> Self {
		Self {
			cursor,
			direction: mode.initial_scroll(),
			mode,
			deferred: None,
			deferred_consumed: false,
			stop_on_empty: false,
			stalls: 0,
			empty_pages: 0,
			requests: 0,
		}
	}

	/// Whether the next extractor call should report an opposite-direction cursor.
	pub fn wants_opposite(&self) -> bool {
		self.mode == Direction::Both && self.deferred.is_none() && !self.deferred_consumed
	}

	/// Applies the transition rules to the page fetched with [`cursor`](Self::cursor).
	///
	/// 1. An empty page echoing the requested cursor counts as a stall and is retried with the
	///    same cursor until the stall budget is exceeded.
	/// 2. A primary cursor is followed unless the page is empty and stop-on-empty is set.
	/// 3. Otherwise the alternate cursor is followed, then the deferred opposite cursor (once),
	///    and failing both the traversal stops.
	pub fn advance<T>(&mut self, page: &Page<T>, stall_retries: u32) -> Transition {
		let count = page.items.len();

		if let Some(stop) = page.stop_on_empty {
			self.stop_on_empty = stop;
		}
		if self.wants_opposite() {
			self.deferred = page.opposite.clone();
		}
		if count == 0 {
			self.empty_pages += 1;
		}

		let requested = self.cursor.take();
		let mut stalled_out = false;

		if let Some(next) = &page.primary {
			if count == 0 && requested.as_ref() == Some(next) {
				self.stalls += 1;

				if self.stalls <= stall_retries {
					log_event!(debug, cursor = %next, stalls = self.stalls, "Empty page echoed the cursor, retrying");

					return self.continue_with(next.clone(), false);
				}

				stalled_out = true;
			} else if count > 0 || !self.stop_on_empty {
				return self.continue_with(next.clone(), true);
			}
		}
		if stalled_out {
			log_event!(info, stalls = self.stalls, "Cursor stalled too often, giving up on it");
		}
		if let Some(alternate) = page.alternate.as_ref().filter(|alt| requested.as_ref() != Some(*alt)) {
			return self.continue_with(alternate.clone(), true);
		}
		if !self.deferred_consumed
			&& let Some(deferred) = self.deferred.take()
		{
			self.deferred_consumed = true;
			self.direction = match self.direction {
				ScrollDirection::Forward => ScrollDirection::Backward,
				ScrollDirection::Backward => ScrollDirection::Forward,
			};
			self.stop_on_empty = deferred.stop_on_empty;
			self.stalls = 0;
			self.cursor = Some(deferred.cursor.clone());

			log_event!(info, direction = %self.direction, "Switching scroll direction");

			return Transition::SwitchDirection { cursor: deferred.cursor };
		}

		Transition::Stop
	}

	fn continue_with(&mut self, cursor: String, reset_stalls: bool) -> Transition {
		if reset_stalls {
			self.stalls = 0;
		}

		self.cursor = Some(cursor.clone());

		Transition::Continue { cursor }
	}
}
