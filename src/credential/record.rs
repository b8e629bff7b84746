//! Credential values and their lifecycle.

// self
use crate::{_prelude::*, credential::TokenSecret, store::TokenEntry};

/// Lifecycle status of a [`Credential`] at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Usable.
	Active,
	/// The service signalled throttling; unusable until the block deadline passes.
	Blocked,
	/// The validity window has elapsed.
	Expired,
}

/// Opaque access token plus the metadata needed to judge whether it may be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
	/// Token value.
	pub token: TokenSecret,
	/// Instant the token was originated.
	pub issued_at: OffsetDateTime,
	/// Validity window fixed per service.
	pub validity: Duration,
	/// Instant before which the token must not be used.
	pub blocked_until: Option<OffsetDateTime>,
}
impl Credential {
	/// Builds a credential from a stored entry.
	pub fn from_entry(token: impl Into<String>, entry: &TokenEntry, validity: Duration) -> Self {
		Self {
			token: TokenSecret::new(token),
			issued_at: entry.issued_at,
			validity,
			blocked_until: entry.blocked_until,
		}
	}

	/// Instant at which the validity window closes.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at + self.validity
	}

	/// Store entry describing this credential.
	pub fn entry(&self) -> TokenEntry {
		TokenEntry { issued_at: self.issued_at, blocked_until: self.blocked_until }
	}

	/// Computes the lifecycle status at `instant`; expiry wins over a block.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		if instant >= self.expires_at() {
			return CredentialStatus::Expired;
		}
		if self.blocked_until.is_some_and(|until| until > instant) {
			return CredentialStatus::Blocked;
		}

		CredentialStatus::Active
	}

	/// Returns `true` when the credential is [`CredentialStatus::Active`] at `instant`.
	pub fn is_usable_at(&self, instant: OffsetDateTime) -> bool {
		self.status_at(instant) == CredentialStatus::Active
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn status_tracks_expiry_and_blocks() {
		let issued = datetime!(2025-06-01 00:00 UTC);
		let mut credential = Credential::from_entry(
			"abc",
			&TokenEntry::issued(issued),
			Duration::hours(3),
		);

		assert_eq!(credential.status_at(issued + Duration::hours(1)), CredentialStatus::Active);
		assert_eq!(credential.status_at(issued + Duration::hours(3)), CredentialStatus::Expired);

		credential.blocked_until = Some(issued + Duration::hours(2));

		assert_eq!(credential.status_at(issued + Duration::hours(1)), CredentialStatus::Blocked);
		assert!(credential.is_usable_at(issued + Duration::minutes(150)));
		assert_eq!(credential.entry().blocked_until, Some(issued + Duration::hours(2)));
	}
}
