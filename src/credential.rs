//! Short-lived access credentials shared across cooperating processes.
//!
//! [`CredentialCache`] hands out a usable [`Credential`], reusing the one it already holds,
//! otherwise selecting one at random from the shared [`CredentialStore`](crate::store), and as a
//! last resort originating a new one through a [`CredentialIssuer`]. Throttling is wired in from
//! the outside: a [`ThrottleGuard`] validator invalidates the held credential and acquires a fresh
//! one, and a [`CredentialSigner`] stamps whatever is current onto the next attempt.

mod cache;
mod guard;
mod issuer;
mod metrics;
mod record;
mod secret;

pub use cache::*;
pub use guard::*;
pub use issuer::*;
pub use metrics::*;
pub use record::*;
pub use secret::*;
