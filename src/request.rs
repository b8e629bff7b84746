//! Request descriptors, responses, and the caller-supplied validation and signing hooks.
//!
//! A [`RequestDescriptor`] is the immutable description of one logical request. The executor
//! calls [`RequestDescriptor::prepare`] before every attempt, so a [`RequestSigner`] sees the
//! latest shared state (for example a rotated credential) each time. Responses are judged by a
//! [`ResponseValidator`], which may populate the response's parsed-payload slot to avoid parsing
//! the body twice.

pub mod descriptor;
pub mod response;
pub mod validate;

pub use descriptor::*;
pub use response::*;
pub use validate::*;
