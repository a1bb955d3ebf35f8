#![allow(missing_docs)]

//! Who is logged in, as last reported by the registry.

mod store;

pub use store::{IdentitySource, SessionState, SessionStore};
