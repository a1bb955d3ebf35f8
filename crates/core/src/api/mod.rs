//! HTTP access to the registry.

/// Typed registry client.
pub mod client;
/// Response envelope classification.
pub mod envelope;

pub use client::RegistryClient;
pub use envelope::Body;
