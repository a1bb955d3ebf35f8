#![warn(clippy::all, missing_docs)]

//! Core of the elba registry browser.
//!
//! This crate hosts the registry records, the `RemoteData` loading-state
//! machine, the session store, the HTTP client and the page state used
//! by the terminal UI and any future frontends.

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod routes;
pub mod session;

pub use api::RegistryClient;
pub use browser::{execute, Browser, Fetch, Fetched};
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use remote::{Remote, RemoteData, Ticket};
pub use routes::Route;
pub use session::{IdentitySource, SessionState, SessionStore};
