// fincache library root.
// Session-scoped TTL cache, cache-or-fetch facade, budget selection state, and API error handling.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod state;

pub use error::{FinError, Result};
pub use session::Session;
