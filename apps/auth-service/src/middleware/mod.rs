//! Request middleware: API-key classification and the two rate limiters.

pub mod auth;
pub mod rate_limit;

pub use auth::{optional_api_key_auth, ApiKey};
pub use rate_limit::{token_rate_limit, user_rate_limit};
