//! Token snapshot, background reloader and Postgres repository.

mod reloader;
mod repository;
mod store;

pub use reloader::TokenReloader;
pub use repository::{PostgresTokenRepository, RepositoryError, TokenRepository};
pub use store::{Scope, TokenEntry, TokenStore};
