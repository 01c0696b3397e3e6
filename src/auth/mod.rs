//! API-key authentication. Grounded on `auth::middleware`'s
//! extract-then-inject-into-extensions shape, stripped of JWT/user accounts: the
//! system has no login flow, only a static key-to-role table from `Settings`.

pub mod middleware;

pub use middleware::{auth_middleware, ApiKeyPrincipal, AuthError};
