//! HTTP middleware: authentication extractors, throttling, response headers
//! and request logging.

pub mod auth;
mod client;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::{AdminUser, AuthenticatedUser, OptionalUser};
pub use client::{resolve_client, ClientAddr, ProxyPolicy};
pub use rate_limiter::{rate_limit, RateLimiter};
pub use security::{security_headers, SecurityHeaders};
pub use self::tracing::request_tracing;
