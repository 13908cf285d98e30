//! HTTP handlers, one module per domain

pub mod auth;
pub mod blog;
pub mod coins;
pub mod market;
pub mod support;
pub mod users;
pub mod wallet;

pub use crate::middleware::auth::{AdminUser, AuthenticatedUser, OptionalUser};
