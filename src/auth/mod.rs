//! Authentication module for Coinfolio
//!
//! - Email/password credentials with bcrypt hashes
//! - JWT access and refresh tokens
//! - Server-side sessions so tokens can be revoked

pub mod jwt;
pub mod password;
mod service;

pub use jwt::{generate_access_token, generate_refresh_token, verify_token, Claims, TokenType};
pub use service::{AuthError, AuthService, ClientMeta};
