//! User domain: registration, profiles and admin user management

pub mod model;
mod service;

pub use model::UpdateUserRequest;
pub use service::{normalize_email, UserError, UserService};
