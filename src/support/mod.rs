//! Support tickets from signed-in and anonymous visitors

mod model;
mod service;

pub use model::*;
pub use service::{SupportError, SupportService};
