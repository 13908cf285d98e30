//! Blog posts: public reading, admin authoring

mod model;
mod service;

pub use model::*;
pub use service::{BlogError, BlogService};
