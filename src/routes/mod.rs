//! Route definitions for the Coinfolio API

mod auth;
mod blog;
mod coins;
mod market;
mod support;
mod users;
mod wallet;

pub use auth::auth_routes;
pub use blog::blog_routes;
pub use coins::coin_routes;
pub use market::market_routes;
pub use support::support_routes;
pub use users::user_routes;
pub use wallet::wallet_routes;
