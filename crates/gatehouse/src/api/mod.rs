//! HTTP surface: auth endpoints, the access gate and the page fallback.

pub mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
