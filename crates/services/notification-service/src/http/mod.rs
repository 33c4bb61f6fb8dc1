//! HTTP surface: health check and a manual trigger for external schedulers.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
