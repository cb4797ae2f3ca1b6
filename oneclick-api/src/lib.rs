//! OneClick API Server
//!
//! HTTP bridge standing in for the work item form host: lifecycle events
//! are posted to the rule dispatcher, and the rule list and last error are
//! exposed for the rules group UI.

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, SeedData};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Form lifecycle
        .route("/api/events/:event", post(handlers::dispatch_event))
        .route("/api/form/fields", get(handlers::get_form_fields))
        // Rules
        .route("/api/rules", get(handlers::list_rules))
        .route("/api/rules/refresh", post(handlers::refresh_rules))
        .route("/api/rules/reorder", post(handlers::reorder_rules))
        .route("/api/rules/:id/execute", post(handlers::execute_rule))
        // Last error
        .route(
            "/api/errors/last",
            get(handlers::get_last_error).delete(handlers::clear_last_error),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
