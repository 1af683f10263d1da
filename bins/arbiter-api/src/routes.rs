// Route definitions for the Arbiter API

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::{handlers, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run/:problem_id", post(handlers::run_code))
        .route("/submit/:problem_id", post(handlers::submit_code))
        .route("/submissions/:problem_id", get(handlers::list_submissions))
        .route("/submissions", delete(handlers::purge_submissions))
        .route("/solved", get(handlers::solved_problems))
        .route("/problems/validate", post(handlers::validate_problem))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
}
