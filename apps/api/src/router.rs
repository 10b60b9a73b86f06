use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::router::{doctor_routes, scheduling_routes, SchedulingState};

pub fn create_router(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/doctors", doctor_routes(state))
}
