use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::SchedulingEngine;
use crate::services::notify::{MailerClient, NotificationDispatcher, NullDispatcher};
use crate::store::{InMemoryStore, SupabaseStore};

pub struct SchedulingState {
    pub engine: SchedulingEngine,
    pub config: Arc<AppConfig>,
}

impl SchedulingState {
    /// Production wiring: PostgREST storage, mailer when configured.
    pub fn supabase(config: Arc<AppConfig>) -> Self {
        let store = Arc::new(SupabaseStore::new(&config));
        let notifier: Arc<dyn NotificationDispatcher> = if config.is_mailer_configured() {
            Arc::new(MailerClient::new(&config))
        } else {
            Arc::new(NullDispatcher)
        };

        Self {
            engine: SchedulingEngine::new(store.clone(), store.clone(), store, notifier),
            config,
        }
    }

    /// Local development and test wiring over the in-memory store.
    pub fn in_memory(config: Arc<AppConfig>, store: Arc<InMemoryStore>) -> Self {
        Self {
            engine: SchedulingEngine::new(
                store.clone(),
                store.clone(),
                store,
                Arc::new(NullDispatcher),
            ),
            config,
        }
    }
}

pub fn scheduling_routes(state: Arc<SchedulingState>) -> Router {
    // Every route requires an authenticated caller.
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/timeslots", get(handlers::list_timeslots))
        .route("/my", get(handlers::my_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/status", patch(handlers::transition_appointment))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}

pub fn doctor_routes(state: Arc<SchedulingState>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/appointments", get(handlers::doctor_appointments))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}
