use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, SecurityHeaders};
use crate::handlers::{events, health_check, reservations, users};
use crate::state::AppState;

pub fn create_routes(state: AppState, cors_allowed_origins: &str, production: bool) -> Router {
    let user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/me", get(users::me))
        .route("/forgot-password", post(users::forgot_password))
        .route("/change-password", post(users::change_password));

    let event_routes = Router::new()
        .route("/", post(events::create_event).get(events::list_events))
        .route(
            "/:id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/:id/reservations", post(reservations::reserve));

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/reservations", get(reservations::list_reservations))
        .nest("/users", user_routes)
        .nest("/events", event_routes)
        .with_state(state);

    SecurityHeaders::new(production)
        .apply(router)
        .layer(create_cors_layer(cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}
