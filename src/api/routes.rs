use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Users
        .route("/v1/users", post(handlers::register))
        .route("/v1/users/me", put(handlers::edit_profile))
        .route("/v1/users/:username", get(handlers::get_profile))
        // Distilleries
        .route(
            "/v1/distilleries",
            get(handlers::list_distilleries).post(handlers::add_distillery),
        )
        .route(
            "/v1/distilleries/:id",
            get(handlers::get_distillery).put(handlers::edit_distillery),
        )
        .route("/v1/distilleries/:id/whiskies", post(handlers::add_whisky))
        // Whiskies
        .route(
            "/v1/whiskies/:id",
            get(handlers::get_whisky).put(handlers::edit_whisky),
        )
        .route("/v1/whiskies/:id/tried", post(handlers::toggle_tried))
        .route("/v1/whiskies/:id/reviews", post(handlers::submit_review))
        // Reviews
        .route("/v1/reviews", get(handlers::explore))
        .route(
            "/v1/reviews/:id",
            put(handlers::edit_review).delete(handlers::delete_review),
        )
        // Search
        .route("/v1/search", get(handlers::simple_search))
        .route("/v1/search/advanced", get(handlers::advanced_search))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}
