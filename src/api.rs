use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::*;
pub use state::*;

mod courses;
mod error;
mod identity;
mod payments;
mod state;
mod views;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Uploads (thumbnails) may be larger than axum's default body limit.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn create_router(app: App, request_timeout: Duration) -> Router {
    Router::new()
        .route("/course", post(courses::create))
        .route("/courses", get(courses::list))
        .route(
            "/course/:id",
            get(courses::show)
                .patch(courses::update)
                .delete(courses::remove),
        )
        .route("/course/:id/enroll", post(courses::enroll))
        .route("/course/:id/discount", patch(courses::discount))
        .route(
            "/course/:id/thumbnail",
            patch(courses::thumbnail).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/course/:id/video",
            post(courses::add_video).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/video/:id", delete(courses::remove_video))
        .route("/payment", post(payments::charge))
        .route("/student", post(identity::register_student))
        .route("/tutor", post(identity::register_tutor))
        .route("/profile/:id", patch(identity::update_profile))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(app)
}
