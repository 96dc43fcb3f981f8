use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use axum_session::SessionLayer;
use routes::{ask::ask, test::test, upload::upload};
use session::ensure_session_id;
use tower_http::cors::CorsLayer;
use tracing::warn;

pub mod api_state;
pub mod error;
pub mod routes;
pub mod session;

/// Router for the upload / ask / test endpoints, with session plumbing and
/// optional credentialed CORS.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    let mut router = Router::new()
        .route("/test", get(test))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(
                app_state.config.upload_max_body_bytes,
            )),
        )
        .route("/ask", post(ask))
        .layer(from_fn(ensure_session_id))
        .layer(SessionLayer::new((*app_state.session_store).clone()));

    if let Some(layer) = cors_layer(app_state.config.cors_allowed_origin.as_deref()) {
        router = router.layer(layer);
    }

    router
}

// Session correlation rides on a cookie, so the browser needs credentialed
// CORS against an exact origin rather than a wildcard.
fn cors_layer(allowed_origin: Option<&str>) -> Option<CorsLayer> {
    let origin = allowed_origin?;
    match origin.parse::<HeaderValue>() {
        Ok(value) => Some(
            CorsLayer::new()
                .allow_origin(value)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(true),
        ),
        Err(err) => {
            warn!(origin, error = %err, "ignoring unparseable CORS origin");
            None
        }
    }
}
