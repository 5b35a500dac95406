//! HTTP surface of the relay.
//!
//! | route                        | purpose                                        |
//! |------------------------------|------------------------------------------------|
//! | `GET  /`                     | liveness text                                  |
//! | `GET  /server`               | liveness text                                  |
//! | `POST /server`               | `{text, chatId?}` -> `{reply}`                 |
//! | `POST /api/process`          | legacy `{text}` -> `{reply}`, raw context      |
//! | `GET  /server/history`       | `?chatId=` messages, or all chat ids           |
//! | `POST /server/history`       | create (`chatId: null`) or replace a chat      |
//! | `DELETE /server/history`     | `?chatId=` delete a chat                       |
//! | `GET  /health`               | provider reachability                          |
//!
//! Every response carries the CORS headers for the configured origin and every
//! route answers `OPTIONS` with `204`.
pub mod error;
pub mod prompt;
pub mod routes;
pub mod state;

use aip_common::{AipError, Result};
use axum::{
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Build the router with CORS headers for `allowed_origin`.
pub fn router(state: AppState, allowed_origin: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|e| AipError::Config(format!("allowed_origin {allowed_origin:?}: {e}")))?;

    let app = Router::new()
        .route("/", get(routes::root).options(routes::preflight))
        .route(
            "/server",
            get(routes::server_status)
                .post(routes::chat::chat)
                .options(routes::preflight),
        )
        .route(
            "/server/history",
            get(routes::history::get_history)
                .post(routes::history::save_history)
                .delete(routes::history::delete_history)
                .options(routes::preflight),
        )
        .route(
            "/api/process",
            axum::routing::post(routes::chat::process).options(routes::preflight),
        )
        .route("/health", get(routes::health).options(routes::preflight))
        .fallback(routes::not_found)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            origin,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

/// Serve `app` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
