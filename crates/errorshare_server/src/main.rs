mod assets;
mod env;
mod errors;
mod handlers;
mod page;
mod ratelimit;
#[cfg(test)]
mod test_helpers;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, FromRef, Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::{Next, from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{Router, get, post};
use http::header::{
    CONTENT_SECURITY_POLICY, CONTENT_TYPE, REFERRER_POLICY, SERVER, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use tokio::net::{TcpListener, UnixListener};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::errors::{Error, JsonErrorResponse};
use crate::handlers::{create, get as item};
use crate::ratelimit::RateLimiter;
use errorshare_core::db::Database;

/// Reference counted [`page::Page`] wrapper.
pub(crate) type Page = Arc<page::Page>;

/// Reference counted [`ratelimit::RateLimiter`] wrapper.
pub(crate) type Limiter = Arc<RateLimiter>;

#[derive(Clone)]
pub(crate) struct AppState {
    db: Database,
    page: Page,
    limiter: Limiter,
}

impl FromRef<AppState> for Page {
    fn from_ref(state: &AppState) -> Self {
        state.page.clone()
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Limiter {
    fn from_ref(state: &AppState) -> Self {
        state.limiter.clone()
    }
}

async fn security_headers_layer(req: Request, next: Next) -> impl IntoResponse {
    const SECURITY_HEADERS: [(HeaderName, HeaderValue); 7] = [
        (SERVER, HeaderValue::from_static(env!("CARGO_PKG_NAME"))),
        (
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'none'; img-src 'self' data: ; style-src 'self' ; font-src 'self' data: ; object-src 'none' ; base-uri 'none' ; frame-ancestors 'none' ; form-action 'self' ;",
            ),
        ),
        (REFERRER_POLICY, HeaderValue::from_static("same-origin")),
        (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ),
        (X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
    ];

    (SECURITY_HEADERS, next.run(req).await)
}

/// Rewrite plain-text rejections of the framework into the JSON failure shape of our API.
async fn handle_service_errors(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"application/json"));

    if is_json {
        return response;
    }

    match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => {
            JsonErrorResponse::from(Error::PayloadTooLarge).into_response()
        }
        StatusCode::UNSUPPORTED_MEDIA_TYPE => JsonErrorResponse::from(Error::Request(
            handlers::create::ParseError::UnsupportedMediaType,
        ))
        .into_response(),
        _ => response,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received signal, exiting ...");
}

fn make_app(state: AppState, timeout: Duration, max_body_size: usize) -> Router {
    let limited = Router::new()
        .route("/create", post(create::post))
        .route_layer(from_fn_with_state(
            state.limiter.clone(),
            ratelimit::limit,
        ));

    Router::new()
        .route(
            state.page.assets.favicon.route(),
            get(async |State(page): State<Page>| page.assets.favicon.clone()),
        )
        .route(
            state.page.assets.style.route(),
            get(async |State(page): State<Page>| page.assets.style.clone()),
        )
        .route("/{name}", get(item::get))
        .merge(limited)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(max_body_size))
                .layer(CompressionLayer::new())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(from_fn(handle_service_errors))
                .layer(from_fn(security_headers_layer)),
        )
        .with_state(state)
}

async fn start() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let method = env::database_method()?;
    let socket_type = env::socket_type()?;
    let max_body_size = env::max_body_size()?;
    let base_url = env::base_url()?;
    let editor_url = env::editor_url(&base_url)?;
    let timeout = env::http_timeout()?;
    let title = env::title();

    let db = Database::new(method)?;

    tracing::debug!("serving on {socket_type}");
    tracing::debug!("handing out links under {base_url}");
    tracing::debug!("linking back to the editor at {editor_url}");
    tracing::debug!("restricting maximum body size to {max_body_size} bytes");
    tracing::debug!("enforcing a http timeout of {timeout:#?}");

    let page = Arc::new(page::Page::new(title, base_url, editor_url));
    let limiter = Arc::new(RateLimiter::default());
    let state = AppState { db, page, limiter };

    let app = make_app(state, timeout, max_body_size);

    match socket_type {
        env::SocketType::Tcp(addr) => {
            let listener = TcpListener::bind(addr).await?;
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        }
        env::SocketType::Unix(path) => {
            let listener = UnixListener::bind(path)?;
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
