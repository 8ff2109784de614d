use crate::discord::DiscordClient;
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request, header::CONTENT_TYPE},
    middleware,
    routing::get,
};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    services::{ServeDir, ServeFile},
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;

pub mod error;
pub mod handlers;
pub mod identity;
pub mod session;
pub mod templates;

use self::handlers::{auth, health, pages, service};
pub use self::session::SessionSettings;

/// Everything the handlers need, built once at startup.
#[derive(Clone, Debug)]
pub struct SiteConfig {
    pub discord: DiscordClient,
    pub session: SessionSettings,
    pub static_dir: PathBuf,
}

/// Build the site router.
#[must_use]
pub fn router(config: SiteConfig) -> Router {
    let favicon = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_TYPE,
            HeaderValue::from_static("image/vnd.microsoft.icon"),
        ))
        .service(ServeFile::new(
            config.static_dir.join("images").join("favicon.ico"),
        ));

    Router::new()
        .route("/", get(pages::index))
        .route("/discord", get(pages::discord))
        .route("/service", get(service::list))
        .route("/service/", get(service::bare))
        .route("/service/{service_id}", get(service::show))
        .route("/login", get(auth::login))
        .route("/logout", get(auth::logout))
        .route("/auth/callback", get(auth::callback))
        .route("/health", get(health::health))
        .route_service("/favicon.ico", favicon)
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(
            Arc::new(config.session),
            session::session_layer,
        ))
        .layer(Extension(config.discord))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, config: SiteConfig) -> Result<()> {
    let app = router(config).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
