use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use helpdesk_core::config::GatewayConfig;

use super::auth::{auth_middleware, AuthMiddleware};
use super::handlers;
use super::state::AppState;
use super::tracing::tracing_middleware;

/// Gateway HTTP server.
pub struct GatewayServer {
    config: GatewayConfig,
    auth: Arc<AuthMiddleware>,
    state: AppState,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, auth: AuthMiddleware, state: AppState) -> Self {
        Self {
            config,
            auth: Arc::new(auth),
            state,
        }
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        let origins = &self.config.cors_origins;
        let cors = if origins.is_empty() || origins.iter().any(|o| o == "*") {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handlers::health_handler))
            .route(
                "/tickets",
                get(handlers::list_tickets).post(handlers::create_ticket),
            )
            .route(
                "/tickets/{id}",
                get(handlers::show_ticket)
                    .put(handlers::update_ticket)
                    .delete(handlers::delete_ticket),
            )
            .route("/tickets/{id}/files", post(handlers::upload_ticket_files))
            .route(
                "/tickets/files/{file_id}",
                get(handlers::download_ticket_file).delete(handlers::delete_ticket_file),
            )
            .route("/followups", post(handlers::create_followup))
            .route(
                "/followups/{id}",
                put(handlers::update_followup).delete(handlers::delete_followup),
            )
            .route(
                "/followups/files/{file_id}",
                get(handlers::download_followup_file).delete(handlers::delete_followup_file),
            )
            .route("/files/{file_type}/{file_id}", get(handlers::download_file))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors)
                    .layer(request_timeout(Duration::from_secs(
                        self.config.request_timeout_secs,
                    )))
                    .layer(middleware::from_fn_with_state(
                        self.auth.clone(),
                        auth_middleware,
                    ))
                    .layer(middleware::from_fn(tracing_middleware)),
            )
            .with_state(self.state.clone())
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.config.port))
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!("Gateway server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Requests still running after `timeout` are answered with 408.
fn request_timeout(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}
