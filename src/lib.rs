pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod pages;
pub mod password;
pub mod rate_limit;
pub mod store;

use api::create_api_router;
use auth::{Gate, GatePolicy, HttpRenewer, InProcessRenewer, RenewalBackend, gate_middleware};
use axum::{Router, middleware};
use db::Database;
use jwt::JwtConfig;
use pages::{PagesState, create_pages_router};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Token codecs and lifetimes
    pub jwt: Arc<JwtConfig>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Protected prefixes, login path and renewal budget
    pub gate: GatePolicy,
    /// Renew over HTTP against this verification endpoint instead of in-process
    pub renewal_endpoint: Option<Url>,
    pub rate_limit: RateLimitConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let renewer = match &config.renewal_endpoint {
        Some(endpoint) => RenewalBackend::Http(HttpRenewer::new(endpoint.clone())),
        None => {
            RenewalBackend::InProcess(InProcessRenewer::new(config.db.clone(), config.jwt.clone()))
        }
    };

    let gate = Arc::new(Gate::new(
        config.gate.clone(),
        config.jwt.clone(),
        renewer,
        config.secure_cookies,
    ));

    let api_router = create_api_router(
        config.db.clone(),
        config.jwt.clone(),
        config.secure_cookies,
        config.rate_limit.clone(),
    );

    let page_router = create_pages_router(
        PagesState {
            jwt: config.jwt.clone(),
        },
        &config.gate.login_path,
    );

    Router::new()
        .nest("/api", api_router)
        .merge(page_router)
        .layer(middleware::from_fn_with_state(
            gate,
            gate_middleware::<RenewalBackend>,
        ))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
