use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use send_emails_module::{PostmarkConfig, PostmarkTransport};
use tokio::task;
use tracing::{debug, error, info};

use crate::config::{ReportingConfig, ServiceConfig};
use crate::inbound::InboundHandler;
use crate::loop_guard::MailingLists;
use crate::mailer::Mailer;
use crate::poller::ReportPoller;
use crate::store::DashboardClient;
use crate::templates::MailTemplates;
use crate::BoxError;

#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<ReportPoller>,
    pub inbound: Arc<InboundHandler>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/email_poll", get(email_poll))
        .route("/_ah/mail/*address", post(incoming_mail))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Wires the production collaborators together. Everything that touches the
/// blocking HTTP clients is built off the async runtime.
pub fn build_state(config: &ServiceConfig) -> Result<AppState, BoxError> {
    let reporting = ReportingConfig::load(&config.reporting_config_path)?;
    let mailing_lists = Arc::new(MailingLists::from_config(&reporting));
    info!(
        "loaded {} namespaces, {} mailing lists from {}",
        reporting.namespaces.len(),
        mailing_lists.len(),
        config.reporting_config_path.display()
    );

    let transport = Arc::new(PostmarkTransport::new(PostmarkConfig::from_env()?));
    let mailer = Arc::new(Mailer::new(transport, config.own_address()));
    let dashboard = Arc::new(DashboardClient::new(
        config.dashboard_url.clone(),
        config.dashboard_api_key.clone(),
    ));
    let templates = Arc::new(MailTemplates::new()?);

    Ok(AppState {
        poller: Arc::new(ReportPoller::new(dashboard.clone(), mailer.clone(), templates)),
        inbound: Arc::new(InboundHandler::new(
            dashboard.clone(),
            dashboard,
            mailer,
            mailing_lists,
            config.testing_enabled,
        )),
    })
}

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let build_config = config.clone();
    let state = task::spawn_blocking(move || build_state(&build_config))
        .await
        .map_err(|err| -> BoxError { err.into() })??;

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    info!("email reporting listening on {}", addr);

    let app = router(state, config.inbound_body_max_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn email_poll(State(state): State<AppState>) -> impl IntoResponse {
    let poller = state.poller.clone();
    match task::spawn_blocking(move || poller.run_poll_cycle()).await {
        Ok(Ok(())) => (StatusCode::OK, "OK".to_string()),
        Ok(Err(err)) => {
            error!("{}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        Err(err) => {
            error!("poll task failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn incoming_mail(
    State(state): State<AppState>,
    Path(address): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    debug!("incoming mail for {} ({} bytes)", address, body.len());
    let inbound = state.inbound.clone();
    if let Err(err) = task::spawn_blocking(move || inbound.handle(&body)).await {
        error!("inbound mail task failed: {}", err);
    }
    StatusCode::OK
}
