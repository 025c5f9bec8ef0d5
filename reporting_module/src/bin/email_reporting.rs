use reporting_module::{run_server, BoxError, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = ServiceConfig::from_env()?;
    run_server(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
