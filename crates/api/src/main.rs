use austin_api::app::{build_app, services::build_services};
use austin_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    austin_observability::init();

    let config = AppConfig::from_env()?;
    let services = build_services(&config).await?;
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
