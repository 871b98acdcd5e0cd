use service_core::observability::{init_tracing, shutdown_tracing};
use user_service::config::UserServiceConfig;
use user_service::services::init_metrics;
use user_service::startup::Application;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config = UserServiceConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // Initialize metrics recorder (must be before any metrics are recorded)
    init_metrics();

    init_tracing(
        &config.telemetry.service_name,
        &config.telemetry.environment,
        &config.common.log_level,
        &config.telemetry.otlp_endpoint,
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to start user-service: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    });

    let result = match app {
        Ok(app) => app.run_until_stopped().await,
        Err(e) => Err(e),
    };

    shutdown_tracing();

    result
}
