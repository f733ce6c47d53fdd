use crate::cli::ServeArgs;
use crate::infra::{build_registry, seed_demo_accounts, AppState};
use crate::routes::portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use resident_registry::auth::StaffId;
use resident_registry::config::{AppConfig, AppEnvironment};
use resident_registry::error::AppError;
use resident_registry::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let registry = build_registry(&config)?;
    if config.environment == AppEnvironment::Development {
        seed_demo_accounts(&registry.directory);
        info!("seeded development resident accounts");
    }

    // Staff identity provisioning is handled out of band; a session is
    // minted at startup so operators can drive the staff endpoints.
    let staff_token = registry
        .sessions
        .issue_staff(&StaffId("staff-on-duty".to_string()));
    info!(token = %staff_token.0, "staff session provisioned");

    let app = portal_routes(&registry)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "resident registry portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
