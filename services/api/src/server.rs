use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryApprovalSource, StaticPermissions, TracingNotifier};
use crate::routes::with_approval_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use dealer_ops::config::AppConfig;
use dealer_ops::error::AppError;
use dealer_ops::telemetry;
use dealer_ops::workflows::get_ready::approvals::{
    ApprovalCoordinator, APPROVE_VEHICLES_ACTION, GET_READY_MODULE,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let source = Arc::new(InMemoryApprovalSource::seeded(Utc::now()));
    let permissions = Arc::new(StaticPermissions::granting([(
        GET_READY_MODULE,
        APPROVE_VEHICLES_ACTION,
    )]));
    let notifier = Arc::new(TracingNotifier::default());
    let coordinator = Arc::new(ApprovalCoordinator::new(
        source,
        permissions,
        notifier,
        config.approvals.clone(),
    ));

    // The service still starts when the first load fails; POST .../refresh retries it.
    if let Err(err) = coordinator.refresh().await {
        warn!(error = %err, "initial approval queue load failed");
    }

    let app = with_approval_routes(coordinator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        scope = ?config.approvals.scope,
        "get-ready approvals service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
