use crate::cli::ServeArgs;
use crate::infra::{build_registrar, staff_permissions, AppState};
use crate::routes::with_registrar_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use registrar::config::AppConfig;
use registrar::error::AppError;
use registrar::telemetry;
use registrar::workflows::finance::PaymentWebhook;
use registrar::workflows::Collaborators;
use std::sync::atomic::{AtomicBool, Ordering};
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (registrar, worker) = build_registrar(&config.policy, Collaborators::in_memory())?;
    let registrar = Arc::new(registrar);
    let _outbox = worker.spawn();

    if config.webhook.secret.is_none() {
        warn!("APP_PAYMENT_WEBHOOK_SECRET is unset; payment webhooks will be rejected");
    }
    let webhook = Arc::new(PaymentWebhook::new(
        Arc::clone(&registrar.billing),
        config.webhook.secret.as_deref(),
    ));

    let app = with_registrar_routes(registrar, Arc::new(staff_permissions()), webhook)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        min_approved_documents = config.policy.min_approved_documents,
        "registrar service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
