use crate::cli::ServeArgs;
use crate::generator::HttpTextGenerator;
use crate::infra::{AppState, InMemoryBlobStore, InMemoryCommunityStore, InMemoryNotifier};
use crate::routes::with_community_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use revamp::config::AppConfig;
use revamp::error::AppError;
use revamp::telemetry;
use revamp::workflows::assist::assist_router;
use revamp::workflows::membership::CommunityService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(CommunityService::new(
        Arc::new(InMemoryCommunityStore::default()),
        Arc::new(InMemoryBlobStore::default()),
        Arc::new(InMemoryNotifier::default()),
        config.ambassador,
    ));

    let mut app = with_community_routes(service);
    match config.assist.as_ref() {
        Some(assist) => {
            info!(endpoint = %assist.endpoint, model = %assist.model, "assist routes enabled");
            app = app.merge(assist_router(Arc::new(HttpTextGenerator::new(assist))));
        }
        None => info!("ASSIST_ENDPOINT unset; assist routes disabled"),
    }
    let app = app
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        min_points = config.ambassador.minimum_points,
        "community service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
