use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryContentStore, InMemoryDossierRepository, InMemoryProgressSink,
};
use crate::routes::with_analysis_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use copro_ai::config::AppConfig;
use copro_ai::error::AppError;
use copro_ai::telemetry;
use copro_ai::workflows::analysis::ai::gemini::GeminiAnalyzer;
use copro_ai::workflows::analysis::AnalysisCoordinator;
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryDossierRepository::default());
    let content_store = Arc::new(InMemoryContentStore::default());
    let progress = Arc::new(InMemoryProgressSink::default());
    let analyzer = Arc::new(GeminiAnalyzer::from_config(&config.analysis)?);
    let coordinator = Arc::new(
        AnalysisCoordinator::new(repository, content_store, analyzer, progress)
            .with_upload_stagger(config.analysis.upload_stagger),
    );

    let app = with_analysis_routes(coordinator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "dossier analysis service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
