use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use copro_ai::workflows::analysis::{
    analysis_router, AnalysisCoordinator, ContentStore, DocumentAnalyzer, DossierRepository,
    ProgressSink,
};

pub(crate) fn with_analysis_routes<R, C, A, P>(
    coordinator: Arc<AnalysisCoordinator<R, C, A, P>>,
) -> axum::Router
where
    R: DossierRepository + 'static,
    C: ContentStore + 'static,
    A: DocumentAnalyzer + 'static,
    P: ProgressSink + 'static,
{
    analysis_router(coordinator)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ServiceState {
    Ok,
    Ready,
    Initializing,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusBody {
    status: ServiceState,
}

pub(crate) async fn healthcheck() -> Json<StatusBody> {
    Json(StatusBody {
        status: ServiceState::Ok,
    })
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    if ready {
        (
            StatusCode::OK,
            Json(StatusBody {
                status: ServiceState::Ready,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusBody {
                status: ServiceState::Initializing,
            }),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
