use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::ai::DocumentAnalyzer;
use super::coordinator::AnalysisCoordinator;
use super::domain::{AnalysisContext, DossierId};
use super::progress::ProgressSink;
use super::repository::{ContentStore, DossierRepository, RepositoryError};

/// Router builder exposing HTTP endpoints for starting and watching runs.
pub fn analysis_router<R, C, A, P>(coordinator: Arc<AnalysisCoordinator<R, C, A, P>>) -> Router
where
    R: DossierRepository + 'static,
    C: ContentStore + 'static,
    A: DocumentAnalyzer + 'static,
    P: ProgressSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/dossiers/:dossier_id/analysis",
            post(start_handler::<R, C, A, P>),
        )
        .route(
            "/api/v1/dossiers/:dossier_id/analysis",
            get(status_handler::<R, C, A, P>),
        )
        .with_state(coordinator)
}

pub(crate) async fn start_handler<R, C, A, P>(
    State(coordinator): State<Arc<AnalysisCoordinator<R, C, A, P>>>,
    Path(dossier_id): Path<String>,
    axum::Json(context): axum::Json<AnalysisContext>,
) -> Response
where
    R: DossierRepository + 'static,
    C: ContentStore + 'static,
    A: DocumentAnalyzer + 'static,
    P: ProgressSink + 'static,
{
    let id = DossierId(dossier_id);
    if coordinator.is_running(&id) {
        let payload = json!({
            "error": "analysis already in progress",
        });
        return (StatusCode::CONFLICT, axum::Json(payload)).into_response();
    }

    match coordinator.document_count(&id).await {
        Ok(0) => {
            let payload = json!({
                "error": "dossier has no documents",
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Ok(_) => {
            let worker = Arc::clone(&coordinator);
            let run_id = id.clone();
            tokio::spawn(async move {
                worker.start_analysis(&run_id, &context).await;
            });
            let payload = json!({
                "dossier_id": id.0,
                "status": "started",
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(RepositoryError::NotFound) => {
            let payload = json!({
                "error": "dossier not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn status_handler<R, C, A, P>(
    State(coordinator): State<Arc<AnalysisCoordinator<R, C, A, P>>>,
    Path(dossier_id): Path<String>,
) -> Response
where
    R: DossierRepository + 'static,
    C: ContentStore + 'static,
    A: DocumentAnalyzer + 'static,
    P: ProgressSink + 'static,
{
    let id = DossierId(dossier_id);
    let view = coordinator.status(&id);
    (StatusCode::OK, axum::Json(view)).into_response()
}
