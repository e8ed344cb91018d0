//! Trigger API route handlers.
//!
//! All endpoints return JSON. State is the shared `AnalysisPipeline`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::AnalysisSnapshot;
use crate::engine::pipeline::{AnalysisPipeline, PipelineStatus};
use crate::strategy::StrategyResult;
use crate::types::LottoError;

pub type AppState = Arc<AnalysisPipeline>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub seed: Option<u64>,
}

/// Domain error rendered as a JSON body with a matching status code.
#[derive(Debug)]
pub struct ApiError(pub LottoError);

impl From<LottoError> for ApiError {
    fn from(err: LottoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            LottoError::StaleState | LottoError::AnalysisInProgress => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(pipeline): State<AppState>) -> Json<PipelineStatus> {
    Json(pipeline.status())
}

/// POST /api/analysis
///
/// Claims the run slot up front so an overlapping request gets its 409
/// immediately; the run itself continues in the background.
pub async fn start_analysis(
    State(pipeline): State<AppState>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let permit = pipeline.try_begin().map_err(|err| {
        warn!("Analysis request rejected: already running");
        ApiError(err)
    })?;

    let worker = Arc::clone(&pipeline);
    tokio::spawn(async move {
        // Outcome lands in the session; the pipeline logs it.
        let _ = worker.run(permit).await;
    });

    info!("Analysis started");
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            message: "Analysis started".to_string(),
        }),
    ))
}

/// GET /api/analysis
pub async fn get_analysis(
    State(pipeline): State<AppState>,
) -> Result<Json<AnalysisSnapshot>, ApiError> {
    let snapshot = pipeline.snapshot().ok_or(LottoError::StaleState)?;
    Ok(Json(snapshot.as_ref().clone()))
}

/// POST /api/recommendations?seed=N
pub async fn post_recommendations(
    State(pipeline): State<AppState>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<Vec<StrategyResult>>, ApiError> {
    let mut rng = match query.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let results = pipeline.request_recommendations(&mut rng)?;
    Ok(Json(results))
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
