//! REST API handlers for segmentation, analytics and campaign endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use pulse_analytics::{compute, dashboard_stats, Analytics, DashboardStats};
use pulse_core::types::Campaign;
use pulse_core::{CrmError, CrmResult};
use pulse_segmentation::{evaluate, Audience, RuleExtractor, RuleSet};
use pulse_store::{fetch_snapshot, CreateCampaignRequest, CrmStore, UpdateCampaignRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

/// Maximum length of a free-text targeting request.
const MAX_REQUEST_TEXT_LEN: usize = 1024;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CrmStore>,
    pub extractor: Arc<RuleExtractor>,
    pub node_id: String,
    pub start_time: Instant,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRulesRequest {
    pub request_text: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateRulesResponse {
    pub rules: String,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub rules: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// Map a [`CrmError`] onto its HTTP status and wire error body.
fn error_response(err: CrmError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code, message) = match err {
        CrmError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_failed", msg),
        CrmError::RuleParse(msg) => (StatusCode::BAD_REQUEST, "invalid_rule_text", msg),
        CrmError::Upstream(msg) => {
            error!(error = %msg, "Upstream data source failed");
            (StatusCode::BAD_GATEWAY, "upstream_unavailable", msg)
        }
        other => {
            error!(error = %other, "Request processing failed");
            metrics::counter!("api.errors").increment(1);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal processing error".to_string(),
            )
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message,
        }),
    )
}

fn campaign_not_found(id: Uuid) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not_found".to_string(),
            message: format!("campaign {} not found", id),
        }),
    )
}

// ─── Segmentation ──────────────────────────────────────────────────────────

/// POST /api/v1/segments/generate-rules — turn a free-text targeting
/// request into canonical rule text.
pub async fn generate_rules(
    State(state): State<AppState>,
    Json(request): Json<GenerateRulesRequest>,
) -> ApiResult<Json<GenerateRulesResponse>> {
    let text = request.request_text.trim();
    if text.is_empty() {
        warn!("Rule generation rejected: empty request text");
        metrics::counter!("api.validation_errors").increment(1);
        return Err(error_response(CrmError::Validation(
            "requestText must not be empty".to_string(),
        )));
    }
    if text.len() > MAX_REQUEST_TEXT_LEN {
        warn!(len = text.len(), "Rule generation rejected: request text too long");
        metrics::counter!("api.validation_errors").increment(1);
        return Err(error_response(CrmError::Validation(
            "requestText exceeds maximum length".to_string(),
        )));
    }

    let rule_set = state.extractor.extract(text);
    let rules = rule_set.to_canonical().map_err(error_response)?;
    metrics::counter!("segments.rules_generated").increment(1);
    Ok(Json(GenerateRulesResponse { rules }))
}

/// POST /api/v1/segments/preview — evaluate rule text against the
/// current customer population without persisting anything.
pub async fn preview_segment(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<Audience>> {
    let rule_set = RuleSet::from_canonical(&request.rules).map_err(|e| {
        warn!(error = %e, "Segment preview rejected: unparseable rule text");
        metrics::counter!("api.validation_errors").increment(1);
        error_response(e)
    })?;

    let customers = state.store.list_customers();
    let audience = evaluate(&rule_set, &customers, Utc::now());
    Ok(Json(audience))
}

// ─── Analytics ─────────────────────────────────────────────────────────────

/// GET /api/v1/analytics — campaign, customer and revenue metrics
/// derived from a consistent snapshot of all four collections.
pub async fn get_analytics(State(state): State<AppState>) -> ApiResult<Json<Analytics>> {
    let snapshot = fetch_snapshot(state.store.as_ref())
        .await
        .map_err(error_response)?;
    let analytics = compute(
        &snapshot.customers,
        &snapshot.orders,
        &snapshot.campaigns,
        &snapshot.logs,
        Utc::now(),
    );
    Ok(Json(analytics))
}

/// GET /api/v1/dashboard/stats — headline totals for the dashboard.
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<DashboardStats>> {
    let snapshot = fetch_snapshot(state.store.as_ref())
        .await
        .map_err(error_response)?;
    let stats = dashboard_stats(&snapshot.customers, &snapshot.orders, &snapshot.campaigns);
    Ok(Json(stats))
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

/// GET /api/v1/campaigns — all campaigns, newest first.
pub async fn list_campaigns(State(state): State<AppState>) -> Json<Vec<Campaign>> {
    let mut campaigns = state.store.list_campaigns();
    campaigns.reverse();
    Json(campaigns)
}

/// POST /api/v1/campaigns — create a campaign. Explicit rule text wins;
/// otherwise the targeting request runs through the extractor.
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    if request.name.trim().is_empty() {
        warn!("Campaign creation rejected: empty name");
        metrics::counter!("api.validation_errors").increment(1);
        return Err(error_response(CrmError::Validation(
            "name must not be empty".to_string(),
        )));
    }

    let campaign = state
        .store
        .create_campaign(request)
        .map_err(|e| {
            warn!(error = %e, "Campaign creation rejected");
            metrics::counter!("api.validation_errors").increment(1);
            error_response(e)
        })?;
    metrics::counter!("campaigns.created").increment(1);
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// GET /api/v1/campaigns/{id}
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    state
        .store
        .get_campaign(id)
        .map(Json)
        .ok_or_else(|| campaign_not_found(id))
}

/// PUT /api/v1/campaigns/{id} — rule fields are only mutable in Draft.
pub async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<Campaign>> {
    match state.store.update_campaign(id, request) {
        Ok(Some(campaign)) => Ok(Json(campaign)),
        Ok(None) => Err(campaign_not_found(id)),
        Err(e) => {
            warn!(campaign_id = %id, error = %e, "Campaign update rejected");
            metrics::counter!("api.validation_errors").increment(1);
            Err(error_response(e))
        }
    }
}

/// DELETE /api/v1/campaigns/{id}
pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.store.delete_campaign(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(campaign_not_found(id))
    }
}

/// POST /api/v1/campaigns/{id}/launch — Draft to Active.
pub async fn launch_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    transition_response(state.store.launch_campaign(id), id)
}

/// POST /api/v1/campaigns/{id}/complete — Active to Completed.
pub async fn complete_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    transition_response(state.store.complete_campaign(id), id)
}

fn transition_response(result: CrmResult<Option<Campaign>>, id: Uuid) -> ApiResult<Json<Campaign>> {
    match result {
        Ok(Some(campaign)) => Ok(Json(campaign)),
        Ok(None) => Err(campaign_not_found(id)),
        Err(e) => {
            warn!(campaign_id = %id, error = %e, "Campaign transition rejected");
            metrics::counter!("api.validation_errors").increment(1);
            Err(error_response(e))
        }
    }
}

// ─── Operational ───────────────────────────────────────────────────────────

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
/// Returns 200 only when the service is ready to accept traffic.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let (status, body) = error_response(CrmError::Validation("empty name".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0.error, "validation_failed");
        assert_eq!(body.0.message, "empty name");
    }

    #[test]
    fn test_rule_parse_maps_to_bad_request() {
        let (status, body) = error_response(CrmError::RuleParse("bad token".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0.error, "invalid_rule_text");
    }

    #[test]
    fn test_upstream_maps_to_bad_gateway() {
        let (status, body) = error_response(CrmError::Upstream("offline".to_string()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.0.error, "upstream_unavailable");
    }

    #[test]
    fn test_internal_maps_to_server_error_with_generic_message() {
        let (status, body) = error_response(CrmError::Internal(anyhow::anyhow!("boom")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.0.error, "internal_error");
        assert_eq!(body.0.message, "Internal processing error");
    }
}
