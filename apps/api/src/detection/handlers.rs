//! Axum route handlers for the Detection API.

use anyhow::Context;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::detection::document::Document;
use crate::detection::overrides::SiteOverrideSpec;
use crate::detection::registry::FieldTypeInfo;
use crate::detection::session::{Checkout, ScanReport};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    /// Serialized DOM snapshot of the page.
    pub html: String,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Stable id of the calling tab or content script. Enables debouncing.
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FieldTypesResponse {
    pub field_types: Vec<FieldTypeInfo>,
}

#[derive(Debug, Serialize)]
pub struct SiteOverridesResponse {
    pub site_overrides: Vec<SiteOverrideSpec>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/detect
///
/// Classifies every visible form field in `html`. A request for a known
/// `client_id` that arrives within the cooldown returns the previous result set
/// with `debounced: true`.
pub async fn handle_detect(
    State(state): State<AppState>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<ScanReport>, AppError> {
    if request.html.trim().is_empty() {
        return Err(AppError::Validation("html cannot be empty".to_string()));
    }

    let hostname = request.hostname.unwrap_or_default().trim().to_string();
    let client_id = request
        .client_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let mut session = match state.sessions.check_out(client_id).await {
        Checkout::Cached(report) => return Ok(Json(report)),
        Checkout::Ready(session) => session,
    };

    // Html is !Send; parse and scan on the blocking pool, then hand the session back.
    let html = request.html;
    let session = tokio::task::spawn_blocking(move || {
        let doc = Document::parse(&html);
        session.scan(&doc, &hostname);
        session
    })
    .await
    .context("Detection scan task failed")?;

    let report = state.sessions.check_in(client_id, session).await;
    Ok(Json(report))
}

/// GET /api/v1/field-types
pub async fn handle_field_types(State(state): State<AppState>) -> Json<FieldTypesResponse> {
    Json(FieldTypesResponse {
        field_types: state
            .engine
            .registry()
            .rules()
            .iter()
            .map(|rule| rule.info())
            .collect(),
    })
}

/// GET /api/v1/site-overrides
pub async fn handle_site_overrides(State(state): State<AppState>) -> Json<SiteOverridesResponse> {
    Json(SiteOverridesResponse {
        site_overrides: state
            .engine
            .overrides()
            .rules()
            .iter()
            .map(|rule| rule.spec())
            .collect(),
    })
}
