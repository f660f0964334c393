// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run tracking API routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Run, RunMode, RunStatus};
use crate::services::run::NewPoint;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// API timestamps are RFC3339 with a `Z` suffix, whole seconds.
fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Run routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/runs", post(create_run))
        .route("/api/runs/me/list", get(list_my_runs))
        .route("/api/runs/{run_id}", get(get_run))
        .route("/api/runs/{run_id}/points", post(upload_points))
        .route("/api/runs/{run_id}/complete", patch(complete_run))
        .route("/api/runs/{run_id}/cancel", patch(cancel_run))
}

// ─── Payloads ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateRunRequest {
    pub mode: RunMode,
    pub course_id: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UploadPointsRequest {
    #[validate(length(min = 1, max = 100), nested)]
    pub points: Vec<PointUpload>,
}

#[derive(Deserialize, Serialize, Validate)]
pub struct PointUpload {
    pub seq: u32,
    pub recorded_at: DateTime<Utc>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    pub elevation_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub accuracy_m: Option<f64>,
}

#[derive(Serialize)]
pub struct UploadPointsResponse {
    pub saved: u32,
    pub skipped: u32,
}

/// Run representation returned by every run endpoint.
#[derive(Serialize)]
pub struct RunResponse {
    pub id: String,
    pub user_id: String,
    pub course_id: Option<String>,
    pub mode: RunMode,
    pub status: RunStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_s: Option<i64>,
    pub distance_m: Option<i64>,
    pub avg_pace_s_per_km: Option<i64>,
    pub elevation_gain_m: Option<f64>,
    pub poly_simplified: Option<String>,
    pub geojson_summary: Option<serde_json::Value>,
    pub off_route_alerts: u32,
}

impl From<Run> for RunResponse {
    fn from(run: Run) -> Self {
        Self {
            id: run.id,
            user_id: run.user_id,
            course_id: run.course_id,
            mode: run.mode,
            status: run.status,
            started_at: format_utc_rfc3339(run.started_at),
            completed_at: run.completed_at.map(format_utc_rfc3339),
            duration_s: run.duration_s,
            distance_m: run.distance_m,
            avg_pace_s_per_km: run.avg_pace_s_per_km,
            elevation_gain_m: run.elevation_gain_m,
            poly_simplified: run.poly_simplified,
            geojson_summary: run.geojson_summary,
            off_route_alerts: run.off_route_alerts,
        }
    }
}

#[derive(Serialize)]
pub struct RunListResponse {
    pub runs: Vec<RunResponse>,
}

// ─── Handlers ────────────────────────────────────────────────

/// Start a new run.
async fn create_run(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateRunRequest>,
) -> Result<Json<RunResponse>> {
    let run = state
        .run_service
        .create_run(&user.user_id, payload.mode, payload.course_id)
        .await?;
    Ok(Json(run.into()))
}

/// Upload a batch of GPS points to an in-progress run.
async fn upload_points(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(run_id): Path<String>,
    Json(payload): Json<UploadPointsRequest>,
) -> Result<Json<UploadPointsResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let points: Vec<NewPoint> = payload
        .points
        .iter()
        .map(|p| NewPoint {
            seq: p.seq,
            recorded_at: p.recorded_at,
            lat: p.lat,
            lng: p.lng,
            elevation_m: p.elevation_m,
            speed_mps: p.speed_mps,
            bearing_deg: p.bearing_deg,
            accuracy_m: p.accuracy_m,
        })
        .collect();

    let outcome = state
        .run_service
        .upload_points(&run_id, &user.user_id, &points)
        .await?;

    Ok(Json(UploadPointsResponse {
        saved: outcome.saved,
        skipped: outcome.skipped,
    }))
}

/// Complete an in-progress run and derive its route and metrics.
async fn complete_run(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(run_id): Path<String>,
) -> Result<Json<RunResponse>> {
    let run = state
        .run_service
        .complete_run(&run_id, &user.user_id)
        .await?;
    Ok(Json(run.into()))
}

/// Cancel an in-progress run.
async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(run_id): Path<String>,
) -> Result<Json<RunResponse>> {
    let run = state
        .run_service
        .cancel_run(&run_id, &user.user_id)
        .await?;
    Ok(Json(run.into()))
}

/// Fetch a single run.
async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunResponse>> {
    let run = state.run_service.get_run(&run_id).await?;
    Ok(Json(run.into()))
}

/// List the caller's runs, most recent start first.
async fn list_my_runs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RunListResponse>> {
    let runs = state.run_service.list_runs(&user.user_id).await?;
    Ok(Json(RunListResponse {
        runs: runs.into_iter().map(RunResponse::from).collect(),
    }))
}
