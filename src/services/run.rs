// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run lifecycle and point ingestion service.
//!
//! Owns the run state machine (create / complete / cancel), admits point
//! batches while a run is in progress, and drives the route-building and
//! metrics pipeline when a run completes.

use crate::db::{PointInsert, RunDb, Transition};
use crate::error::{AppError, Result};
use crate::models::{Run, RunCompletion, RunMode, RunPoint, RunStatus};
use crate::services::route;
use chrono::{DateTime, Utc};

/// Hard upper bound on points per upload call.
pub const MAX_BATCH_POINTS: usize = 100;

/// A point as submitted by the uploader, before the server assigns
/// its ingestion timestamp.
#[derive(Debug, Clone)]
pub struct NewPoint {
    pub seq: u32,
    pub recorded_at: DateTime<Utc>,
    pub lat: f64,
    pub lng: f64,
    pub elevation_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub accuracy_m: Option<f64>,
}

/// Outcome of a batch upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub saved: u32,
    pub skipped: u32,
}

/// Service implementing the run tracking core.
#[derive(Clone)]
pub struct RunService {
    db: RunDb,
}

impl RunService {
    pub fn new(db: RunDb) -> Self {
        Self { db }
    }

    /// Start a new run.
    ///
    /// Course mode requires a course id; free mode forbids one. A mismatch
    /// is rejected rather than silently corrected.
    pub async fn create_run(
        &self,
        user_id: &str,
        mode: RunMode,
        course_id: Option<String>,
    ) -> Result<Run> {
        match (mode, &course_id) {
            (RunMode::Course, None) => {
                return Err(AppError::BadRequest(
                    "Course mode requires courseId".to_string(),
                ))
            }
            (RunMode::Free, Some(_)) => {
                return Err(AppError::BadRequest(
                    "Free mode must not include courseId".to_string(),
                ))
            }
            _ => {}
        }

        let run = Run::new(user_id, mode, course_id);
        self.db.insert_run(&run).await?;

        tracing::info!(run_id = %run.id, user_id, mode = ?mode, "Run created");
        Ok(run)
    }

    /// Admit a batch of GPS points into an in-progress run.
    ///
    /// Each point is inserted independently and idempotently under its
    /// (run_id, seq) key; a duplicate counts as skipped. Any other storage
    /// failure aborts the remaining batch — already-saved points stay
    /// committed, and the idempotent keys make a full retry safe.
    pub async fn upload_points(
        &self,
        run_id: &str,
        caller_id: &str,
        points: &[NewPoint],
    ) -> Result<UploadOutcome> {
        if points.is_empty() || points.len() > MAX_BATCH_POINTS {
            return Err(AppError::BadRequest(format!(
                "Batch must contain between 1 and {} points",
                MAX_BATCH_POINTS
            )));
        }

        let run = self.get_owned_run(run_id, caller_id).await?;
        if run.status != RunStatus::InProgress {
            return Err(AppError::StateConflict(
                "Can only upload points to in-progress runs".to_string(),
            ));
        }

        let mut saved = 0u32;
        let mut skipped = 0u32;
        let uploaded_at = Utc::now();

        for point in points {
            let record = RunPoint {
                run_id: run_id.to_string(),
                seq: point.seq,
                recorded_at: point.recorded_at,
                lat: point.lat,
                lng: point.lng,
                elevation_m: point.elevation_m,
                speed_mps: point.speed_mps,
                bearing_deg: point.bearing_deg,
                accuracy_m: point.accuracy_m,
                uploaded_at,
            };

            match self.db.insert_point(&record).await? {
                PointInsert::Saved => saved += 1,
                PointInsert::Skipped => skipped += 1,
            }
        }

        tracing::info!(run_id, saved, skipped, "Uploaded point batch");
        Ok(UploadOutcome { saved, skipped })
    }

    /// Complete an in-progress run.
    ///
    /// Reads the run's points, builds and simplifies the route, derives the
    /// metrics, then commits status plus all derived fields as a single
    /// conditional transition. If anything in the pipeline fails the
    /// transition never happens and the run remains completable.
    pub async fn complete_run(&self, run_id: &str, caller_id: &str) -> Result<Run> {
        let run = self.get_owned_run(run_id, caller_id).await?;
        if run.status != RunStatus::InProgress {
            return Err(AppError::StateConflict("Run is not in progress".to_string()));
        }

        let completed_at = Utc::now();
        let duration_s = (completed_at - run.started_at).num_seconds().max(0);

        let points = self.db.points_for_run(run_id).await?;
        let line = route::build_polyline(&points);
        let simplified = route::simplify_route(&line, route::SIMPLIFY_TOLERANCE_DEG);

        let distance_m = route::planar_length_m(&simplified).round() as i64;
        let completion = RunCompletion {
            completed_at,
            duration_s,
            distance_m,
            avg_pace_s_per_km: route::avg_pace_s_per_km(duration_s, distance_m),
            elevation_gain_m: route::elevation_gain_m(&points),
            poly_simplified: route::encode_route(&simplified)
                .map_err(|e| AppError::Computation(e.to_string()))?,
            geojson_summary: route::geojson_summary(&simplified),
        };

        match self.db.complete_run(run_id, &completion).await? {
            Transition::Committed(run) => {
                tracing::info!(
                    run_id,
                    raw_points = points.len(),
                    route_points = simplified.0.len(),
                    distance_m,
                    duration_s,
                    "Run completed"
                );
                Ok(run)
            }
            Transition::Conflict => Err(AppError::StateConflict(
                "Run is not in progress".to_string(),
            )),
            Transition::NotFound => Err(AppError::NotFound("Run not found".to_string())),
        }
    }

    /// Cancel an in-progress run. No route or metrics computation.
    pub async fn cancel_run(&self, run_id: &str, caller_id: &str) -> Result<Run> {
        let run = self.get_owned_run(run_id, caller_id).await?;
        if run.status != RunStatus::InProgress {
            return Err(AppError::StateConflict("Run is not in progress".to_string()));
        }

        match self.db.cancel_run(run_id, Utc::now()).await? {
            Transition::Committed(run) => {
                tracing::info!(run_id, "Run cancelled");
                Ok(run)
            }
            Transition::Conflict => Err(AppError::StateConflict(
                "Run is not in progress".to_string(),
            )),
            Transition::NotFound => Err(AppError::NotFound("Run not found".to_string())),
        }
    }

    /// Fetch a run by ID. No ownership check.
    pub async fn get_run(&self, run_id: &str) -> Result<Run> {
        self.db
            .get_run(run_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Run not found".to_string()))
    }

    /// All runs for a user, most recent start first.
    pub async fn list_runs(&self, user_id: &str) -> Result<Vec<Run>> {
        self.db.list_runs_for_user(user_id).await
    }

    /// Fetch a run and verify ownership. Absence and foreign ownership are
    /// indistinguishable to the caller.
    async fn get_owned_run(&self, run_id: &str, caller_id: &str) -> Result<Run> {
        match self.db.get_run(run_id).await? {
            Some(run) if run.user_id == caller_id => Ok(run),
            _ => Err(AppError::NotFound("Run not found".to_string())),
        }
    }
}
