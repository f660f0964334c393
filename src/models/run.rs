// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Run record and its lifecycle state machine.
//!
//! `in_progress` is the initial state; `completed` and `cancelled` are
//! terminal. Status is written only through [`Run::apply_completion`] and
//! [`Run::apply_cancellation`], so an illegal transition cannot be expressed
//! anywhere else in the codebase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Running a published course; requires a course id at creation.
    Course,
    /// Free run without a reference course.
    Free,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Cancelled,
}

/// Stored run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run ID (UUID v4, also used as document ID)
    pub id: String,
    /// Owning user ID
    pub user_id: String,
    /// Course being run, when mode is `course`
    pub course_id: Option<String>,
    pub mode: RunMode,
    pub status: RunStatus,
    /// Set at creation, immutable
    pub started_at: DateTime<Utc>,
    /// Set exactly once, on completion
    pub completed_at: Option<DateTime<Utc>>,
    /// Whole seconds between started_at and completed_at
    pub duration_s: Option<i64>,
    /// Length of the simplified route, nearest meter
    pub distance_m: Option<i64>,
    /// floor(duration_s / distance_km); null for a zero-distance run
    pub avg_pace_s_per_km: Option<i64>,
    /// Sum of positive elevation deltas over the raw points; null when the
    /// run has no elevation samples at all
    pub elevation_gain_m: Option<f64>,
    /// Simplified route as an encoded polyline (precision 5)
    pub poly_simplified: Option<String>,
    /// GeoJSON LineString of the simplified route
    pub geojson_summary: Option<serde_json::Value>,
    /// Incremented by ingestion-side alerting; not written by this service
    #[serde(default)]
    pub off_route_alerts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived fields written together with the transition to `completed`.
///
/// Computed fully before the conditional status update so that a failed
/// computation never leaves a half-completed run behind.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub completed_at: DateTime<Utc>,
    pub duration_s: i64,
    pub distance_m: i64,
    pub avg_pace_s_per_km: Option<i64>,
    pub elevation_gain_m: Option<f64>,
    pub poly_simplified: String,
    pub geojson_summary: serde_json::Value,
}

impl Run {
    /// Allocate a new in-progress run.
    pub fn new(user_id: &str, mode: RunMode, course_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            course_id,
            mode,
            status: RunStatus::InProgress,
            started_at: now,
            completed_at: None,
            duration_s: None,
            distance_m: None,
            avg_pace_s_per_km: None,
            elevation_gain_m: None,
            poly_simplified: None,
            geojson_summary: None,
            off_route_alerts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Cancelled)
    }

    /// Transition to `completed`, writing all derived fields.
    ///
    /// Returns `false` without mutating anything when the run is not
    /// in_progress. Callers must hold exclusive access to the record
    /// (entry lock or storage transaction) for the check to be atomic.
    pub fn apply_completion(&mut self, completion: &RunCompletion) -> bool {
        if self.status != RunStatus::InProgress {
            return false;
        }
        self.status = RunStatus::Completed;
        self.completed_at = Some(completion.completed_at);
        self.duration_s = Some(completion.duration_s);
        self.distance_m = Some(completion.distance_m);
        self.avg_pace_s_per_km = completion.avg_pace_s_per_km;
        self.elevation_gain_m = completion.elevation_gain_m;
        self.poly_simplified = Some(completion.poly_simplified.clone());
        self.geojson_summary = Some(completion.geojson_summary.clone());
        self.updated_at = completion.completed_at;
        true
    }

    /// Transition to `cancelled`. Derived fields stay null.
    ///
    /// Same atomicity requirement as [`Run::apply_completion`].
    pub fn apply_cancellation(&mut self, cancelled_at: DateTime<Utc>) -> bool {
        if self.status != RunStatus::InProgress {
            return false;
        }
        self.status = RunStatus::Cancelled;
        self.updated_at = cancelled_at;
        true
    }
}
