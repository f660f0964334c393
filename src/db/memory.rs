// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process run store backed by dashmap.
//!
//! Concurrency contract matches the Firestore backend: point inserts are
//! atomic per (run_id, seq) key, and run transitions hold the record's
//! entry lock across the check-then-write, so exactly one of two racing
//! transitions commits.

use crate::db::{PointInsert, Transition};
use crate::models::{Run, RunCompletion, RunPoint};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{btree_map, BTreeMap};
use std::sync::Arc;

/// In-memory store for tests and local development.
#[derive(Clone, Default)]
pub struct MemoryStore {
    runs: Arc<DashMap<String, Run>>,
    /// Points per run, keyed by sequence number. The BTreeMap keeps reads
    /// in ascending seq order for free.
    points: Arc<DashMap<String, BTreeMap<u32, RunPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_run(&self, run: &Run) -> Result<(), crate::error::AppError> {
        self.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Option<Run> {
        self.runs.get(run_id).map(|r| r.clone())
    }

    pub fn list_runs_for_user(&self, user_id: &str) -> Vec<Run> {
        let mut runs: Vec<Run> = self
            .runs
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }

    pub fn insert_point(&self, point: &RunPoint) -> PointInsert {
        let mut run_points = self.points.entry(point.run_id.clone()).or_default();
        match run_points.entry(point.seq) {
            btree_map::Entry::Occupied(_) => PointInsert::Skipped,
            btree_map::Entry::Vacant(slot) => {
                slot.insert(point.clone());
                PointInsert::Saved
            }
        }
    }

    pub fn points_for_run(&self, run_id: &str) -> Vec<RunPoint> {
        self.points
            .get(run_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn complete_run(&self, run_id: &str, completion: &RunCompletion) -> Transition {
        match self.runs.get_mut(run_id) {
            Some(mut run) => {
                if run.apply_completion(completion) {
                    Transition::Committed(run.clone())
                } else {
                    Transition::Conflict
                }
            }
            None => Transition::NotFound,
        }
    }

    pub fn cancel_run(&self, run_id: &str, cancelled_at: DateTime<Utc>) -> Transition {
        match self.runs.get_mut(run_id) {
            Some(mut run) => {
                if run.apply_cancellation(cancelled_at) {
                    Transition::Committed(run.clone())
                } else {
                    Transition::Conflict
                }
            }
            None => Transition::NotFound,
        }
    }
}
