//! Database layer: runs and run points.
//!
//! `RunDb` is the repository capability consumed by the service layer:
//! insert-if-absent keyed point writes, conditional run transitions, and
//! ordered range reads. Two backends implement it: Firestore (production)
//! and an in-process dashmap store (tests, local dev).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::config::{Config, StorageBackend};
use crate::error::AppError;
use crate::models::{Run, RunCompletion, RunPoint};
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const RUNS: &str = "runs";
    /// Points keyed by `{run_id}_{seq}` so the compound key is unique by
    /// construction.
    pub const RUN_POINTS: &str = "run_points";
}

/// Result of a single keyed point insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointInsert {
    /// The point was stored.
    Saved,
    /// A point with this (run_id, seq) already existed; nothing was written.
    Skipped,
}

/// Result of a conditional run transition.
#[derive(Debug, Clone)]
pub enum Transition {
    /// The precondition held and the terminal record was written.
    Committed(Run),
    /// The run was not in_progress at commit time; nothing was written.
    Conflict,
    /// The run no longer exists (deleted by an external actor).
    NotFound,
}

/// Storage handle for runs and points.
#[derive(Clone)]
pub struct RunDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreStore),
    Memory(MemoryStore),
}

impl RunDb {
    /// Connect to the backend selected by configuration.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let backend = match config.storage_backend {
            StorageBackend::Firestore => {
                Backend::Firestore(FirestoreStore::new(&config.gcp_project_id).await?)
            }
            StorageBackend::Memory => {
                tracing::info!("Using in-memory run store");
                Backend::Memory(MemoryStore::new())
            }
        };
        Ok(Self { backend })
    }

    /// In-memory database for tests.
    pub fn new_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryStore::new()),
        }
    }

    /// Persist a freshly created run.
    pub async fn insert_run(&self, run: &Run) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(store) => store.insert_run(run).await,
            Backend::Memory(store) => store.insert_run(run),
        }
    }

    /// Fetch a run by ID.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<Run>, AppError> {
        match &self.backend {
            Backend::Firestore(store) => store.get_run(run_id).await,
            Backend::Memory(store) => Ok(store.get_run(run_id)),
        }
    }

    /// All runs for a user, ordered by started_at descending.
    pub async fn list_runs_for_user(&self, user_id: &str) -> Result<Vec<Run>, AppError> {
        match &self.backend {
            Backend::Firestore(store) => store.list_runs_for_user(user_id).await,
            Backend::Memory(store) => Ok(store.list_runs_for_user(user_id)),
        }
    }

    /// Insert a point unless its (run_id, seq) key is already taken.
    ///
    /// A duplicate key is reported as [`PointInsert::Skipped`], never an
    /// error; any other storage failure propagates so the caller can abort
    /// the rest of the batch.
    pub async fn insert_point(&self, point: &RunPoint) -> Result<PointInsert, AppError> {
        match &self.backend {
            Backend::Firestore(store) => store.insert_point(point).await,
            Backend::Memory(store) => Ok(store.insert_point(point)),
        }
    }

    /// All points for a run, ordered by ascending sequence number.
    pub async fn points_for_run(&self, run_id: &str) -> Result<Vec<RunPoint>, AppError> {
        match &self.backend {
            Backend::Firestore(store) => store.points_for_run(run_id).await,
            Backend::Memory(store) => Ok(store.points_for_run(run_id)),
        }
    }

    /// Transition a run to completed, writing status and all derived fields
    /// as one conditional update ("only if still in_progress").
    pub async fn complete_run(
        &self,
        run_id: &str,
        completion: &RunCompletion,
    ) -> Result<Transition, AppError> {
        match &self.backend {
            Backend::Firestore(store) => store.complete_run(run_id, completion).await,
            Backend::Memory(store) => Ok(store.complete_run(run_id, completion)),
        }
    }

    /// Transition a run to cancelled, only if still in_progress.
    pub async fn cancel_run(
        &self,
        run_id: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Transition, AppError> {
        match &self.backend {
            Backend::Firestore(store) => store.cancel_run(run_id, cancelled_at).await,
            Backend::Memory(store) => Ok(store.cancel_run(run_id, cancelled_at)),
        }
    }
}
