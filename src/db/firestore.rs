// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed run store.
//!
//! Key mapping:
//! - `runs/{run_id}` holds the run record
//! - `run_points/{run_id}_{seq}` holds one GPS sample; the document ID
//!   encodes the compound unique key, so a duplicate upload fails the
//!   create and is reported as a skip
//!
//! Run transitions go through a Firestore transaction that re-reads the
//! run, checks the in_progress precondition, and writes the terminal
//! record as a single document update.

use crate::db::{collections, PointInsert, Transition};
use crate::error::AppError;
use crate::models::{Run, RunCompletion, RunPoint};
use chrono::{DateTime, Utc};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── Run Operations ──────────────────────────────────────────

    /// Persist a freshly created run.
    pub async fn insert_run(&self, run: &Run) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .insert()
            .into(collections::RUNS)
            .document_id(&run.id)
            .object(run)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a run by ID.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<Run>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::RUNS)
            .obj()
            .one(run_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All runs for a user, most recent start first.
    pub async fn list_runs_for_user(&self, user_id: &str) -> Result<Vec<Run>, AppError> {
        let user_id = user_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::RUNS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([(
                "started_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Point Operations ────────────────────────────────────────

    /// Insert a point, treating an existing (run_id, seq) document as a skip.
    pub async fn insert_point(&self, point: &RunPoint) -> Result<PointInsert, AppError> {
        let doc_id = RunPoint::doc_id(&point.run_id, point.seq);

        let result: Result<(), _> = self
            .client
            .fluent()
            .insert()
            .into(collections::RUN_POINTS)
            .document_id(&doc_id)
            .object(point)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(PointInsert::Saved),
            // Document create fails with a conflict when the key exists;
            // re-delivery of the same point is a no-op by design.
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => {
                Ok(PointInsert::Skipped)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// All points for a run in ascending sequence order.
    pub async fn points_for_run(&self, run_id: &str) -> Result<Vec<RunPoint>, AppError> {
        let run_id = run_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::RUN_POINTS)
            .filter(move |q| q.for_all([q.field("run_id").eq(run_id.clone())]))
            .order_by([("seq", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Conditional Transitions ─────────────────────────────────

    /// Transition to completed only if the run is still in_progress.
    ///
    /// Status and every derived field land in one document write inside a
    /// Firestore transaction, so a concurrent transition on the same run
    /// cannot interleave with the precondition check.
    pub async fn complete_run(
        &self,
        run_id: &str,
        completion: &RunCompletion,
    ) -> Result<Transition, AppError> {
        self.transition(run_id, |run| run.apply_completion(completion))
            .await
    }

    /// Transition to cancelled only if the run is still in_progress.
    pub async fn cancel_run(
        &self,
        run_id: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Transition, AppError> {
        self.transition(run_id, |run| run.apply_cancellation(cancelled_at))
            .await
    }

    /// Shared conditional-transition plumbing.
    ///
    /// `apply` is one of the model's transition functions; it returns false
    /// when the precondition (status == in_progress) does not hold.
    async fn transition<F>(&self, run_id: &str, apply: F) -> Result<Transition, AppError>
    where
        F: FnOnce(&mut Run) -> bool,
    {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // The read must carry the transaction ID: only documents read under
        // the transaction's consistency selector are validated at commit
        // time. A plain read here would let two racing transitions both
        // commit.
        let tx_client = self
            .client
            .clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ));

        let current: Option<Run> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::RUNS)
            .obj()
            .one(run_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read run in transaction: {}", e)))?;

        let Some(mut run) = current else {
            let _ = transaction.rollback().await;
            return Ok(Transition::NotFound);
        };

        if !apply(&mut run) {
            let _ = transaction.rollback().await;
            return Ok(Transition::Conflict);
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::RUNS)
            .document_id(run_id)
            .object(&run)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add run to transaction: {}", e)))?;

        match transaction.commit().await {
            Ok(_) => {
                tracing::info!(run_id, status = ?run.status, "Run transition committed");
                Ok(Transition::Committed(run))
            }
            // A concurrent transition committed first and invalidated our
            // read set; the run is terminal, so the caller lost the race.
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => {
                tracing::info!(run_id, "Run transition lost commit race");
                Ok(Transition::Conflict)
            }
            Err(e) => Err(AppError::Database(format!(
                "Transaction commit failed: {}",
                e
            ))),
        }
    }
}
