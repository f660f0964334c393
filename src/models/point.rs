// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Raw GPS sample attached to a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored GPS point record.
///
/// `(run_id, seq)` is the unique key: the sequence number is assigned by the
/// client uploader, so a retransmitted batch maps onto the same keys and the
/// second delivery becomes a no-op at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPoint {
    /// Parent run ID
    pub run_id: String,
    /// Client-assigned sequence number. Monotonic intent, but arrival order
    /// is not guaranteed and gaps are tolerated.
    pub seq: u32,
    /// Device clock timestamp for the sample
    pub recorded_at: DateTime<Utc>,
    pub lat: f64,
    pub lng: f64,
    pub elevation_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub accuracy_m: Option<f64>,
    /// Server-assigned ingestion timestamp, for auditing only
    pub uploaded_at: DateTime<Utc>,
}

impl RunPoint {
    /// Document ID encoding the compound unique key.
    pub fn doc_id(run_id: &str, seq: u32) -> String {
        format!("{}_{}", run_id, seq)
    }
}
