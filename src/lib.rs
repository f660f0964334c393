// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Runtrack: GPS run tracking backend
//!
//! This crate provides the backend API for recording outdoor runs:
//! batched GPS point ingestion, the run lifecycle state machine, and the
//! route-simplification/metrics pipeline that runs at completion time.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::RunDb;
use services::RunService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: RunDb,
    pub run_service: RunService,
}
