// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod point;
pub mod run;

pub use point::RunPoint;
pub use run::{Run, RunCompletion, RunMode, RunStatus};
