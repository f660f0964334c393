// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point ingestion tests: idempotent batch admission under retransmission.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;

fn point(seq: u32) -> serde_json::Value {
    json!({
        "seq": seq,
        "recorded_at": "2026-05-01T06:00:00Z",
        "lat": 37.5665 + seq as f64 * 0.0005,
        "lng": 126.9780
    })
}

async fn create_free_run(app: &axum::Router, token: &str) -> String {
    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/runs",
            token,
            json!({"mode": "free"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    common::body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn upload(
    app: &axum::Router,
    token: &str,
    run_id: &str,
    points: Vec<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            &format!("/api/runs/{}/points", run_id),
            token,
            json!({ "points": points }),
        ))
        .await
        .unwrap();
    let status = response.status();
    (status, common::body_json(response).await)
}

#[tokio::test]
async fn test_upload_batch_saved() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    let (status, body) = upload(&app, &token, &run_id, (0..10).map(point).collect()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved"], 10);
    assert_eq!(body["skipped"], 0);
}

#[tokio::test]
async fn test_duplicate_point_skipped_across_batches() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    let (_, first) = upload(&app, &token, &run_id, vec![point(0)]).await;
    assert_eq!(first["saved"], 1);
    assert_eq!(first["skipped"], 0);

    let (status, second) = upload(&app, &token, &run_id, vec![point(0)]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["saved"], 0);
    assert_eq!(second["skipped"], 1);

    // Exactly one stored point for the key
    let points = state.db.points_for_run(&run_id).await.unwrap();
    assert_eq!(points.len(), 1);
}

#[tokio::test]
async fn test_overlapping_retry_batch() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    upload(&app, &token, &run_id, (0..5).map(point).collect()).await;
    // Retry overlaps seqs 3-4, extends with 5-7
    let (_, body) = upload(&app, &token, &run_id, (3..8).map(point).collect()).await;

    assert_eq!(body["saved"], 3);
    assert_eq!(body["skipped"], 2);

    let points = state.db.points_for_run(&run_id).await.unwrap();
    assert_eq!(points.len(), 8);
}

#[tokio::test]
async fn test_batch_of_101_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    let (status, body) = upload(&app, &token, &run_id, (0..101).map(point).collect()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    // Zero points admitted
    let points = state.db.points_for_run(&run_id).await.unwrap();
    assert!(points.is_empty());
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    let (status, _) = upload(&app, &token, &run_id, vec![]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_coordinates_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    let bad = json!({
        "seq": 0,
        "recorded_at": "2026-05-01T06:00:00Z",
        "lat": 95.0,
        "lng": 126.9780
    });
    let (status, _) = upload(&app, &token, &run_id, vec![bad]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_to_completed_run_conflicts() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    let complete = app
        .clone()
        .oneshot(common::empty_request(
            "PATCH",
            &format!("/api/runs/{}/complete", run_id),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(complete.status(), StatusCode::OK);

    let (status, body) = upload(&app, &token, &run_id, vec![point(0)]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "state_conflict");

    // No points stored
    let points = state.db.points_for_run(&run_id).await.unwrap();
    assert!(points.is_empty());
}

#[tokio::test]
async fn test_upload_to_foreign_run_not_found() {
    let (app, state) = common::create_test_app();
    let owner_token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let other_token = common::create_test_jwt("user-2", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &owner_token).await;

    let (status, _) = upload(&app, &other_token, &run_id, vec![point(0)]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_to_unknown_run_not_found() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let (status, _) = upload(
        &app,
        &token,
        "00000000-0000-0000-0000-000000000000",
        vec![point(0)],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
