// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end route and metrics tests: upload a known path, complete the
//! run, and check the simplified route and derived metrics.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;

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
    common::body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn complete(app: &axum::Router, token: &str, run_id: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(common::empty_request(
            "PATCH",
            &format!("/api/runs/{}/complete", run_id),
            token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    common::body_json(response).await
}

#[tokio::test]
async fn test_straight_line_run_metrics() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    // 10 points due north from Seoul city hall, 0.0005 deg (~55.6 m) apart,
    // strictly increasing recorded_at. Straight-line length ~500.4 m.
    let points: Vec<serde_json::Value> = (0..10)
        .map(|i| {
            json!({
                "seq": i,
                "recorded_at": format!("2026-05-01T06:00:{:02}Z", i * 5),
                "lat": 37.5665 + i as f64 * 0.0005,
                "lng": 126.9780
            })
        })
        .collect();

    let upload = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            &format!("/api/runs/{}/points", run_id),
            &token,
            json!({ "points": points }),
        ))
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::OK);

    let run = complete(&app, &token, &run_id).await;

    let distance_m = run["distance_m"].as_i64().unwrap();
    assert!(
        (495..=505).contains(&distance_m),
        "distance {} outside expected straight-line range",
        distance_m
    );

    let duration_s = run["duration_s"].as_i64().unwrap();
    let expected_pace = (duration_s as f64 * 1000.0 / distance_m as f64).floor() as i64;
    assert_eq!(run["avg_pace_s_per_km"].as_i64().unwrap(), expected_pace);

    // Collinear input collapses to its endpoints
    let encoded = run["poly_simplified"].as_str().unwrap();
    let decoded = polyline::decode_polyline(encoded, 5).expect("stored polyline should decode");
    assert!(decoded.0.len() <= 10);
    assert_eq!(decoded.0.len(), 2);
    assert!((decoded.0[0].y - 37.5665).abs() < 1e-5);
    assert!((decoded.0[1].y - 37.5665 - 9.0 * 0.0005).abs() < 1e-5);

    // No elevation samples uploaded: gain must be unknown, not zero
    assert!(run["elevation_gain_m"].is_null());

    // GeoJSON summary mirrors the simplified route
    assert_eq!(run["geojson_summary"]["type"], "LineString");
    assert_eq!(
        run["geojson_summary"]["coordinates"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_single_point_run_is_degenerate() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    let upload = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            &format!("/api/runs/{}/points", run_id),
            &token,
            json!({"points": [{
                "seq": 0,
                "recorded_at": "2026-05-01T06:00:00Z",
                "lat": 37.5665,
                "lng": 126.9780
            }]}),
        ))
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::OK);

    let run = complete(&app, &token, &run_id).await;
    assert_eq!(run["distance_m"], 0);
    assert!(run["avg_pace_s_per_km"].is_null());

    let decoded =
        polyline::decode_polyline(run["poly_simplified"].as_str().unwrap(), 5).unwrap();
    assert_eq!(decoded.0.len(), 1);
}

#[tokio::test]
async fn test_sequence_gaps_tolerated() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    // Only even seqs arrive; odd ones were lost in transit
    let points: Vec<serde_json::Value> = (0..10)
        .filter(|i| i % 2 == 0)
        .map(|i| {
            json!({
                "seq": i,
                "recorded_at": format!("2026-05-01T06:00:{:02}Z", i * 5),
                "lat": 37.5665 + i as f64 * 0.0005,
                "lng": 126.9780
            })
        })
        .collect();

    let upload = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            &format!("/api/runs/{}/points", run_id),
            &token,
            json!({ "points": points }),
        ))
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::OK);

    let run = complete(&app, &token, &run_id).await;
    // Same straight line, sparser sampling: length is unchanged
    let distance_m = run["distance_m"].as_i64().unwrap();
    assert!((440..=450).contains(&distance_m), "distance {}", distance_m);
}

#[tokio::test]
async fn test_elevation_gain_from_raw_points() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    // Climb 10 m, descend 5 m, climb 7 m: gain = 17
    let elevations = [100.0, 110.0, 105.0, 112.0];
    let points: Vec<serde_json::Value> = elevations
        .iter()
        .enumerate()
        .map(|(i, elev)| {
            json!({
                "seq": i,
                "recorded_at": format!("2026-05-01T06:00:{:02}Z", i * 10),
                "lat": 37.5665 + i as f64 * 0.0005,
                "lng": 126.9780,
                "elevation_m": elev
            })
        })
        .collect();

    let upload = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            &format!("/api/runs/{}/points", run_id),
            &token,
            json!({ "points": points }),
        ))
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::OK);

    let run = complete(&app, &token, &run_id).await;
    assert_eq!(run["elevation_gain_m"].as_f64().unwrap(), 17.0);
}

#[tokio::test]
async fn test_zigzag_route_keeps_corners() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);
    let run_id = create_free_run(&app, &token).await;

    // Alternate 0.005 deg east/west while moving north: every vertex
    // deviates far beyond the simplification tolerance.
    let points: Vec<serde_json::Value> = (0..6)
        .map(|i| {
            json!({
                "seq": i,
                "recorded_at": format!("2026-05-01T06:0{}:00Z", i),
                "lat": 37.5665 + i as f64 * 0.002,
                "lng": 126.9780 + if i % 2 == 0 { 0.0 } else { 0.005 }
            })
        })
        .collect();

    let upload = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            &format!("/api/runs/{}/points", run_id),
            &token,
            json!({ "points": points }),
        ))
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::OK);

    let run = complete(&app, &token, &run_id).await;
    let decoded =
        polyline::decode_polyline(run["poly_simplified"].as_str().unwrap(), 5).unwrap();
    assert_eq!(decoded.0.len(), 6);
}
