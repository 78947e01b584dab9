//! REST API integration tests for labslot-api.
//!
//! Every test spawns an in-memory server seeded with resources R1 and R2.

mod common;

use std::time::Duration;

use serde_json::{Value, json};

const T10: &str = "2025-06-02T10:00:00Z";
const T1030: &str = "2025-06-02T10:30:00Z";
const T11: &str = "2025-06-02T11:00:00Z";
const T12: &str = "2025-06-02T12:00:00Z";

async fn reserve(
    server: &common::TestServer,
    resource_id: &str,
    start: &str,
    minutes: i64,
) -> reqwest::Response {
    server
        .post_json(
            "/reservations",
            &json!({
                "resource_id": resource_id,
                "start_time": start,
                "duration_minutes": minutes,
                "description": "integration test"
            }),
        )
        .await
}

// =============================================================================
// Version Endpoint
// =============================================================================

#[tokio::test]
async fn test_get_version() {
    let server = common::TestServer::spawn().await;

    let response = server.get("/version").await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(!body["version"].as_str().unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_openapi_document() {
    let server = common::TestServer::spawn().await;

    let response = server
        .client
        .get(format!("{}/api-docs/openapi.json", server.root_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(body["paths"]["/v1/reservations"].is_object());
    assert!(body["paths"]["/v1/availability/{resource_id}"].is_object());

    server.shutdown().await;
}

// =============================================================================
// Resource Endpoints
// =============================================================================

#[tokio::test]
async fn test_list_resources() {
    let server = common::TestServer::spawn().await;

    let response = server.get("/resources").await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let resources = body.as_array().unwrap();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0]["id"], "R1");
    assert_eq!(resources[0]["ip_address"], "10.0.0.1");
    assert_eq!(resources[1]["id"], "R2");

    server.shutdown().await;
}

#[tokio::test]
async fn test_get_resource_not_found() {
    let server = common::TestServer::spawn().await;

    let response = server.get("/resources/R1").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Router 1");

    let response = server.get("/resources/R99").await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 404);

    server.shutdown().await;
}

#[tokio::test]
async fn test_register_and_remove_resource() {
    let server = common::TestServer::spawn().await;

    let response = server
        .post_json("/resources", &json!({"id": "R3", "name": "Firewall 3"}))
        .await;
    assert_eq!(response.status(), 201);

    // Duplicate id
    let response = server
        .post_json("/resources", &json!({"id": "R3", "name": "again"}))
        .await;
    assert_eq!(response.status(), 409);

    // A resource with reservations cannot be removed
    assert_eq!(reserve(&server, "R3", T10, 30).await.status(), 201);
    let response = server.delete("/resources/R3").await;
    assert_eq!(response.status(), 409);

    let response = server
        .post_json("/resources", &json!({"name": "Generated"}))
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let generated = body["id"].as_str().unwrap().to_string();
    assert!(!generated.is_empty());

    let response = server.delete(&format!("/resources/{}", generated)).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["removed"].as_bool().unwrap());

    let response = server.delete(&format!("/resources/{}", generated)).await;
    assert_eq!(response.status(), 404);

    server.shutdown().await;
}

#[tokio::test]
async fn test_register_resource_malformed_body() {
    let server = common::TestServer::spawn().await;

    let response = server
        .post_json("/resources", &json!({"id": "R3"}))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 400);

    let response = server.get("/resources/R3").await;
    assert_eq!(response.status(), 404);

    server.shutdown().await;
}

// =============================================================================
// Reservation Endpoints
// =============================================================================

#[tokio::test]
async fn test_create_reservation() {
    let server = common::TestServer::spawn().await;

    let response = reserve(&server, "R1", T10, 60).await;
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.unwrap();
    assert!(body["id"].is_u64());
    assert_eq!(body["resource_id"], "R1");
    assert_eq!(body["start_time"], T10);
    assert_eq!(body["end_time"], T11);
    assert_eq!(body["description"], "integration test");
    assert!(body["created_at"].is_string());

    let id = body["id"].as_u64().unwrap();
    let response = server.get(&format!("/reservations/{}", id)).await;
    assert_eq!(response.status(), 200);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched, body);

    server.shutdown().await;
}

#[tokio::test]
async fn test_duration_rounds_up_to_slot() {
    let server = common::TestServer::spawn().await;

    let response = reserve(&server, "R1", T10, 25).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["end_time"], T1030);

    let response = reserve(&server, "R2", T10, 31).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["end_time"], T11);

    server.shutdown().await;
}

#[tokio::test]
async fn test_create_reservation_rejects_bad_input() {
    let server = common::TestServer::spawn().await;

    // Misaligned start
    let response = reserve(&server, "R1", "2025-06-02T10:15:00Z", 30).await;
    assert_eq!(response.status(), 400);

    // Non-positive duration
    let response = reserve(&server, "R1", T10, 0).await;
    assert_eq!(response.status(), 400);

    // Description too long
    let response = server
        .post_json(
            "/reservations",
            &json!({
                "resource_id": "R1",
                "start_time": T10,
                "duration_minutes": 30,
                "description": "x".repeat(201)
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Malformed body
    let response = server
        .post_json("/reservations", &json!({"resource_id": "R1"}))
        .await;
    assert_eq!(response.status(), 400);

    // Unknown resource
    let response = reserve(&server, "R99", T10, 30).await;
    assert_eq!(response.status(), 404);

    let response = server.get("/reservations").await;
    let body: Value = response.json().await.unwrap();
    assert!(body.as_array().unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_overlapping_reservation_conflicts() {
    let server = common::TestServer::spawn().await;

    assert_eq!(reserve(&server, "R1", T10, 60).await.status(), 201);

    // Overlaps the second half
    let response = reserve(&server, "R1", T1030, 60).await;
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 409);

    // Adjacent intervals do not overlap
    assert_eq!(reserve(&server, "R1", T11, 30).await.status(), 201);

    // Same time on another resource is fine
    assert_eq!(reserve(&server, "R2", T10, 60).await.status(), 201);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_one_wins() {
    let server = common::TestServer::spawn().await;
    let url = format!("{}/reservations", server.base_url());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = server.client.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({
                    "resource_id": "R1",
                    "start_time": T10,
                    "duration_minutes": 60
                }))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap().as_u16() {
            201 => created += 1,
            409 => conflicts += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);

    server.shutdown().await;
}

#[tokio::test]
async fn test_cancel_reservation() {
    let server = common::TestServer::spawn().await;

    let response = reserve(&server, "R1", T10, 30).await;
    let body: Value = response.json().await.unwrap();
    let id = body["id"].as_u64().unwrap();

    let response = server.delete(&format!("/reservations/{}", id)).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Reservation cancelled successfully");
    assert_eq!(body["reservation"]["id"], id);

    let response = server.get(&format!("/reservations/{}", id)).await;
    assert_eq!(response.status(), 404);

    let response = server.delete(&format!("/reservations/{}", id)).await;
    assert_eq!(response.status(), 404);

    // The slot can be booked again
    assert_eq!(reserve(&server, "R1", T10, 30).await.status(), 201);

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_resource_reported_before_input_errors() {
    let server = common::TestServer::spawn().await;

    let response = reserve(&server, "R99", "2025-06-02T10:15:00Z", 0).await;
    assert_eq!(response.status(), 404);

    server.shutdown().await;
}

#[tokio::test]
async fn test_request_id_replay_after_cancel() {
    let server = common::TestServer::spawn().await;
    let request = json!({
        "resource_id": "R1",
        "start_time": T10,
        "duration_minutes": 30,
        "request_id": "booking-form-1"
    });

    let response = server.post_json("/reservations", &request).await;
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();

    // A retry while the reservation exists returns the same reservation
    let response = server.post_json("/reservations", &request).await;
    assert_eq!(response.status(), 201);
    let retried: Value = response.json().await.unwrap();
    assert_eq!(retried["id"], created["id"]);

    let id = created["id"].as_u64().unwrap();
    assert_eq!(
        server.delete(&format!("/reservations/{}", id)).await.status(),
        200
    );

    let response = server.post_json("/reservations", &request).await;
    assert_eq!(response.status(), 409);

    let response = server.get("/reservations").await;
    let body: Value = response.json().await.unwrap();
    assert!(body.as_array().unwrap().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_list_reservations_filters() {
    let server = common::TestServer::spawn().await;

    assert_eq!(reserve(&server, "R2", T11, 30).await.status(), 201);
    assert_eq!(reserve(&server, "R1", T10, 30).await.status(), 201);
    assert_eq!(reserve(&server, "R1", T12, 30).await.status(), 201);

    let response = server.get("/reservations").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let starts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["start_time"].as_str().unwrap())
        .collect();
    assert_eq!(starts, vec![T10, T11, T12]);

    let response = server
        .get(&format!("/reservations?start={}&end={}", T1030, T12))
        .await;
    let body: Value = response.json().await.unwrap();
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["resource_id"], "R2");

    let response = server.get("/reservations?resource_id=R1").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);

    let response = server
        .get(&format!("/reservations?start={}&end={}", T12, T10))
        .await;
    assert_eq!(response.status(), 400);

    let response = server.get("/reservations?resource_id=R99").await;
    assert_eq!(response.status(), 404);

    server.shutdown().await;
}

// =============================================================================
// Availability Endpoints
// =============================================================================

#[tokio::test]
async fn test_range_availability_boundaries() {
    let server = common::TestServer::spawn().await;

    let response = reserve(&server, "R1", T1030, 30).await;
    let reservation: Value = response.json().await.unwrap();

    let response = server
        .get(&format!("/availability/R1?start={}&end={}", T10, T12))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["resource_id"], "R1");

    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 4);
    let available: Vec<bool> = slots
        .iter()
        .map(|s| s["available"].as_bool().unwrap())
        .collect();
    // 10:30 is the start (taken), 11:00 is the exclusive end (free)
    assert_eq!(available, vec![true, false, true, true]);
    assert_eq!(slots[1]["reservation_id"], reservation["id"]);

    let reservations = body["reservations"].as_array().unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0]["id"], reservation["id"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_availability_after_cancel() {
    let server = common::TestServer::spawn().await;

    let response = reserve(&server, "R1", T10, 30).await;
    let body: Value = response.json().await.unwrap();
    let id = body["id"].as_u64().unwrap();

    let grid = json!({"resource_ids": ["R1"], "slots": [T10]});

    let response = server.post_json("/availability", &grid).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["resources"][0]["slots"][0]["available"], false);

    assert_eq!(
        server.delete(&format!("/reservations/{}", id)).await.status(),
        200
    );

    let response = server.post_json("/availability", &grid).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["resources"][0]["slots"][0]["available"], true);

    server.shutdown().await;
}

#[tokio::test]
async fn test_availability_grid() {
    let server = common::TestServer::spawn().await;

    assert_eq!(reserve(&server, "R2", T10, 60).await.status(), 201);

    let response = server
        .post_json(
            "/availability",
            &json!({"resource_ids": ["R1", "R2"], "slots": [T10, T1030, T11]}),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let rows = body["resources"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["resource_id"], "R1");
    assert!(
        rows[0]["slots"]
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["available"] == true)
    );
    let r2: Vec<bool> = rows[1]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["available"].as_bool().unwrap())
        .collect();
    assert_eq!(r2, vec![false, false, true]);

    // Misaligned slot
    let response = server
        .post_json(
            "/availability",
            &json!({"resource_ids": ["R1"], "slots": ["2025-06-02T10:10:00Z"]}),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Unknown resource
    let response = server
        .post_json(
            "/availability",
            &json!({"resource_ids": ["R99"], "slots": [T10]}),
        )
        .await;
    assert_eq!(response.status(), 404);

    server.shutdown().await;
}

#[tokio::test]
async fn test_availability_grid_limits() {
    let server = common::TestServer::spawn().await;

    // Repeated resource ids
    let response = server
        .post_json(
            "/availability",
            &json!({"resource_ids": ["R1", "R1"], "slots": [T10]}),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Too many resource ids
    let ids: Vec<String> = (0..1000).map(|i| format!("X{}", i)).collect();
    let response = server
        .post_json("/availability", &json!({"resource_ids": ids, "slots": [T10]}))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 400);

    server.shutdown().await;
}

// =============================================================================
// Live Updates
// =============================================================================

async fn next_event(response: &mut reqwest::Response) -> String {
    let mut buffer = String::new();
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .expect("timed out waiting for event")
            .unwrap()
            .expect("event stream ended");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        if buffer.contains("\n\n") {
            return buffer;
        }
    }
}

fn event_data(frame: &str) -> Value {
    let data = frame
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .expect("frame without data");
    serde_json::from_str(data.trim()).unwrap()
}

#[tokio::test]
async fn test_event_stream_reports_changes() {
    let server = common::TestServer::spawn().await;

    let mut events = server.get("/events").await;
    assert_eq!(events.status(), 200);

    let response = reserve(&server, "R1", T10, 30).await;
    let created: Value = response.json().await.unwrap();

    let frame = next_event(&mut events).await;
    assert!(frame.contains("reservation_update"));
    let data = event_data(&frame);
    assert_eq!(data["action"], "created");
    assert_eq!(data["reservation"]["id"], created["id"]);

    let id = created["id"].as_u64().unwrap();
    assert_eq!(
        server.delete(&format!("/reservations/{}", id)).await.status(),
        200
    );

    let frame = next_event(&mut events).await;
    let data = event_data(&frame);
    assert_eq!(data["action"], "cancelled");
    assert_eq!(data["reservation"]["id"], created["id"]);

    drop(events);
    server.shutdown().await;
}

#[tokio::test]
async fn test_rejected_create_emits_no_event() {
    let server = common::TestServer::spawn().await;

    assert_eq!(reserve(&server, "R1", T10, 30).await.status(), 201);

    let mut events = server.get("/events").await;
    assert_eq!(events.status(), 200);

    assert_eq!(reserve(&server, "R1", T10, 30).await.status(), 409);
    assert_eq!(reserve(&server, "R2", T11, 30).await.status(), 201);

    // The first frame is the R2 reservation, not the rejected one
    let frame = next_event(&mut events).await;
    let data = event_data(&frame);
    assert_eq!(data["reservation"]["resource_id"], "R2");

    drop(events);
    server.shutdown().await;
}
