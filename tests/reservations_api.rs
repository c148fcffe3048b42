//! End-to-end tests for the reservation endpoints, run through the full
//! router against the in-memory ledger.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{build_test_app, send, seat, token_for, SEANCE};

// ---------------------------------------------------------------------------
// Seance view
// ---------------------------------------------------------------------------

#[tokio::test]
async fn seance_view_lists_full_grid() {
    let (app, _) = build_test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/seances/1", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"], 16 * 23);
    assert_eq!(body["available"], 16 * 23);
    assert_eq!(body["seats"][0]["row"], "A");
    assert_eq!(body["seats"][0]["number"], 1);
    assert_eq!(body["seats"][0]["tier"], "standard");
}

#[tokio::test]
async fn unknown_seance_returns_404() {
    let (app, _) = build_test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/seances/42", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SEANCE_NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_requires_token() {
    let (app, _) = build_test_app().await;
    let body = json!({ "seanceId": SEANCE, "seats": [seat("A", 1)] });

    let (status, json) = send(&app, Method::POST, "/api/seances/reserve", None, Some(body)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn create_reserves_and_prices_seats() {
    let (app, state) = build_test_app().await;
    let token = token_for(&state, "alice");
    let body = json!({ "seanceId": SEANCE, "seats": [seat("A", 1), seat("M", 5)] });

    let (status, json) = send(&app, Method::POST, "/api/seances/reserve", Some(&token), Some(body)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["seanceId"], SEANCE);
    assert_eq!(json["total"], 500 + 800);
    assert_eq!(json["seats"].as_array().unwrap().len(), 2);

    let (_, view) = send(&app, Method::GET, "/api/seances/1", None, None).await;
    assert_eq!(view["available"], 16 * 23 - 2);
}

#[tokio::test]
async fn conflicting_create_returns_taken_seats_and_seat_map() {
    let (app, state) = build_test_app().await;
    let alice = token_for(&state, "alice");
    let bob = token_for(&state, "bob");

    let first = json!({ "seanceId": SEANCE, "seats": [seat("B", 2), seat("B", 3)] });
    let (status, _) = send(&app, Method::POST, "/api/seances/reserve", Some(&alice), Some(first)).await;
    assert_eq!(status, StatusCode::CREATED);

    let second = json!({ "seanceId": SEANCE, "seats": [seat("B", 3), seat("B", 4)] });
    let (status, json) = send(&app, Method::POST, "/api/seances/reserve", Some(&bob), Some(second)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "SEAT_UNAVAILABLE");
    assert_eq!(json["seats"], json!([{ "row": "B", "number": 3 }]));

    let seat_map = json["seatMap"].as_array().unwrap();
    assert_eq!(seat_map.len(), 16 * 23);
    let b4 = seat_map
        .iter()
        .find(|s| s["row"] == "B" && s["number"] == 4)
        .unwrap();
    assert_eq!(b4["available"], true);
}

#[tokio::test]
async fn invalid_seats_are_rejected() {
    let (app, state) = build_test_app().await;
    let token = token_for(&state, "alice");

    for seats in [
        json!([]),
        json!([seat("A", 0)]),
        json!([seat("AB", 1)]),
        json!([seat("A", 24)]),
        json!([seat("A", 1), seat("A", 1)]),
    ] {
        let body = json!({ "seanceId": SEANCE, "seats": seats });
        let (status, json) = send(&app, Method::POST, "/api/seances/reserve", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "seats {}", seats);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn malformed_seat_bodies_are_validation_errors() {
    let (app, state) = build_test_app().await;
    let token = token_for(&state, "alice");

    for seats in [
        json!([{ "row": "A" }]),
        json!([{ "row": "A", "number": "1" }]),
        json!([{ "row": 1, "number": 1 }]),
        json!("A1"),
    ] {
        let body = json!({ "seanceId": SEANCE, "seats": seats });
        let (status, json) = send(&app, Method::POST, "/api/seances/reserve", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "seats {}", seats);
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json["error"].is_string());
    }

    let body = json!({ "newSeats": [{ "row": "A" }] });
    let uri = format!("/api/seances/reserve/{}", uuid::Uuid::new_v4());
    let (status, json) = send(&app, Method::PUT, &uri, Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (_, view) = send(&app, Method::GET, "/api/seances/1", None, None).await;
    assert_eq!(view["available"], 16 * 23);
}

#[tokio::test]
async fn malformed_ids_in_path_are_validation_errors() {
    let (app, state) = build_test_app().await;
    let token = token_for(&state, "alice");

    let (status, json) = send(&app, Method::DELETE, "/api/user/cancel/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let body = json!({ "newSeats": [seat("A", 1)] });
    let (status, json) = send(&app, Method::PUT, "/api/seances/reserve/42", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (status, json) = send(&app, Method::GET, "/api/seances/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Modify
// ---------------------------------------------------------------------------

#[tokio::test]
async fn modify_moves_reservation() {
    let (app, state) = build_test_app().await;
    let token = token_for(&state, "alice");

    let body = json!({ "seanceId": SEANCE, "seats": [seat("C", 1), seat("C", 2)] });
    let (_, created) = send(&app, Method::POST, "/api/seances/reserve", Some(&token), Some(body)).await;
    let id = created["reservationId"].as_str().unwrap().to_string();

    let body = json!({ "newSeats": [seat("C", 2), seat("C", 3)] });
    let uri = format!("/api/seances/reserve/{}", id);
    let (status, json) = send(&app, Method::PUT, &uri, Some(&token), Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["released"], json!([{ "row": "C", "number": 1 }]));
    assert_eq!(json["claimed"], json!([{ "row": "C", "number": 3 }]));
    assert_eq!(json["total"], 1000);
}

#[tokio::test]
async fn modify_onto_taken_seat_keeps_original() {
    let (app, state) = build_test_app().await;
    let alice = token_for(&state, "alice");
    let bob = token_for(&state, "bob");

    let body = json!({ "seanceId": SEANCE, "seats": [seat("D", 1)] });
    let (_, created) = send(&app, Method::POST, "/api/seances/reserve", Some(&alice), Some(body)).await;
    let id = created["reservationId"].as_str().unwrap().to_string();

    let body = json!({ "seanceId": SEANCE, "seats": [seat("D", 2)] });
    send(&app, Method::POST, "/api/seances/reserve", Some(&bob), Some(body)).await;

    let body = json!({ "newSeats": [seat("D", 2)] });
    let uri = format!("/api/seances/reserve/{}", id);
    let (status, json) = send(&app, Method::PUT, &uri, Some(&alice), Some(body)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["seatMap"].is_array());

    let (_, mine) = send(&app, Method::GET, "/api/user/my-reservations", Some(&alice), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["row"], "D");
    assert_eq!(mine[0]["seat"], 1);
}

#[tokio::test]
async fn modify_by_other_user_is_forbidden() {
    let (app, state) = build_test_app().await;
    let alice = token_for(&state, "alice");
    let mallory = token_for(&state, "mallory");

    let body = json!({ "seanceId": SEANCE, "seats": [seat("E", 7)] });
    let (_, created) = send(&app, Method::POST, "/api/seances/reserve", Some(&alice), Some(body)).await;
    let uri = format!("/api/seances/reserve/{}", created["reservationId"].as_str().unwrap());

    let body = json!({ "newSeats": [seat("E", 8)] });
    let (status, json) = send(&app, Method::PUT, &uri, Some(&mallory), Some(body)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

// ---------------------------------------------------------------------------
// Cancel and listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_releases_seats() {
    let (app, state) = build_test_app().await;
    let token = token_for(&state, "alice");

    let body = json!({ "seanceId": SEANCE, "seats": [seat("F", 1), seat("F", 2)] });
    let (_, created) = send(&app, Method::POST, "/api/seances/reserve", Some(&token), Some(body)).await;
    let uri = format!("/api/user/cancel/{}", created["reservationId"].as_str().unwrap());

    let (status, json) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["releasedSeats"].as_array().unwrap().len(), 2);

    let (_, view) = send(&app, Method::GET, "/api/seances/1", None, None).await;
    assert_eq!(view["available"], 16 * 23);

    let (status, json) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_STATE");
}

#[tokio::test]
async fn cancel_unknown_and_foreign_reservations() {
    let (app, state) = build_test_app().await;
    let alice = token_for(&state, "alice");
    let bob = token_for(&state, "bob");

    let uri = format!("/api/user/cancel/{}", uuid::Uuid::new_v4());
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = json!({ "seanceId": SEANCE, "seats": [seat("G", 1)] });
    let (_, created) = send(&app, Method::POST, "/api/seances/reserve", Some(&alice), Some(body)).await;
    let uri = format!("/api/user/cancel/{}", created["reservationId"].as_str().unwrap());
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn my_reservations_lists_one_entry_per_seat() {
    let (app, state) = build_test_app().await;
    let alice = token_for(&state, "alice");
    let bob = token_for(&state, "bob");

    let body = json!({ "seanceId": SEANCE, "seats": [seat("H", 1), seat("N", 1)] });
    send(&app, Method::POST, "/api/seances/reserve", Some(&alice), Some(body)).await;
    let body = json!({ "seanceId": SEANCE, "seats": [seat("H", 2)] });
    send(&app, Method::POST, "/api/seances/reserve", Some(&bob), Some(body)).await;

    let (status, mine) = send(&app, Method::GET, "/api/user/my-reservations", Some(&alice), None).await;

    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|s| s["film"] == "Solaris"));
    let vip = mine.iter().find(|s| s["row"] == "N").unwrap();
    assert_eq!(vip["tier"], "vip");
    assert_eq!(vip["price"], 800);
}

#[tokio::test]
async fn audit_reports_consistent_state() {
    let (app, state) = build_test_app().await;
    let token = token_for(&state, "alice");
    let body = json!({ "seanceId": SEANCE, "seats": [seat("P", 23)] });
    send(&app, Method::POST, "/api/seances/reserve", Some(&token), Some(body)).await;

    let (status, json) = send(&app, Method::GET, "/api/admin/seances/1/audit", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["activeReservations"], 1);
    assert_eq!(json["orphanedSeats"], json!([]));
    assert_eq!(json["unheldSeats"], json!([]));
}
