use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use bestroute_api::{build_app, build_router, ApiSettings, ApiState};
use bestroute_completion::{CompletionBackend, ScriptedCompletion, ScriptedReply};
use bestroute_core::{RoutingFailure, TripRequest};
use bestroute_tests::{get, json_body, post_json, TRAIN_AND_BUS};
use serde_json::json;
use tower::ServiceExt;

fn app_with(stub: &ScriptedCompletion) -> axum::Router {
    build_app(
        ApiSettings::default(),
        CompletionBackend::scripted(stub.clone()),
    )
    .expect("app should build")
}

fn limited_to_one_search() -> axum::Router {
    let settings = ApiSettings {
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max: 1,
        ..ApiSettings::default()
    };
    build_app(
        settings,
        CompletionBackend::scripted(ScriptedCompletion::always(TRAIN_AND_BUS)),
    )
    .expect("app should build")
}

fn boston_to_new_york() -> serde_json::Value {
    json!({
        "start": "Boston",
        "destination": "New York",
        "stops": [],
        "preferences": { "fastest": true }
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = app_with(&ScriptedCompletion::always(TRAIN_AND_BUS));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "scripted");
}

#[tokio::test]
async fn routes_require_api_key() {
    let app = app_with(&ScriptedCompletion::always(TRAIN_AND_BUS));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/routes")
        .header("content-type", "application/json")
        .body(Body::from(boston_to_new_york().to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn boston_to_new_york_returns_best_route_and_alternatives() {
    let stub = ScriptedCompletion::always(TRAIN_AND_BUS).recording();
    let app = app_with(&stub);

    let response = app
        .oneshot(post_json("/v1/routes", &boston_to_new_york()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await.unwrap();
    assert_eq!(body["bestRoute"]["type"], "Train");
    assert_eq!(body["alternatives"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["alternatives"][0]["type"], "Bus");

    let cards = body["cards"].as_array().unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0]["kind"], "best");
    assert_eq!(cards[0]["badges"]["is_fast"], true);
    assert_eq!(cards[0]["badges"]["is_eco"], true);
    assert_eq!(cards[1]["kind"], "alternative");

    let prompts = stub.recorded_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("\"Boston\""));
}

#[tokio::test]
async fn unparseable_reply_maps_to_bad_gateway() {
    let app = app_with(&ScriptedCompletion::always("not json at all"));

    let response = app
        .oneshot(post_json("/v1/routes", &boston_to_new_york()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = json_body(response).await.unwrap();
    assert_eq!(body["error"], "routing_failed");
    assert_eq!(
        body["message"],
        "Could not calculate routes. Please try again."
    );
}

#[tokio::test]
async fn blank_start_is_rejected_without_calling_service() {
    let stub = ScriptedCompletion::always(TRAIN_AND_BUS);
    let app = app_with(&stub);

    let response = app
        .oneshot(post_json(
            "/v1/routes",
            &json!({ "start": "   ", "destination": "New York" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await.unwrap();
    assert_eq!(body["error"], "invalid_input");
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn session_search_get_and_reset() {
    let stub = ScriptedCompletion::always(TRAIN_AND_BUS);
    let app = app_with(&stub);

    let created = app
        .clone()
        .oneshot(post_json("/v1/sessions", &json!({})))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = json_body(created).await.unwrap();
    assert_eq!(created["session"]["state"]["status"], "idle");
    let session_id = created["session"]["session_id"].as_str().unwrap().to_string();

    let searched = app
        .clone()
        .oneshot(post_json(
            &format!("/v1/sessions/{session_id}/search"),
            &boston_to_new_york(),
        ))
        .await
        .unwrap();
    assert_eq!(searched.status(), StatusCode::OK);
    let searched = json_body(searched).await.unwrap();
    assert_eq!(searched["session"]["state"]["status"], "ready");
    assert_eq!(
        searched["session"]["state"]["response"]["bestRoute"]["type"],
        "Train"
    );
    assert_eq!(searched["cards"].as_array().map(Vec::len), Some(2));

    let fetched = app
        .clone()
        .oneshot(get(&format!("/v1/sessions/{session_id}")))
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched = json_body(fetched).await.unwrap();
    assert_eq!(fetched["session"]["request_token"], 1);
    assert_eq!(fetched["session"]["last_trip"]["destination"], "New York");

    let reset = app
        .oneshot(post_json(
            &format!("/v1/sessions/{session_id}/reset"),
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);
    let reset = json_body(reset).await.unwrap();
    assert_eq!(reset["session"]["state"]["status"], "idle");
    assert_eq!(reset["session"]["request_token"], 2);
    assert!(reset["session"]["last_trip"].is_null());
    assert_eq!(reset["cards"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn failed_session_search_keeps_only_user_message() {
    let stub = ScriptedCompletion::new();
    stub.push(ScriptedReply::Fail("upstream quota exhausted".to_string()));
    let app = app_with(&stub);

    let created = app
        .clone()
        .oneshot(post_json("/v1/sessions", &json!({})))
        .await
        .unwrap();
    let created = json_body(created).await.unwrap();
    let session_id = created["session"]["session_id"].as_str().unwrap().to_string();

    let searched = app
        .oneshot(post_json(
            &format!("/v1/sessions/{session_id}/search"),
            &boston_to_new_york(),
        ))
        .await
        .unwrap();
    assert_eq!(searched.status(), StatusCode::BAD_GATEWAY);

    let body = json_body(searched).await.unwrap();
    let state = &body["session"]["state"];
    assert_eq!(state["status"], "failed");
    assert_eq!(state["kind"], "service_failure");
    assert_eq!(
        state["message"],
        "Could not calculate routes. Please try again."
    );
    assert!(!body.to_string().contains("quota"));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = app_with(&ScriptedCompletion::always(TRAIN_AND_BUS));

    let response = app
        .oneshot(get("/v1/sessions/does-not-exist"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await.unwrap();
    assert_eq!(body["error"], "session_not_found");
}

#[tokio::test]
async fn searches_are_rate_limited_per_client() {
    let app = limited_to_one_search();

    let first = app
        .clone()
        .oneshot(post_json("/v1/routes", &boston_to_new_york()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json("/v1/routes", &boston_to_new_york()))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_reset_the_limit() {
    let app = limited_to_one_search();

    let mut allowed = 0;
    for hop in 0..20 {
        let mut request = post_json("/v1/routes", &boston_to_new_york());
        request.headers_mut().insert(
            "x-forwarded-for",
            format!("10.0.0.{hop}").parse().unwrap(),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        if response.status() == StatusCode::OK {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 1);
}

#[tokio::test]
async fn limit_is_tracked_per_peer_address() {
    let app = limited_to_one_search();

    for peer in [[192, 0, 2, 10], [192, 0, 2, 11]] {
        let mut request = post_json("/v1/routes", &boston_to_new_york());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 50000))));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn rejected_api_key_does_not_spend_search_quota() {
    let app = limited_to_one_search();

    let mut unauthorized = post_json("/v1/routes", &boston_to_new_york());
    unauthorized
        .headers_mut()
        .insert("x-api-key", "wrong-key".parse().unwrap());
    let response = app.clone().oneshot(unauthorized).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(post_json("/v1/routes", &boston_to_new_york()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn busy_session_conflicts_unless_superseded() {
    let state = ApiState::new(
        ApiSettings::default(),
        CompletionBackend::scripted(ScriptedCompletion::always(TRAIN_AND_BUS)),
    )
    .unwrap();
    let session = state.sessions.create();
    let in_flight = session
        .begin(&TripRequest::new("Boston", "Albany"))
        .unwrap();
    let app = build_router(state);
    let uri = format!("/v1/sessions/{}/search", session.id());

    let guarded = app
        .clone()
        .oneshot(post_json(&uri, &boston_to_new_york()))
        .await
        .unwrap();
    assert_eq!(guarded.status(), StatusCode::CONFLICT);
    let body = json_body(guarded).await.unwrap();
    assert_eq!(body["error"], "search_in_progress");

    let mut superseding = boston_to_new_york();
    superseding["supersede"] = json!(true);
    let replaced = app.oneshot(post_json(&uri, &superseding)).await.unwrap();
    assert_eq!(replaced.status(), StatusCode::OK);

    let body = json_body(replaced).await.unwrap();
    assert_eq!(body["session"]["state"]["status"], "ready");
    assert_eq!(body["session"]["request_token"], 2);
    assert_eq!(body["session"]["last_trip"]["destination"], "New York");

    // The replaced search can no longer overwrite the slot.
    assert!(!session.finish(&in_flight, Err(RoutingFailure::ServiceFailure)));
    let view = serde_json::to_value(session.view()).unwrap();
    assert_eq!(view["state"]["status"], "ready");
    assert_eq!(view["state"]["response"]["bestRoute"]["type"], "Train");
}
