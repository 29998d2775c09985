//! Shared fixtures for the HTTP integration tests.

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use serde_json::Value;

pub const DEV_API_KEY: &str = "dev-bestroute-key";

pub const TRAIN_AND_BUS: &str = r#"{"bestRoute":{"type":"Train","duration":"4h","distance":"350km","cost":"$80","description":"Direct regional rail.","advantages":["fast","low emissions"],"emissions":"12kg CO2"},"alternatives":[{"type":"Bus","duration":"7h","distance":"350km","cost":"$40","description":"Cheapest coach service.","advantages":["cheap"]}]}"#;

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", DEV_API_KEY)
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", DEV_API_KEY)
        .body(Body::empty())
        .expect("request should build")
}

pub async fn json_body(response: Response) -> anyhow::Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
