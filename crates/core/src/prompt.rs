use serde::Serialize;
use serde_json::{json, Value};

use crate::models::TripRequest;

pub const RESPONSE_MIME_TYPE: &str = "application/json";

/// Everything the completion service needs for one route search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub response_mime_type: &'static str,
    pub response_schema: Value,
}

pub fn build_completion_request(trip: &TripRequest) -> CompletionRequest {
    CompletionRequest {
        prompt: build_prompt(trip),
        response_mime_type: RESPONSE_MIME_TYPE,
        response_schema: route_response_schema(),
    }
}

pub fn build_prompt(trip: &TripRequest) -> String {
    let stops = trip.filled_stops();
    let stop_clause = if stops.is_empty() {
        String::new()
    } else {
        format!(" with extra stops at: {}", stops.join(", "))
    };

    format!(
        "Act as an expert travel and transit consultant. Find the best route from \"{}\" to \"{}\"{}.\n\
         The user has specific preferences: {}.\n\
         \n\
         Provide a primary \"bestRoute\" based on preferences, and at least 2 alternative options.\n\
         Include estimated duration, distance, approximate cost (if applicable), and a concise description of why it fits the criteria.\n\
         Also include \"emissions\" for the eco-friendly context if relevant.",
        trip.start,
        trip.destination,
        stop_clause,
        preference_summary(trip),
    )
}

/// Comma-joined active preference names, or `None` when nothing is selected.
pub fn preference_summary(trip: &TripRequest) -> String {
    let names = trip
        .preferences
        .active()
        .into_iter()
        .map(|preference| preference.as_name())
        .collect::<Vec<_>>();

    if names.is_empty() {
        "None".to_string()
    } else {
        names.join(", ")
    }
}

/// Output schema in the OpenAPI subset accepted by `generationConfig.responseSchema`.
pub fn route_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "bestRoute": route_option_schema(true),
            "alternatives": {
                "type": "ARRAY",
                "items": route_option_schema(false),
            },
        },
        "required": ["bestRoute", "alternatives"],
    })
}

fn route_option_schema(with_emissions: bool) -> Value {
    let mut properties = json!({
        "type": { "type": "STRING" },
        "duration": { "type": "STRING" },
        "distance": { "type": "STRING" },
        "cost": { "type": "STRING" },
        "description": { "type": "STRING" },
        "advantages": { "type": "ARRAY", "items": { "type": "STRING" } },
    });

    if with_emissions {
        if let Some(map) = properties.as_object_mut() {
            map.insert("emissions".to_string(), json!({ "type": "STRING" }));
        }
    }

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": ["type", "duration", "distance", "cost", "description", "advantages"],
    })
}
