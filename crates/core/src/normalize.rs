use crate::error::MalformedResponse;
use crate::models::RouteResponse;

/// Parses raw completion text into a `RouteResponse`.
///
/// The text is trimmed and one surrounding Markdown code fence is removed; the
/// parsed values are returned as-is, with no defaults filled in.
pub fn normalize_response(raw: &str) -> Result<RouteResponse, MalformedResponse> {
    let body = strip_code_fence(raw.trim());
    serde_json::from_str::<RouteResponse>(body).map_err(MalformedResponse::from)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };

    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with('{') => body.trim(),
        _ => inner.trim(),
    }
}
