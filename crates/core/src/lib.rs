pub mod badges;
pub mod cards;
pub mod error;
pub mod models;
pub mod normalize;
pub mod prompt;

pub use badges::RouteBadges;
pub use cards::{render_text, route_cards, CardKind, RouteCard};
pub use error::{InvalidInput, MalformedResponse, RoutingFailure, ROUTING_FAILURE_MESSAGE};
pub use models::*;
pub use normalize::normalize_response;
pub use prompt::{build_completion_request, build_prompt, route_response_schema, CompletionRequest};
