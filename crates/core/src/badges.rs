use serde::Serialize;

use crate::models::RouteOption;

const ECO_KEYWORDS: &[&str] = &["eco", "green"];
const COMFORT_KEYWORDS: &[&str] = &["comfort", "relax", "lounge"];
const COMFORT_TYPE_KEYWORDS: &[&str] = &["luxury"];
const FAST_KEYWORDS: &[&str] = &["fast", "quick", "rapid"];

/// Display-only flags derived from the free-text fields of a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteBadges {
    pub is_eco: bool,
    pub is_comfy: bool,
    pub is_fast: bool,
}

impl RouteBadges {
    pub fn infer(route: &RouteOption) -> Self {
        let advantages = route
            .advantages
            .iter()
            .map(|advantage| advantage.to_lowercase())
            .collect::<Vec<_>>();
        let kind = route.kind.to_lowercase();

        let has_emissions = route
            .emissions
            .as_deref()
            .is_some_and(|emissions| !emissions.is_empty());

        Self {
            is_eco: has_emissions || any_contains(&advantages, ECO_KEYWORDS),
            is_comfy: any_contains(&advantages, COMFORT_KEYWORDS)
                || contains_any(&kind, COMFORT_TYPE_KEYWORDS),
            is_fast: any_contains(&advantages, FAST_KEYWORDS),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.is_eco || self.is_comfy || self.is_fast)
    }
}

fn any_contains(haystacks: &[String], needles: &[&str]) -> bool {
    haystacks
        .iter()
        .any(|haystack| contains_any(haystack, needles))
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}
