use serde::Serialize;

use crate::badges::RouteBadges;
use crate::models::{RouteOption, RouteResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Best,
    Alternative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteCard<'a> {
    pub kind: CardKind,
    pub rank: usize,
    pub route: &'a RouteOption,
    pub badges: RouteBadges,
}

/// Best route first, then alternatives in the order the service returned them.
pub fn route_cards(response: &RouteResponse) -> Vec<RouteCard<'_>> {
    let mut cards = Vec::with_capacity(response.option_count());
    cards.push(RouteCard {
        kind: CardKind::Best,
        rank: 1,
        route: &response.best_route,
        badges: RouteBadges::infer(&response.best_route),
    });

    for (idx, route) in response.alternatives.iter().enumerate() {
        cards.push(RouteCard {
            kind: CardKind::Alternative,
            rank: idx + 1,
            route,
            badges: RouteBadges::infer(route),
        });
    }

    cards
}

pub fn badge_glyphs(badges: RouteBadges) -> String {
    let mut glyphs = Vec::new();
    if badges.is_fast {
        glyphs.push("⚡");
    }
    if badges.is_eco {
        glyphs.push("🌱");
    }
    if badges.is_comfy {
        glyphs.push("🛋️");
    }
    glyphs.join(" ")
}

/// Plain-text rendering used by the command line front-end.
pub fn render_text(response: &RouteResponse) -> String {
    let mut out = String::new();
    for card in route_cards(response) {
        let heading = match card.kind {
            CardKind::Best => "BEST ROUTE".to_string(),
            CardKind::Alternative => format!("ALTERNATIVE {}", card.rank),
        };
        let glyphs = badge_glyphs(card.badges);

        out.push_str(&format!("== {}: {}", heading, card.route.kind));
        if !glyphs.is_empty() {
            out.push_str(&format!("  {}", glyphs));
        }
        out.push('\n');
        out.push_str(&format!(
            "   {} | {} | {}\n",
            card.route.duration, card.route.distance, card.route.cost
        ));
        out.push_str(&format!("   {}\n", card.route.description));
        if !card.route.advantages.is_empty() {
            out.push_str(&format!("   + {}\n", card.route.advantages.join(", ")));
        }
        if let Some(emissions) = card.route.emissions.as_deref().filter(|v| !v.is_empty()) {
            out.push_str(&format!("   emissions: {}\n", emissions));
        }
        out.push('\n');
    }
    out
}
