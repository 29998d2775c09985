use serde::{Deserialize, Serialize};

use crate::error::InvalidInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Preference {
    Fastest,
    Cheapest,
    MostComfortable,
    EcoFriendly,
}

impl Preference {
    pub const ALL: [Preference; 4] = [
        Self::Fastest,
        Self::Cheapest,
        Self::MostComfortable,
        Self::EcoFriendly,
    ];

    /// Name used both on the wire and inside the prompt.
    pub fn as_name(self) -> &'static str {
        match self {
            Self::Fastest => "fastest",
            Self::Cheapest => "cheapest",
            Self::MostComfortable => "mostComfortable",
            Self::EcoFriendly => "ecoFriendly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub fastest: bool,
    #[serde(default)]
    pub cheapest: bool,
    #[serde(default)]
    pub most_comfortable: bool,
    #[serde(default)]
    pub eco_friendly: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            fastest: true,
            cheapest: false,
            most_comfortable: false,
            eco_friendly: false,
        }
    }
}

impl Preferences {
    pub fn none() -> Self {
        Self {
            fastest: false,
            cheapest: false,
            most_comfortable: false,
            eco_friendly: false,
        }
    }

    pub fn is_active(&self, preference: Preference) -> bool {
        match preference {
            Preference::Fastest => self.fastest,
            Preference::Cheapest => self.cheapest,
            Preference::MostComfortable => self.most_comfortable,
            Preference::EcoFriendly => self.eco_friendly,
        }
    }

    pub fn set(&mut self, preference: Preference, active: bool) {
        match preference {
            Preference::Fastest => self.fastest = active,
            Preference::Cheapest => self.cheapest = active,
            Preference::MostComfortable => self.most_comfortable = active,
            Preference::EcoFriendly => self.eco_friendly = active,
        }
    }

    /// Active preferences in declaration order.
    pub fn active(&self) -> Vec<Preference> {
        Preference::ALL
            .into_iter()
            .filter(|preference| self.is_active(*preference))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRequest {
    pub start: String,
    pub destination: String,
    #[serde(default)]
    pub stops: Vec<String>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl TripRequest {
    pub fn new(start: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            destination: destination.into(),
            stops: Vec::new(),
            preferences: Preferences::default(),
        }
    }

    pub fn with_stops(mut self, stops: Vec<String>) -> Self {
        self.stops = stops;
        self
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Waypoints that were actually filled in. Blank form rows are skipped.
    pub fn filled_stops(&self) -> Vec<&str> {
        self.stops
            .iter()
            .map(String::as_str)
            .filter(|stop| !stop.trim().is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<(), InvalidInput> {
        if self.start.trim().is_empty() {
            return Err(InvalidInput::MissingStart);
        }
        if self.destination.trim().is_empty() {
            return Err(InvalidInput::MissingDestination);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOption {
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: String,
    pub distance: String,
    pub cost: String,
    pub description: String,
    pub advantages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub best_route: RouteOption,
    pub alternatives: Vec<RouteOption>,
}

impl RouteResponse {
    pub fn option_count(&self) -> usize {
        1 + self.alternatives.len()
    }
}
