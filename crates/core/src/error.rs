use thiserror::Error;

/// Text shown to users for every failure past input validation.
pub const ROUTING_FAILURE_MESSAGE: &str = "Could not calculate routes. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("a starting point is required")]
    MissingStart,
    #[error("a destination is required")]
    MissingDestination,
}

/// Parser diagnostic for a reply that could not be turned into a `RouteResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed route response at line {line}, column {column}: {reason}")]
pub struct MalformedResponse {
    pub line: usize,
    pub column: usize,
    pub reason: String,
}

impl From<serde_json::Error> for MalformedResponse {
    fn from(error: serde_json::Error) -> Self {
        Self {
            line: error.line(),
            column: error.column(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingFailure {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    /// The completion call itself failed. The cause is only logged.
    #[error("{}", ROUTING_FAILURE_MESSAGE)]
    ServiceFailure,
    #[error("{}", ROUTING_FAILURE_MESSAGE)]
    MalformedResponse,
}

impl RoutingFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ServiceFailure => "service_failure",
            Self::MalformedResponse => "malformed_response",
        }
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_and_parse_failures_share_the_user_message() {
        assert_eq!(
            RoutingFailure::ServiceFailure.user_message(),
            ROUTING_FAILURE_MESSAGE
        );
        assert_eq!(
            RoutingFailure::MalformedResponse.user_message(),
            ROUTING_FAILURE_MESSAGE
        );
        assert_ne!(
            RoutingFailure::ServiceFailure.kind(),
            RoutingFailure::MalformedResponse.kind()
        );
    }

    #[test]
    fn invalid_input_names_the_missing_field() {
        let failure = RoutingFailure::from(InvalidInput::MissingDestination);
        assert_eq!(failure.user_message(), "a destination is required");
        assert_eq!(failure.kind(), "invalid_input");
    }
}
