pub mod session;

use std::sync::Arc;
use std::time::Instant;

use bestroute_completion::CompletionService;
use bestroute_core::{
    build_completion_request, normalize_response, Preferences, RouteResponse, RoutingFailure,
    TripRequest,
};
use bestroute_observability::AppMetrics;
use tracing::{info, instrument, warn};

pub use session::{
    SearchRejected, SearchSession, SearchTicket, SessionRegistry, SessionView, SlotState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Refuse while the session is already loading.
    #[default]
    Guarded,
    /// Replace whatever is in flight.
    Supersede,
}

#[derive(Clone)]
pub struct RoutePlanner<C>
where
    C: CompletionService,
{
    completion: Arc<C>,
    metrics: Arc<AppMetrics>,
}

impl<C> RoutePlanner<C>
where
    C: CompletionService,
{
    pub fn new(completion: Arc<C>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            completion,
            metrics,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.completion.backend_name()
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub async fn find_best_routes(
        &self,
        start: &str,
        destination: &str,
        stops: &[String],
        preferences: Preferences,
    ) -> Result<RouteResponse, RoutingFailure> {
        let trip = TripRequest {
            start: start.to_string(),
            destination: destination.to_string(),
            stops: stops.to_vec(),
            preferences,
        };
        self.find_best_routes_for(&trip).await
    }

    #[instrument(skip_all, fields(stops = trip.stops.len(), backend = self.backend_name()))]
    pub async fn find_best_routes_for(
        &self,
        trip: &TripRequest,
    ) -> Result<RouteResponse, RoutingFailure> {
        if let Err(invalid) = trip.validate() {
            self.metrics.inc_invalid_input();
            return Err(invalid.into());
        }

        let started = Instant::now();
        self.metrics.inc_search();

        let request = build_completion_request(trip);
        let outcome = match self.completion.complete(&request).await {
            Ok(raw) => normalize_response(&raw).map_err(|error| {
                self.metrics.inc_malformed_response();
                warn!(
                    failure_kind = "malformed_response",
                    error = %error,
                    raw_len = raw.len(),
                    "completion reply could not be parsed"
                );
                RoutingFailure::MalformedResponse
            }),
            Err(error) => {
                self.metrics.inc_service_failure();
                warn!(failure_kind = "service", error = %error, "completion call failed");
                Err(RoutingFailure::ServiceFailure)
            }
        };

        self.metrics.observe_latency(started.elapsed());
        if let Ok(response) = &outcome {
            self.metrics.inc_success();
            info!(
                best = %response.best_route.kind,
                alternatives = response.alternatives.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "routes found"
            );
        }

        outcome
    }

    /// Runs one search through the session slot. The result is stored only if
    /// no newer search or reset happened meanwhile.
    #[instrument(skip(self, session, trip), fields(session_id = %session.id()))]
    pub async fn search(
        &self,
        session: &SearchSession,
        trip: TripRequest,
        mode: SubmitMode,
    ) -> Result<SessionView, SearchRejected> {
        let issued = match mode {
            SubmitMode::Guarded => session.begin(&trip),
            SubmitMode::Supersede => session.supersede(&trip),
        };
        let ticket = issued.inspect_err(|rejected| {
            if matches!(rejected, SearchRejected::InvalidInput(_)) {
                self.metrics.inc_invalid_input();
            }
        })?;

        let token = ticket.token;
        let pending = session.pending(ticket);
        let outcome = self.find_best_routes_for(&trip).await;
        if !pending.complete(outcome) {
            self.metrics.inc_stale_dropped();
            info!(token, "stale search result dropped");
        }

        Ok(session.view())
    }
}
