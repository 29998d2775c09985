use std::collections::HashMap;
use std::sync::Arc;

use bestroute_core::{InvalidInput, RouteResponse, RoutingFailure, TripRequest};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchRejected {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    #[error("a search is already in progress for this session")]
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotState {
    Idle,
    Loading,
    Ready { response: RouteResponse },
    Failed { kind: &'static str, message: String },
}

/// Identifies one search attempt. Only the latest ticket may write the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub session_id: String,
    pub token: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub request_token: u64,
    pub last_trip: Option<TripRequest>,
    pub state: SlotState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct SlotInner {
    latest_token: u64,
    state: SlotState,
    last_trip: Option<TripRequest>,
    updated_at: DateTime<Utc>,
}

/// A caller's single "current result" slot.
#[derive(Debug)]
pub struct SearchSession {
    id: String,
    inner: Mutex<SlotInner>,
}

impl SearchSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Mutex::new(SlotInner {
                latest_token: 0,
                state: SlotState::Idle,
                last_trip: None,
                updated_at: Utc::now(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Submit guard: both endpoints filled in and nothing already loading.
    pub fn begin(&self, trip: &TripRequest) -> Result<SearchTicket, SearchRejected> {
        trip.validate()?;
        let mut inner = self.inner.lock();
        if matches!(inner.state, SlotState::Loading) {
            return Err(SearchRejected::InProgress);
        }
        Ok(self.issue(&mut inner, trip))
    }

    /// Starts a fresh search even while another is in flight; the older one
    /// can no longer write its result.
    pub fn supersede(&self, trip: &TripRequest) -> Result<SearchTicket, SearchRejected> {
        trip.validate()?;
        let mut inner = self.inner.lock();
        Ok(self.issue(&mut inner, trip))
    }

    /// Stores the outcome if `ticket` is still the latest. Returns whether it was applied.
    pub fn finish(
        &self,
        ticket: &SearchTicket,
        outcome: Result<RouteResponse, RoutingFailure>,
    ) -> bool {
        let mut inner = self.inner.lock();
        if ticket.session_id != self.id || ticket.token != inner.latest_token {
            return false;
        }

        inner.state = match outcome {
            Ok(response) => SlotState::Ready { response },
            Err(failure) => SlotState::Failed {
                kind: failure.kind(),
                message: failure.user_message(),
            },
        };
        inner.updated_at = Utc::now();
        true
    }

    /// Clears the slot and invalidates every outstanding ticket.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.latest_token += 1;
        inner.state = SlotState::Idle;
        inner.last_trip = None;
        inner.updated_at = Utc::now();
    }

    pub fn view(&self) -> SessionView {
        let inner = self.inner.lock();
        SessionView {
            session_id: self.id.clone(),
            request_token: inner.latest_token,
            last_trip: inner.last_trip.clone(),
            state: inner.state.clone(),
            updated_at: inner.updated_at,
        }
    }

    /// Ties `ticket` to this slot until it is completed or dropped.
    pub(crate) fn pending(&self, ticket: SearchTicket) -> PendingSearch<'_> {
        PendingSearch {
            session: self,
            ticket: Some(ticket),
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.inner.lock().updated_at
    }

    fn touch(&self) {
        self.inner.lock().updated_at = Utc::now();
    }

    fn issue(&self, inner: &mut SlotInner, trip: &TripRequest) -> SearchTicket {
        inner.latest_token += 1;
        inner.state = SlotState::Loading;
        inner.last_trip = Some(trip.clone());
        inner.updated_at = Utc::now();
        SearchTicket {
            session_id: self.id.clone(),
            token: inner.latest_token,
        }
    }
}

/// A search that has been issued a ticket but has not reported back yet.
/// Dropping it unfinished (the caller went away mid-call) marks the slot as
/// failed, provided the ticket is still the latest.
pub(crate) struct PendingSearch<'a> {
    session: &'a SearchSession,
    ticket: Option<SearchTicket>,
}

impl PendingSearch<'_> {
    /// Same contract as [`SearchSession::finish`].
    pub(crate) fn complete(mut self, outcome: Result<RouteResponse, RoutingFailure>) -> bool {
        match self.ticket.take() {
            Some(ticket) => self.session.finish(&ticket, outcome),
            None => false,
        }
    }
}

impl Drop for PendingSearch<'_> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        if self.session.finish(&ticket, Err(RoutingFailure::ServiceFailure)) {
            warn!(
                session_id = %ticket.session_id,
                token = ticket.token,
                "search cancelled before completion"
            );
        }
    }
}

/// In-memory sessions keyed by id. Sessions untouched for `ttl` expire.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<SearchSession>>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn create(&self) -> Arc<SearchSession> {
        let session = Arc::new(SearchSession::new(Uuid::new_v4().to_string()));
        self.sessions
            .write()
            .insert(session.id().to_string(), session.clone());
        session
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SearchSession>> {
        let session = self.sessions.read().get(session_id).cloned()?;
        session.touch();
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops sessions untouched for longer than the TTL, loading or not.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let mut removed = 0_usize;
        self.sessions.write().retain(|_, session| {
            let keep = session.updated_at() > cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}
