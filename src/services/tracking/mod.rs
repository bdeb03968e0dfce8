//! Tracking service - lifecycle state machine, location ingest, and
//! emergency escalation
//!
//! The service coordinates:
//! - session lifecycle (start, pickup-complete, complete, reserved cancel)
//! - location ingest (validation, atomic append + overwrite, deviation check)
//! - fan-out of typed events to the other participants' channels
//! - emergency escalation, including the out-of-band SOS side effect
//!
//! Every validation and authorization check runs before any mutation; a
//! rejected request leaves no partial state. Fan-out happens after the
//! mutation commits and can never fail the request.


use crate::domain::session::{LocationSample, TrackingSession};
use crate::domain::types::{
    epoch_ms, EmergencyKind, GeoPoint, RideId, SessionId, TrackingStatus, UserId,
};
use crate::infra::error::{TrackingError, TrackingResult};
use crate::io::notify::{
    DriverLocationPayload, Notifier, PickupCompletedPayload, RideCompletedPayload,
    RideEmergencyPayload, RideEvent, RideStartedPayload,
};
use crate::io::rides::{RideDirectory, SosAlerter};
use crate::services::deviation::DeviationDetector;
use crate::services::store::TrackingStore;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{info, warn};

/// Central coordinator for live ride tracking
pub struct TrackingService {
    store: Arc<TrackingStore>,
    notifier: Arc<dyn Notifier>,
    rides: Arc<dyn RideDirectory>,
    sos: Arc<dyn SosAlerter>,
    deviation: Box<dyn DeviationDetector>,
}

impl TrackingService {
    pub fn new(
        store: Arc<TrackingStore>,
        notifier: Arc<dyn Notifier>,
        rides: Arc<dyn RideDirectory>,
        sos: Arc<dyn SosAlerter>,
        deviation: Box<dyn DeviationDetector>,
    ) -> Self {
        Self { store, notifier, rides, sos, deviation }
    }

    pub fn store(&self) -> &Arc<TrackingStore> {
        &self.store
    }

    /// Start (or restart after a terminal predecessor) tracking for a ride.
    ///
    /// Only the ride's driver may start tracking. A still-active session
    /// for the same ride is a `Conflict`.
    pub async fn start(
        &self,
        ride_id: RideId,
        actor: &UserId,
        initial_location: GeoPoint,
        estimated_duration_min: Option<u32>,
    ) -> TrackingResult<TrackingSession> {
        validate_location(&initial_location)?;

        let ride = self.rides.ride(&ride_id).await?;
        if ride.driver_id != *actor {
            return Err(TrackingError::Forbidden(format!(
                "only the driver of ride {ride_id} may start tracking"
            )));
        }

        // Participant set is fixed at start time
        let passengers: SmallVec<[UserId; 4]> =
            ride.passenger_ids.iter().filter(|p| **p != ride.driver_id).cloned().collect();

        let mut session = TrackingSession::start(
            ride_id,
            ride.driver_id,
            passengers,
            initial_location,
            estimated_duration_min,
        );
        if let Some(minutes) = estimated_duration_min {
            session.estimated_dropoff_ts =
                Some(session.started_at + u64::from(minutes) * 60_000);
        }

        self.store.insert_for_ride(session.clone())?;

        info!(
            session_id = %session.id,
            ride_id = %session.ride_id,
            driver_id = %session.driver_id,
            passengers = session.passenger_ids.len(),
            "tracking_started"
        );

        for passenger in &session.passenger_ids {
            self.notifier.publish(
                passenger,
                RideEvent::RideStarted(RideStartedPayload {
                    session_id: session.id.clone(),
                    ride_id: session.ride_id.clone(),
                    driver_id: session.driver_id.clone(),
                    driver_location: session.current_location,
                    estimated_pickup_ts: session.estimated_pickup_ts,
                    message: "Your ride has started".to_string(),
                    ts: session.started_at,
                }),
            );
        }

        Ok(session)
    }

    /// Apply one driver location sample: one history append plus one
    /// current-location overwrite, committed atomically.
    pub async fn update_location(
        &self,
        session_id: &SessionId,
        actor: &UserId,
        location: GeoPoint,
        speed_kmh: Option<f64>,
        heading_deg: Option<f64>,
    ) -> TrackingResult<TrackingSession> {
        validate_location(&location)?;
        if let Some(speed) = speed_kmh {
            if !speed.is_finite() || speed < 0.0 {
                return Err(TrackingError::Validation(format!("invalid speed {speed}")));
            }
        }
        if let Some(heading) = heading_deg {
            if !heading.is_finite() || !(0.0..360.0).contains(&heading) {
                return Err(TrackingError::Validation(format!("invalid heading {heading}")));
            }
        }

        let detector = &self.deviation;
        let session = self.store.mutate(session_id, |session| {
            require_driver(session, actor)?;
            if session.status.is_terminal() {
                return Err(TrackingError::InvalidState(format!(
                    "session is {}",
                    session.status.as_str()
                )));
            }

            session.record_sample(LocationSample {
                location,
                ts: epoch_ms(),
                speed_kmh,
                heading_deg,
            });

            let deviation = detector.check(session);
            session.is_off_route = deviation.off_route;
            if deviation.off_route {
                session.off_route_distance_m = Some(deviation.distance_m);
                if session.off_route_since.is_none() {
                    session.off_route_since = Some(epoch_ms());
                }
            } else {
                session.off_route_distance_m = None;
                session.off_route_since = None;
            }

            Ok(session.clone())
        })?;

        // Driver is not notified of its own update
        for passenger in &session.passenger_ids {
            self.notifier.publish(
                passenger,
                RideEvent::DriverLocationUpdate(DriverLocationPayload {
                    session_id: session.id.clone(),
                    ride_id: session.ride_id.clone(),
                    location,
                    speed_kmh,
                    heading_deg,
                    is_off_route: session.is_off_route,
                    message: "Driver location updated".to_string(),
                    ts: session.last_location_update,
                }),
            );
        }

        Ok(session)
    }

    /// Mark the pickup leg done; the session moves to `in_progress`.
    ///
    /// Rejected while the session is in `emergency`: only the terminal
    /// transitions leave that state.
    pub async fn mark_pickup_complete(
        &self,
        session_id: &SessionId,
        actor: &UserId,
    ) -> TrackingResult<TrackingSession> {
        let session = self.store.mutate(session_id, |session| {
            require_driver(session, actor)?;
            if session.status.is_terminal() || session.status == TrackingStatus::Emergency {
                return Err(TrackingError::InvalidState(format!(
                    "session is {}",
                    session.status.as_str()
                )));
            }
            session.mark_pickup_complete();
            Ok(session.clone())
        })?;

        info!(session_id = %session.id, ride_id = %session.ride_id, "pickup_completed");

        let ts = session.pickup_completed_at.unwrap_or_else(epoch_ms);
        for user in session.participants_except(actor) {
            self.notifier.publish(
                &user,
                RideEvent::PickupCompleted(PickupCompletedPayload {
                    session_id: session.id.clone(),
                    ride_id: session.ride_id.clone(),
                    driver_id: session.driver_id.clone(),
                    message: "Pickup completed".to_string(),
                    ts,
                }),
            );
        }

        Ok(session)
    }

    /// Complete the session. Idempotent: completing an already-completed
    /// session is a no-op success with no repeated side effects.
    pub async fn complete(
        &self,
        session_id: &SessionId,
        actor: &UserId,
        final_location: Option<GeoPoint>,
    ) -> TrackingResult<TrackingSession> {
        if let Some(location) = &final_location {
            validate_location(location)?;
        }

        let (session, already_completed) = self.store.mutate(session_id, |session| {
            require_driver(session, actor)?;
            match session.status {
                TrackingStatus::Completed => return Ok((session.clone(), true)),
                TrackingStatus::Cancelled => {
                    return Err(TrackingError::InvalidState("session is cancelled".to_string()))
                }
                _ => {}
            }

            if let Some(location) = final_location {
                session.record_sample(LocationSample {
                    location,
                    ts: epoch_ms(),
                    speed_kmh: None,
                    heading_deg: None,
                });
            }
            session.mark_completed();
            Ok((session.clone(), false))
        })?;

        if already_completed {
            return Ok(session);
        }

        info!(session_id = %session.id, ride_id = %session.ride_id, "tracking_completed");

        // Hand the ride record's terminal processing to the collaborator.
        // The session is already committed, so a failure here is logged,
        // not propagated.
        if let Err(e) = self.rides.mark_completed(&session.ride_id).await {
            warn!(ride_id = %session.ride_id, error = %e, "ride_complete_sync_failed");
        }

        let completed_at = session.completed_at.unwrap_or_else(epoch_ms);
        for passenger in &session.passenger_ids {
            self.notifier.publish(
                passenger,
                RideEvent::RideCompleted(RideCompletedPayload {
                    session_id: session.id.clone(),
                    ride_id: session.ride_id.clone(),
                    completed_at,
                    message: "Your ride is complete".to_string(),
                    ts: completed_at,
                }),
            );
        }

        Ok(session)
    }

    /// Reserved transition: cancel the session. Same authorization rule
    /// as `complete`; not routed over HTTP.
    pub async fn cancel(
        &self,
        session_id: &SessionId,
        actor: &UserId,
    ) -> TrackingResult<TrackingSession> {
        let session = self.store.mutate(session_id, |session| {
            require_driver(session, actor)?;
            match session.status {
                TrackingStatus::Cancelled => return Ok(session.clone()),
                TrackingStatus::Completed => {
                    return Err(TrackingError::InvalidState("session is completed".to_string()))
                }
                _ => {}
            }
            session.mark_cancelled();
            Ok(session.clone())
        })?;

        info!(session_id = %session.id, ride_id = %session.ride_id, "tracking_cancelled");
        Ok(session)
    }

    /// Escalate an emergency. Driver or any passenger may trigger; the
    /// first trigger of an episode owns `emergency_details`, later ones
    /// only re-notify.
    pub async fn trigger_emergency(
        &self,
        session_id: &SessionId,
        actor: &UserId,
        kind: EmergencyKind,
        location: GeoPoint,
    ) -> TrackingResult<TrackingSession> {
        validate_location(&location)?;

        let (session, details) = self.store.mutate(session_id, |session| {
            if !session.is_participant(actor) {
                return Err(TrackingError::Forbidden(
                    "only ride participants may trigger an emergency".to_string(),
                ));
            }
            if session.status.is_terminal() {
                return Err(TrackingError::InvalidState(format!(
                    "session is {}",
                    session.status.as_str()
                )));
            }
            let details = session.trigger_emergency(actor.clone(), kind, location);
            Ok((session.clone(), details))
        })?;

        warn!(
            session_id = %session.id,
            ride_id = %session.ride_id,
            triggered_by = %actor,
            kind = %kind.as_str(),
            "emergency_triggered"
        );

        // Everyone except the triggering actor is told
        for user in session.participants_except(actor) {
            self.notifier.publish(
                &user,
                RideEvent::RideEmergency(RideEmergencyPayload {
                    session_id: session.id.clone(),
                    ride_id: session.ride_id.clone(),
                    kind: details.kind,
                    location: details.location,
                    triggered_by: details.triggered_by.clone(),
                    message: format!("Emergency reported: {}", details.kind.as_str()),
                    ts: details.ts,
                }),
            );
        }

        // Out-of-band escalation runs detached; its outcome never touches
        // the state machine
        let sos = self.sos.clone();
        let ride_id = session.ride_id.clone();
        let triggered_by = actor.clone();
        let kind_str = kind.as_str();
        tokio::spawn(async move {
            sos.alert(&ride_id, &triggered_by, kind_str).await;
        });

        Ok(session)
    }

    /// Full session snapshot for a participant
    pub fn snapshot(&self, session_id: &SessionId, actor: &UserId) -> TrackingResult<TrackingSession> {
        let session = self
            .store
            .get(session_id)
            .ok_or_else(|| TrackingError::NotFound(format!("tracking session {session_id}")))?;
        if !session.is_participant(actor) {
            return Err(TrackingError::Forbidden(
                "not a participant of this session".to_string(),
            ));
        }
        Ok(session)
    }

    /// All non-terminal sessions the actor participates in
    pub fn active_sessions(&self, actor: &UserId) -> Vec<TrackingSession> {
        self.store.active_for_user(actor)
    }
}

fn validate_location(location: &GeoPoint) -> TrackingResult<()> {
    if !location.is_valid() {
        return Err(TrackingError::Validation(format!(
            "invalid location lat={} lon={}",
            location.lat, location.lon
        )));
    }
    Ok(())
}

fn require_driver(session: &TrackingSession, actor: &UserId) -> TrackingResult<()> {
    if session.driver_id != *actor {
        return Err(TrackingError::Forbidden(
            "only the session's driver may perform this operation".to_string(),
        ));
    }
    Ok(())
}
