//! Tracking-session data model for one in-progress ride
//!
//! One `TrackingSession` exists per ride. It carries the lifecycle status,
//! the last known driver position, the append-only location history, and
//! the emergency episode details.

use crate::domain::types::{
    epoch_ms, new_uuid_v7, EmergencyKind, GeoPoint, RideId, SessionId, TrackingStatus, UserId,
};
use serde::Serialize;
use smallvec::SmallVec;

/// One accepted driver position report
#[derive(Debug, Clone, Serialize)]
pub struct LocationSample {
    pub location: GeoPoint,
    /// Server-assigned epoch ms; client timestamps are not trusted
    pub ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
}

/// Origin of an emergency episode. Write-once: a re-trigger while the
/// session is already in emergency must not clobber these fields.
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyDetails {
    pub triggered_by: UserId,
    pub kind: EmergencyKind,
    pub location: GeoPoint,
    pub ts: u64,
}

/// A waypoint on the planned route (future use; not populated by ingest)
#[derive(Debug, Clone, Serialize)]
pub struct RouteWaypoint {
    pub location: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Live tracking state for one ride
#[derive(Debug, Clone, Serialize)]
pub struct TrackingSession {
    pub id: SessionId,
    pub ride_id: RideId,
    pub driver_id: UserId,
    /// Fixed at session start, copied from the ride's participant list
    pub passenger_ids: SmallVec<[UserId; 4]>,
    pub status: TrackingStatus,
    pub current_location: GeoPoint,
    /// Append-only, ordered by server-assigned timestamp and arrival
    pub location_history: Vec<LocationSample>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned_route: Vec<RouteWaypoint>,
    pub is_off_route: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub off_route_distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub off_route_since: Option<u64>,
    pub started_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropoff_completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<u64>,
    pub emergency_triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_details: Option<EmergencyDetails>,
    /// Advisory only. Nothing computes a pickup estimate yet (there is no
    /// pickup location to derive it from), so this stays `None` until a
    /// route planner fills it in; only the dropoff estimate is derived,
    /// from `estimated_duration_min`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_pickup_ts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_dropoff_ts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_min: Option<u32>,
    pub last_location_update: u64,
}

impl TrackingSession {
    /// Create a session in `started` state with the initial location as
    /// the first history entry.
    pub fn start(
        ride_id: RideId,
        driver_id: UserId,
        passenger_ids: SmallVec<[UserId; 4]>,
        initial_location: GeoPoint,
        estimated_duration_min: Option<u32>,
    ) -> Self {
        let now = epoch_ms();
        let seed = LocationSample {
            location: initial_location,
            ts: now,
            speed_kmh: None,
            heading_deg: None,
        };
        Self {
            id: SessionId(new_uuid_v7()),
            ride_id,
            driver_id,
            passenger_ids,
            status: TrackingStatus::Started,
            current_location: initial_location,
            location_history: vec![seed],
            planned_route: Vec::new(),
            is_off_route: false,
            off_route_distance_m: None,
            off_route_since: None,
            started_at: now,
            pickup_completed_at: None,
            dropoff_completed_at: None,
            completed_at: None,
            cancelled_at: None,
            emergency_triggered: false,
            emergency_details: None,
            estimated_pickup_ts: None,
            estimated_dropoff_ts: None,
            estimated_duration_min,
            last_location_update: now,
        }
    }

    /// Append one sample and overwrite the current location.
    ///
    /// The caller must hold the store's write lock so the pair commits as
    /// one operation.
    pub fn record_sample(&mut self, sample: LocationSample) {
        self.current_location = sample.location;
        self.last_location_update = sample.ts;
        self.location_history.push(sample);
    }

    /// Whether the given user is the driver or one of the passengers
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.driver_id == *user || self.passenger_ids.contains(user)
    }

    /// All participants except `actor` - the fan-out audience for events
    /// the actor should not receive back.
    pub fn participants_except(&self, actor: &UserId) -> Vec<UserId> {
        let mut out = Vec::with_capacity(1 + self.passenger_ids.len());
        if self.driver_id != *actor {
            out.push(self.driver_id.clone());
        }
        for p in &self.passenger_ids {
            if p != actor {
                out.push(p.clone());
            }
        }
        out
    }

    /// Set pickup-complete state. First call wins on the milestone.
    pub fn mark_pickup_complete(&mut self) {
        self.status = TrackingStatus::InProgress;
        if self.pickup_completed_at.is_none() {
            self.pickup_completed_at = Some(epoch_ms());
        }
    }

    /// Transition to completed. Milestones are set once; repeated calls
    /// leave the original timestamps intact.
    pub fn mark_completed(&mut self) {
        self.status = TrackingStatus::Completed;
        let now = epoch_ms();
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        if self.dropoff_completed_at.is_none() {
            self.dropoff_completed_at = Some(now);
        }
    }

    /// Transition to cancelled (reserved transition, driver/system initiated)
    pub fn mark_cancelled(&mut self) {
        self.status = TrackingStatus::Cancelled;
        if self.cancelled_at.is_none() {
            self.cancelled_at = Some(epoch_ms());
        }
    }

    /// Enter the emergency state. Details are write-once per episode:
    /// the first trigger records origin, later triggers only re-notify.
    /// Returns the details that apply to this episode.
    pub fn trigger_emergency(
        &mut self,
        triggered_by: UserId,
        kind: EmergencyKind,
        location: GeoPoint,
    ) -> EmergencyDetails {
        self.status = TrackingStatus::Emergency;
        self.emergency_triggered = true;
        if let Some(existing) = &self.emergency_details {
            return existing.clone();
        }
        let details = EmergencyDetails { triggered_by, kind, location, ts: epoch_ms() };
        self.emergency_details = Some(details.clone());
        details
    }

    /// Epoch ms at which the session became terminal, if it has
    pub fn terminal_at(&self) -> Option<u64> {
        match self.status {
            TrackingStatus::Completed => self.completed_at,
            TrackingStatus::Cancelled => self.cancelled_at,
            _ => None,
        }
    }
}
