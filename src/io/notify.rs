//! Typed real-time events and the per-user push channel
//!
//! Delivery contract: best-effort, at-most-once per invocation, and
//! non-blocking relative to the state mutation that triggered it. A full
//! queue or an offline user drops the event; the store stays the source
//! of truth.

use crate::domain::types::{EmergencyKind, GeoPoint, RideId, SessionId, UserId};
use serde::Serialize;
use tokio::sync::mpsc;

/// Events pushed to a participant's channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum RideEvent {
    #[serde(rename = "rideStarted")]
    RideStarted(RideStartedPayload),
    #[serde(rename = "driverLocationUpdate")]
    DriverLocationUpdate(DriverLocationPayload),
    #[serde(rename = "pickupCompleted")]
    PickupCompleted(PickupCompletedPayload),
    #[serde(rename = "rideCompleted")]
    RideCompleted(RideCompletedPayload),
    #[serde(rename = "rideEmergency")]
    RideEmergency(RideEmergencyPayload),
}

impl RideEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RideEvent::RideStarted(_) => "rideStarted",
            RideEvent::DriverLocationUpdate(_) => "driverLocationUpdate",
            RideEvent::PickupCompleted(_) => "pickupCompleted",
            RideEvent::RideCompleted(_) => "rideCompleted",
            RideEvent::RideEmergency(_) => "rideEmergency",
        }
    }

    /// Emergencies are published at a higher QoS than routine telemetry
    pub fn is_emergency(&self) -> bool {
        matches!(self, RideEvent::RideEmergency(_))
    }
}

/// Sent to every passenger when the driver starts tracking
#[derive(Debug, Clone, Serialize)]
pub struct RideStartedPayload {
    pub session_id: SessionId,
    pub ride_id: RideId,
    pub driver_id: UserId,
    pub driver_location: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_pickup_ts: Option<u64>,
    pub message: String,
    pub ts: u64,
}

/// Sent to every passenger on each accepted location sample
#[derive(Debug, Clone, Serialize)]
pub struct DriverLocationPayload {
    pub session_id: SessionId,
    pub ride_id: RideId,
    pub location: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    pub is_off_route: bool,
    pub message: String,
    pub ts: u64,
}

/// Sent to all participants (other than the driver) at pickup
#[derive(Debug, Clone, Serialize)]
pub struct PickupCompletedPayload {
    pub session_id: SessionId,
    pub ride_id: RideId,
    pub driver_id: UserId,
    pub message: String,
    pub ts: u64,
}

/// Sent to every passenger when the ride completes
#[derive(Debug, Clone, Serialize)]
pub struct RideCompletedPayload {
    pub session_id: SessionId,
    pub ride_id: RideId,
    pub completed_at: u64,
    pub message: String,
    pub ts: u64,
}

/// Sent to all participants except the triggering actor
#[derive(Debug, Clone, Serialize)]
pub struct RideEmergencyPayload {
    pub session_id: SessionId,
    pub ride_id: RideId,
    pub kind: EmergencyKind,
    pub location: GeoPoint,
    pub triggered_by: UserId,
    pub message: String,
    pub ts: u64,
}

/// One event addressed to one user's channel
#[derive(Debug, Clone)]
pub struct PushEnvelope {
    pub user: UserId,
    pub event: RideEvent,
}

/// Fan-out seam. Injected into the tracking service so tests can record
/// deliveries with a fake implementation.
pub trait Notifier: Send + Sync {
    /// Deliver one event to one user's channel. Must not block and must
    /// not surface failure to the caller.
    fn publish(&self, user: &UserId, event: RideEvent);
}

/// Sender handle for push envelopes
///
/// Clone this to share across producers. Non-blocking: if the channel is
/// full the event is dropped.
#[derive(Clone)]
pub struct PushSender {
    tx: mpsc::Sender<PushEnvelope>,
}

impl PushSender {
    pub fn new(tx: mpsc::Sender<PushEnvelope>) -> Self {
        Self { tx }
    }
}

impl Notifier for PushSender {
    fn publish(&self, user: &UserId, event: RideEvent) {
        let envelope = PushEnvelope { user: user.clone(), event };
        // try_send keeps the mutation path non-blocking; drop if full
        let _ = self.tx.try_send(envelope);
    }
}

/// Notifier that discards everything, used when push is disabled
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn publish(&self, _user: &UserId, _event: RideEvent) {}
}

/// Create a new push channel pair
///
/// Returns (sender, receiver) where the sender can be cloned and shared.
pub fn create_push_channel(buffer: usize) -> (PushSender, mpsc::Receiver<PushEnvelope>) {
    let (tx, rx) = mpsc::channel(buffer);
    (PushSender::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::epoch_ms;

    #[test]
    fn test_event_json_carries_tag() {
        let event = RideEvent::RideStarted(RideStartedPayload {
            session_id: SessionId::from("s1"),
            ride_id: RideId::from("r1"),
            driver_id: UserId::from("d1"),
            driver_location: GeoPoint::new(12.9, 77.6),
            estimated_pickup_ts: None,
            message: "Your ride has started".to_string(),
            ts: 1736012345678,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "rideStarted");
        assert_eq!(json["ride_id"], "r1");
        assert_eq!(json["driver_location"]["lat"], 12.9);
        assert!(json.get("estimated_pickup_ts").is_none());
    }

    #[test]
    fn test_emergency_event_flagged() {
        let event = RideEvent::RideEmergency(RideEmergencyPayload {
            session_id: SessionId::from("s1"),
            ride_id: RideId::from("r1"),
            kind: EmergencyKind::Harassment,
            location: GeoPoint::new(1.0, 2.0),
            triggered_by: UserId::from("p1"),
            message: "Emergency reported".to_string(),
            ts: epoch_ms(),
        });
        assert!(event.is_emergency());
        assert_eq!(event.name(), "rideEmergency");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "rideEmergency");
        assert_eq!(json["kind"], "harassment");
        assert_eq!(json["triggered_by"], "p1");
    }

    #[tokio::test]
    async fn test_push_sender_drops_when_full() {
        let (sender, mut rx) = create_push_channel(1);
        let event = RideEvent::PickupCompleted(PickupCompletedPayload {
            session_id: SessionId::from("s1"),
            ride_id: RideId::from("r1"),
            driver_id: UserId::from("d1"),
            message: "Pickup completed".to_string(),
            ts: epoch_ms(),
        });

        sender.publish(&UserId::from("p1"), event.clone());
        // Second publish exceeds the buffer and is silently dropped
        sender.publish(&UserId::from("p2"), event);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.user, UserId::from("p1"));
        assert!(rx.try_recv().is_err());
    }
}
