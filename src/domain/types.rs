//! Shared types for the ride-tracking service

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Newtype wrapper for user IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

/// Newtype wrapper for ride IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RideId(pub String);

impl std::fmt::Display for RideId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RideId {
    fn from(s: &str) -> Self {
        RideId(s.to_string())
    }
}

/// Newtype wrapper for tracking-session IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

/// A WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Latitude must be within [-90, 90] and longitude within [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance to another point in meters (haversine)
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// Lifecycle status of a tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Waiting,
    Started,
    InProgress,
    Completed,
    Cancelled,
    Emergency,
}

impl TrackingStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Waiting => "waiting",
            TrackingStatus::Started => "started",
            TrackingStatus::InProgress => "in_progress",
            TrackingStatus::Completed => "completed",
            TrackingStatus::Cancelled => "cancelled",
            TrackingStatus::Emergency => "emergency",
        }
    }

    /// Completed and cancelled sessions accept no further mutation
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackingStatus::Completed | TrackingStatus::Cancelled)
    }
}

/// Category of a triggered emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyKind {
    Accident,
    Harassment,
    Medical,
    Breakdown,
    Other,
}

impl EmergencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyKind::Accident => "accident",
            EmergencyKind::Harassment => "harassment",
            EmergencyKind::Medical => "medical",
            EmergencyKind::Breakdown => "breakdown",
            EmergencyKind::Other => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(12.9716, 77.5946).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_geo_point_distance() {
        let a = GeoPoint::new(12.9716, 77.5946);
        let b = GeoPoint::new(12.9716, 77.5946);
        assert!(a.distance_m(&b) < 0.01);

        // ~1 degree of latitude is ~111 km
        let c = GeoPoint::new(13.9716, 77.5946);
        let d = a.distance_m(&c);
        assert!((110_000.0..113_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_status_terminal() {
        assert!(TrackingStatus::Completed.is_terminal());
        assert!(TrackingStatus::Cancelled.is_terminal());
        assert!(!TrackingStatus::Started.is_terminal());
        assert!(!TrackingStatus::Emergency.is_terminal());
    }

    #[test]
    fn test_emergency_kind_wire_names() {
        assert_eq!(serde_json::to_value(EmergencyKind::Harassment).unwrap(), "harassment");
        let kind: EmergencyKind = serde_json::from_value("medical".into()).unwrap();
        assert_eq!(kind, EmergencyKind::Medical);
        assert!(serde_json::from_value::<EmergencyKind>("road_rage".into()).is_err());
    }

    #[test]
    fn test_uuid_v7_generation() {
        let a = new_uuid_v7();
        let b = new_uuid_v7();
        assert_eq!(a.len(), 36);
        assert_ne!(a, b);
    }
}
