//! Pluggable off-route deviation detection
//!
//! Location ingest runs the configured detector on every accepted sample.
//! The default implementation never flags anything; a geometry-based
//! detector can be swapped in without touching ingest logic.

use crate::domain::session::TrackingSession;

/// Outcome of a deviation check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteDeviation {
    pub off_route: bool,
    pub distance_m: f64,
}

impl RouteDeviation {
    pub const ON_ROUTE: RouteDeviation = RouteDeviation { off_route: false, distance_m: 0.0 };
}

/// Strategy seam for off-route detection
pub trait DeviationDetector: Send + Sync {
    /// Inspect the current location against the planned route
    fn check(&self, session: &TrackingSession) -> RouteDeviation;
}

/// Default detector: never reports a deviation
pub struct NoopDetector;

impl DeviationDetector for NoopDetector {
    fn check(&self, _session: &TrackingSession) -> RouteDeviation {
        RouteDeviation::ON_ROUTE
    }
}

/// Flags the driver as off-route when the current location is farther
/// than `threshold_m` from every planned waypoint. A session with no
/// planned route is always on-route.
pub struct WaypointRadiusDetector {
    threshold_m: f64,
}

impl WaypointRadiusDetector {
    pub fn new(threshold_m: f64) -> Self {
        Self { threshold_m }
    }
}

impl DeviationDetector for WaypointRadiusDetector {
    fn check(&self, session: &TrackingSession) -> RouteDeviation {
        if session.planned_route.is_empty() {
            return RouteDeviation::ON_ROUTE;
        }

        let nearest = session
            .planned_route
            .iter()
            .map(|w| session.current_location.distance_m(&w.location))
            .fold(f64::INFINITY, f64::min);

        RouteDeviation { off_route: nearest > self.threshold_m, distance_m: nearest }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::RouteWaypoint;
    use crate::domain::types::{GeoPoint, RideId, UserId};
    use smallvec::smallvec;

    fn session_at(lat: f64, lon: f64) -> TrackingSession {
        TrackingSession::start(
            RideId::from("r1"),
            UserId::from("d1"),
            smallvec![UserId::from("p1")],
            GeoPoint::new(lat, lon),
            None,
        )
    }

    #[test]
    fn test_noop_never_flags() {
        let s = session_at(12.9, 77.6);
        let result = NoopDetector.check(&s);
        assert!(!result.off_route);
        assert_eq!(result.distance_m, 0.0);
    }

    #[test]
    fn test_radius_detector_no_route_is_on_route() {
        let s = session_at(12.9, 77.6);
        assert!(!WaypointRadiusDetector::new(100.0).check(&s).off_route);
    }

    #[test]
    fn test_radius_detector_flags_far_position() {
        let mut s = session_at(12.9, 77.6);
        // Waypoint roughly 111 km north of the driver
        s.planned_route.push(RouteWaypoint { location: GeoPoint::new(13.9, 77.6), label: None });

        let result = WaypointRadiusDetector::new(500.0).check(&s);
        assert!(result.off_route);
        assert!(result.distance_m > 100_000.0);
    }

    #[test]
    fn test_radius_detector_accepts_near_position() {
        let mut s = session_at(12.9, 77.6);
        s.planned_route.push(RouteWaypoint { location: GeoPoint::new(12.9001, 77.6), label: None });

        let result = WaypointRadiusDetector::new(500.0).check(&s);
        assert!(!result.off_route);
        assert!(result.distance_m < 50.0);
    }
}
