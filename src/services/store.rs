//! Tracking store - shared session state and the per-ride uniqueness rule
//!
//! The store is the only shared mutable resource. Every mutation runs as
//! one closure under a single write-lock acquisition, so the location
//! history append and the current-location overwrite commit together, and
//! status transitions are linearized per session.

use crate::domain::session::TrackingSession;
use crate::domain::types::{epoch_ms, RideId, SessionId, TrackingStatus, UserId};
use crate::infra::error::{TrackingError, TrackingResult};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

struct StoreInner {
    sessions: FxHashMap<SessionId, TrackingSession>,
    /// Unique index: at most one session id per ride
    by_ride: FxHashMap<RideId, SessionId>,
}

/// Shared, concurrently mutated record of tracking sessions
pub struct TrackingStore {
    inner: RwLock<StoreInner>,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                sessions: FxHashMap::default(),
                by_ride: FxHashMap::default(),
            }),
        }
    }

    /// Insert a freshly started session, enforcing one non-terminal
    /// session per ride.
    ///
    /// A `waiting` or terminal predecessor is superseded (its record is
    /// replaced); anything else is a `Conflict` and the stored session is
    /// left untouched.
    pub fn insert_for_ride(&self, session: TrackingSession) -> TrackingResult<()> {
        let mut inner = self.inner.write();

        if let Some(existing_id) = inner.by_ride.get(&session.ride_id).cloned() {
            let supersedable = inner
                .sessions
                .get(&existing_id)
                .map(|s| s.status == TrackingStatus::Waiting || s.status.is_terminal())
                // Dangling index entry: treat as supersedable
                .unwrap_or(true);

            if !supersedable {
                return Err(TrackingError::Conflict(format!(
                    "ride {} already has an active tracking session",
                    session.ride_id
                )));
            }
            inner.sessions.remove(&existing_id);
            debug!(ride_id = %session.ride_id, superseded = %existing_id, "session_superseded");
        }

        inner.by_ride.insert(session.ride_id.clone(), session.id.clone());
        inner.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Snapshot of one session
    pub fn get(&self, id: &SessionId) -> Option<TrackingSession> {
        self.inner.read().sessions.get(id).cloned()
    }

    /// Snapshot of the session owning a ride, if any
    pub fn find_by_ride(&self, ride_id: &RideId) -> Option<TrackingSession> {
        let inner = self.inner.read();
        let id = inner.by_ride.get(ride_id)?;
        inner.sessions.get(id).cloned()
    }

    /// Run one atomic read-modify-write against a session.
    ///
    /// The closure executes under the write lock; if it returns an error
    /// no other caller observes a partial update (closures must mutate
    /// only after their own validation passes).
    pub fn mutate<T>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut TrackingSession) -> TrackingResult<T>,
    ) -> TrackingResult<T> {
        let mut inner = self.inner.write();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| TrackingError::NotFound(format!("tracking session {id}")))?;
        f(session)
    }

    /// All non-terminal sessions where the user is driver or passenger
    pub fn active_for_user(&self, user: &UserId) -> Vec<TrackingSession> {
        let inner = self.inner.read();
        let mut out: Vec<TrackingSession> = inner
            .sessions
            .values()
            .filter(|s| !s.status.is_terminal() && s.is_participant(user))
            .cloned()
            .collect();
        // UUIDv7 ids are time-sortable, so this orders by creation
        out.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        out
    }

    /// Remove terminal sessions older than the retention window.
    /// Returns the number of sessions removed.
    pub fn sweep_terminal(&self, retention_ms: u64) -> usize {
        let now = epoch_ms();
        let mut inner = self.inner.write();

        let expired: Vec<SessionId> = inner
            .sessions
            .values()
            .filter_map(|s| {
                let terminal_at = s.terminal_at()?;
                (terminal_at.saturating_add(retention_ms) <= now).then(|| s.id.clone())
            })
            .collect();

        for id in &expired {
            if let Some(session) = inner.sessions.remove(id) {
                // Only drop the index entry if it still points at us
                if inner.by_ride.get(&session.ride_id) == Some(id) {
                    inner.by_ride.remove(&session.ride_id);
                }
                info!(session_id = %id, ride_id = %session.ride_id, "session_swept");
            }
        }
        expired.len()
    }

    /// Number of stored sessions (terminal included)
    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().sessions.is_empty()
    }
}

impl Default for TrackingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::LocationSample;
    use crate::domain::types::GeoPoint;
    use smallvec::smallvec;

    fn started(ride: &str) -> TrackingSession {
        TrackingSession::start(
            RideId::from(ride),
            UserId::from("d1"),
            smallvec![UserId::from("p1")],
            GeoPoint::new(12.9, 77.6),
            None,
        )
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = TrackingStore::new();
        let session = started("r1");
        let id = session.id.clone();

        store.insert_for_ride(session).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_some());
        assert_eq!(store.find_by_ride(&RideId::from("r1")).unwrap().id, id);
    }

    #[test]
    fn test_second_active_session_conflicts() {
        let store = TrackingStore::new();
        let first = started("r1");
        let first_id = first.id.clone();
        store.insert_for_ride(first).unwrap();

        let err = store.insert_for_ride(started("r1")).unwrap_err();
        assert_eq!(err.kind(), "conflict");

        // Stored session unchanged by the rejected insert
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_ride(&RideId::from("r1")).unwrap().id, first_id);
    }

    #[test]
    fn test_terminal_session_is_superseded() {
        let store = TrackingStore::new();
        let mut first = started("r1");
        first.mark_completed();
        let first_id = first.id.clone();
        store.insert_for_ride(first).unwrap();

        let second = started("r1");
        let second_id = second.id.clone();
        store.insert_for_ride(second).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get(&first_id).is_none());
        assert_eq!(store.find_by_ride(&RideId::from("r1")).unwrap().id, second_id);
    }

    #[test]
    fn test_mutate_commits_append_and_overwrite_together() {
        let store = TrackingStore::new();
        let session = started("r1");
        let id = session.id.clone();
        store.insert_for_ride(session).unwrap();

        store
            .mutate(&id, |s| {
                s.record_sample(LocationSample {
                    location: GeoPoint::new(13.0, 77.7),
                    ts: epoch_ms(),
                    speed_kmh: None,
                    heading_deg: None,
                });
                Ok(())
            })
            .unwrap();

        let s = store.get(&id).unwrap();
        assert_eq!(s.location_history.len(), 2);
        assert_eq!(s.current_location, GeoPoint::new(13.0, 77.7));
    }

    #[test]
    fn test_mutate_missing_session() {
        let store = TrackingStore::new();
        let err = store.mutate(&SessionId::from("nope"), |_| Ok(())).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_active_for_user_excludes_terminal_and_strangers() {
        let store = TrackingStore::new();
        store.insert_for_ride(started("r1")).unwrap();

        let mut done = started("r2");
        done.mark_completed();
        store.insert_for_ride(done).unwrap();

        let active = store.active_for_user(&UserId::from("p1"));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].ride_id, RideId::from("r1"));

        assert!(store.active_for_user(&UserId::from("stranger")).is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired_terminal() {
        let store = TrackingStore::new();

        let mut old = started("r1");
        old.mark_completed();
        old.completed_at = Some(epoch_ms() - 10_000);
        store.insert_for_ride(old).unwrap();

        let mut fresh = started("r2");
        fresh.mark_completed();
        store.insert_for_ride(fresh).unwrap();

        store.insert_for_ride(started("r3")).unwrap();

        let removed = store.sweep_terminal(5_000);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
        assert!(store.find_by_ride(&RideId::from("r1")).is_none());
        assert!(store.find_by_ride(&RideId::from("r2")).is_some());
        assert!(store.find_by_ride(&RideId::from("r3")).is_some());
    }
}
