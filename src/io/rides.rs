//! External collaborators: ride-lifecycle directory and SOS alerting
//!
//! The tracking core does not own ride records or trusted-contact
//! escalation. Both sit behind traits so the wiring can swap the
//! in-process implementations for real service clients.

use crate::domain::types::{RideId, UserId};
use crate::infra::error::{TrackingError, TrackingResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// A ride as known to the ride-lifecycle collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRecord {
    pub ride_id: RideId,
    pub driver_id: UserId,
    pub passenger_ids: Vec<UserId>,
    #[serde(default = "default_ride_status")]
    pub status: String,
}

fn default_ride_status() -> String {
    "active".to_string()
}

/// Ride-lifecycle collaborator
#[async_trait]
pub trait RideDirectory: Send + Sync {
    /// Look up a ride record by id
    async fn ride(&self, ride_id: &RideId) -> TrackingResult<RideRecord>;

    /// Mark the underlying ride completed once its tracking session ends
    async fn mark_completed(&self, ride_id: &RideId) -> TrackingResult<()>;
}

/// In-memory ride directory, seedable from a JSONL file
pub struct InMemoryRideDirectory {
    rides: RwLock<FxHashMap<RideId, RideRecord>>,
}

impl InMemoryRideDirectory {
    pub fn new() -> Self {
        Self { rides: RwLock::new(FxHashMap::default()) }
    }

    pub fn insert(&self, record: RideRecord) {
        self.rides.write().insert(record.ride_id.clone(), record);
    }

    /// Load ride records from a JSONL file (one record per line).
    /// Malformed lines are skipped with a warning.
    pub fn load_seed_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<usize> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut loaded = 0usize;
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RideRecord>(line) {
                Ok(record) => {
                    self.insert(record);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(line = lineno + 1, error = %e, "ride_seed_line_skipped");
                }
            }
        }
        info!(loaded = loaded, file = %path.as_ref().display(), "ride_seed_loaded");
        Ok(loaded)
    }
}

impl Default for InMemoryRideDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RideDirectory for InMemoryRideDirectory {
    async fn ride(&self, ride_id: &RideId) -> TrackingResult<RideRecord> {
        self.rides
            .read()
            .get(ride_id)
            .cloned()
            .ok_or_else(|| TrackingError::NotFound(format!("ride {ride_id}")))
    }

    async fn mark_completed(&self, ride_id: &RideId) -> TrackingResult<()> {
        let mut rides = self.rides.write();
        let record = rides
            .get_mut(ride_id)
            .ok_or_else(|| TrackingError::NotFound(format!("ride {ride_id}")))?;
        record.status = "completed".to_string();
        Ok(())
    }
}

/// Out-of-band emergency escalation (trusted contacts / SOS services).
/// Invoked as a side effect after the in-app fan-out; its outcome never
/// affects the tracking state machine.
#[async_trait]
pub trait SosAlerter: Send + Sync {
    async fn alert(&self, ride_id: &RideId, triggered_by: &UserId, kind: &str);
}

/// Alerter that records the escalation in the log stream only.
/// Stands in for the trusted-contacts service client.
pub struct LogSosAlerter;

#[async_trait]
impl SosAlerter for LogSosAlerter {
    async fn alert(&self, ride_id: &RideId, triggered_by: &UserId, kind: &str) {
        info!(
            ride_id = %ride_id,
            triggered_by = %triggered_by,
            kind = %kind,
            "sos_escalation_dispatched"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(id: &str) -> RideRecord {
        RideRecord {
            ride_id: RideId::from(id),
            driver_id: UserId::from("d1"),
            passenger_ids: vec![UserId::from("p1")],
            status: "active".to_string(),
        }
    }

    #[tokio::test]
    async fn test_lookup_and_complete() {
        let dir = InMemoryRideDirectory::new();
        dir.insert(record("r1"));

        let ride = dir.ride(&RideId::from("r1")).await.unwrap();
        assert_eq!(ride.driver_id, UserId::from("d1"));
        assert_eq!(ride.status, "active");

        dir.mark_completed(&RideId::from("r1")).await.unwrap();
        let ride = dir.ride(&RideId::from("r1")).await.unwrap();
        assert_eq!(ride.status, "completed");
    }

    #[tokio::test]
    async fn test_missing_ride_is_not_found() {
        let dir = InMemoryRideDirectory::new();
        let err = dir.ride(&RideId::from("nope")).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_seed_file_skips_malformed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"ride_id":"r1","driver_id":"d1","passenger_ids":["p1","p2"]}}"#
        )
        .unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(
            file,
            r#"{{"ride_id":"r2","driver_id":"d2","passenger_ids":[]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let dir = InMemoryRideDirectory::new();
        let loaded = dir.load_seed_file(file.path()).unwrap();
        assert_eq!(loaded, 2);
    }
}
