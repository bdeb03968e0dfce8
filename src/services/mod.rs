//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `tracking` - Tracking session lifecycle orchestrator
//! - `store` - In-memory session store with atomic mutation
//! - `deviation` - Route deviation detection strategies
//! - `sweeper` - Background retention sweep for terminal sessions

pub mod deviation;
pub mod store;
pub mod sweeper;
pub mod tracking;

// Re-export commonly used types
pub use deviation::{DeviationDetector, NoopDetector, RouteDeviation, WaypointRadiusDetector};
pub use store::TrackingStore;
pub use tracking::TrackingService;
