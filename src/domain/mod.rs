//! Domain models - core business types and the tracking-session model
//!
//! This module contains the canonical data types used throughout the system:
//! - `TrackingSession` - the primary business entity for one ride's live tracking
//! - `LocationSample` - one accepted driver position report
//! - `EmergencyDetails` - origin of an emergency episode
//! - `TrackingStatus` / `EmergencyKind` - lifecycle classifications

pub mod session;
pub mod types;
