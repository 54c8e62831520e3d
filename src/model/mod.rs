//! Core data types for scan requests, scan results and quota snapshots.
//!
//! This module contains the types shared by every context of linkscan:
//!
//! - [`ScanMode`] - Quick reputation lookup or enhanced (deep) analysis
//! - [`ScanRequest`] - One user-triggered scan, tagged with a [`CycleId`]
//! - [`ScanResult`] - The JSON payload returned by the scanning API
//! - [`ThreatLevel`] - The verdict derived from engine statistics
//! - [`RateLimitInfo`] - Per-minute, daily and monthly quota counters
//!
//! # Example
//!
//! ```
//! use linkscan::model::{EngineStats, ThreatLevel};
//!
//! let stats = EngineStats { malicious: 0, suspicious: 2, harmless: 60, undetected: 8 };
//! assert_eq!(stats.threat_level(), ThreatLevel::Suspicious);
//! ```

mod rate_limit;
mod scan;

pub use rate_limit::*;
pub use scan::*;
