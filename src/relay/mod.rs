//! Data Relay Module
//!
//! Handles bidirectional data relay between client and destination.

pub mod engine;
pub mod stats;

pub use engine::{relay, DEFAULT_BUFFER_SIZE};
pub use stats::RelayStats;
