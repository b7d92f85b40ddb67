//! Connection Management Module
//!
//! Handles TCP connection acceptance and session lifecycle.

pub mod manager;

pub use manager::ConnectionManager;
