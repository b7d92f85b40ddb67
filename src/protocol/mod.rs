//! SOCKS5 Protocol Implementation
//!
//! Wire constants and types, method negotiation and request dispatch.

pub mod constants;
pub mod dispatcher;
pub mod negotiator;
pub mod types;

pub use constants::*;
pub use dispatcher::RequestDispatcher;
pub use negotiator::negotiate;
pub use types::*;
