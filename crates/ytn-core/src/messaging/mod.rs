//! Outbound messaging abstractions (Telegram behind a port).

pub mod port;
pub mod throttled;
pub mod types;
