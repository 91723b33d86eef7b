//! Core domain + application logic for the YouTube upload notifier.
//!
//! This crate is framework-agnostic. The video provider and Telegram live
//! behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod monitor;
pub mod ports;
pub mod scheduler;
pub mod security;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};
