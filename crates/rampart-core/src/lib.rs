//! Core infrastructure for rampart.
//!
//! This crate provides shared functionality used across all rampart guards:
//! - Event traits and the per-instance event bus
//! - A bounded circular event consumer for inspection
//! - The configuration error type raised by builders

pub mod consumer;
pub mod error;
pub mod events;

pub use consumer::CircularEventConsumer;
pub use error::ConfigError;
pub use events::{EventBus, EventListener, FnListener, GuardEvent, Subscription};
