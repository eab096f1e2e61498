//! # Event subscribers for the linkvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Worker/Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                                   │
//!                                                   ┌───────────────┼──────────────┐
//!                                                   ▼               ▼              ▼
//!                                               LogWriter   status indicator    metrics
//! ```
//!
//! The presentation collaborator (a tray icon, a notification) is just another
//! subscriber reacting to `Connected`/`Disconnected`. A slow or panicking
//! subscriber can never stall or break the connection logic.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
