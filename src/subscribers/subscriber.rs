//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] an extension point for plugging custom event handlers into the runtime.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::SubscriberPanicked`)
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use async_trait::async_trait;
//! use linkvisor::{Event, EventKind, Subscribe};
//!
//! /// Connection status indicator.
//! #[derive(Default)]
//! struct StatusLight {
//!     on: AtomicBool,
//! }
//!
//! #[async_trait]
//! impl Subscribe for StatusLight {
//!     async fn on_event(&self, ev: &Event) {
//!         match ev.kind {
//!             EventKind::Connected => self.on.store(true, Ordering::Relaxed),
//!             EventKind::Disconnected => self.on.store(false, Ordering::Relaxed),
//!             _ => {}
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "status-light" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability and presentation.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this subscriber's queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, not in the publisher context.
    /// Events are delivered in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// On overflow the new event is dropped for this subscriber only and an
    /// `EventKind::SubscriberOverflow` is published. Clamped to a minimum of 1.
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
