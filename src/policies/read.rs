//! # Read-loop post-read action.
//!
//! [`ReadAction`] determines what a worker does with each inbound chunk.
//!
//! - [`ReadAction::Echo`] writes the chunk back to the peer (default). Useful
//!   against a plain `nc` listener or any echo-style test harness.
//! - [`ReadAction::Discard`] drops the chunk. Only liveness matters.
//!
//! Either way, every chunk refreshes the worker's last-communication instant.

/// What the read loop does with each received chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadAction {
    /// Relay every received chunk back out the same socket.
    #[default]
    Echo,
    /// Consume and drop received bytes.
    Discard,
}

impl ReadAction {
    /// Returns `true` if received chunks are written back to the peer.
    #[inline]
    pub fn echoes(self) -> bool {
        matches!(self, ReadAction::Echo)
    }
}
