//! Runtime core: connection lifecycle and its control plane.
//!
//! The public API of this module is [`Supervisor`] (built through
//! [`SupervisorBuilder`] and driven through [`SupervisorHandle`]) plus the
//! [`ConnectionWorker`] identity types that show up in events and status.
//!
//! Internal modules:
//! - [`worker`]: owns one socket from connect to teardown and reports its outcome;
//! - [`supervisor`]: mailbox actor deciding when workers are created, retried or torn down;
//! - [`handle`]: cloneable command surface with completion acks;
//! - [`builder`]: wires collaborators and spawns the supervisor loop.

mod builder;
mod handle;
mod supervisor;
mod worker;

pub use builder::SupervisorBuilder;
pub use handle::SupervisorHandle;
pub use supervisor::{Supervisor, SupervisorStatus};
pub use worker::{ConnectionWorker, Outcome, WorkerId};

#[cfg(test)]
pub(crate) use worker::WorkerContext;
