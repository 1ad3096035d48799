//! Arkat Session - Waiting for the rendering session to become configurable
//!
//! Readiness is polled on a background tokio task, separate from frame
//! processing, and cancelled through a `CancellationToken` when the host is
//! torn down first.

pub mod readiness;

pub use readiness::{Ready, ReadinessProbe, ReadinessWaiter, WaitOutcome};
pub use tokio_util::sync::CancellationToken;
