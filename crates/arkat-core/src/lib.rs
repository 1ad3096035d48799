//! Arkat Core - Tracking data model, session setup and trigger state machine
//!
//! This crate provides the frame-synchronous side of Arkat:
//! - Tracking events and poses delivered by the tracking subsystem
//! - Reference-target registry with image validation
//! - One-time session configuration from a named reference image
//! - Per-target one-shot trigger and the per-frame update processor

pub mod assets;
pub mod notify;
pub mod session;
pub mod target;
pub mod tracking;
pub mod trigger;

pub use assets::{AssetError, AssetStore, DirAssetStore};
pub use notify::{LogNotifier, Notifier};
pub use session::{
    ConfigError, ConfiguredSession, FocusMode, PlaneFindingMode, SessionConfigurator,
    SessionRejected, TargetSpec, TrackingConfig, TrackingSession, UpdateMode,
};
pub use target::{ReferenceTarget, ReferenceTargetRegistry, RegistryError, RegistryLimits};
pub use tracking::{FrameError, Pose, TargetIndex, TrackingEvent, TrackingState};
pub use trigger::{SpawnRequest, TargetObservation, TrackingUpdateProcessor, TriggerState, TriggerTable};
