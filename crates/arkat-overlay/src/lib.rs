//! Arkat Overlay - Anchored chroma-key overlays and their resource lifecycle
//!
//! This crate owns everything created when a target triggers:
//! - Chroma-key materials for the video surface
//! - The scene graph (anchor → transformable node → video node)
//! - Playback handles and the registry used for bulk pause/release
//! - The lifecycle manager reacting to host background/destroy signals

pub mod lifecycle;
pub mod material;
pub mod playback;
pub mod scene;

pub use lifecycle::{
    OverlayBackend, OverlayError, OverlayInstance, OverlayLifecycleManager, OverlaySettings,
};
pub use material::{ChromaKey, ChromaKeyMaterial};
pub use playback::{
    HeadlessPlayback, PlaybackError, PlaybackHandle, PlaybackId, PlaybackRegistry, PlaybackState,
};
pub use scene::{Anchor, Node, NodeId, NodeKind, SceneError, SceneGraph};
