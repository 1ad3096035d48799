//! Overlay lifecycle management
//!
//! The manager exclusively owns every overlay's anchor, scene nodes and
//! playback resource. It creates them when a target triggers and tears them
//! down when the host goes to the background or is destroyed. Teardown runs
//! in a fixed order: stop playback, detach nodes, release the anchor.

use arkat_core::{Notifier, SpawnRequest, TargetIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::material::{ChromaKey, ChromaKeyMaterial};
use crate::playback::{PlaybackError, PlaybackHandle, PlaybackId, PlaybackRegistry};
use crate::scene::{Anchor, NodeId, NodeKind, SceneError, SceneGraph};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    #[error("Unable to load material: {0}")]
    Material(String),
    #[error("Unable to open media {media}: {reason}")]
    Media { media: String, reason: String },
    #[error("Overlay already exists for target {0}")]
    AlreadySpawned(TargetIndex),
    #[error("Host has been destroyed")]
    HostDestroyed,
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("Failed to start playback: {0}")]
    Playback(#[from] PlaybackError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Media asset played on the overlay
    #[serde(default = "default_media")]
    pub media: String,
    #[serde(default)]
    pub chroma_key: ChromaKey,
    /// Local scale of the video node relative to its native size
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    #[serde(default = "default_true")]
    pub looping: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            media: default_media(),
            chroma_key: ChromaKey::default(),
            scale: default_scale(),
            looping: true,
        }
    }
}

fn default_media() -> String {
    "oiia.mp4".to_string()
}

fn default_scale() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

fn default_true() -> bool {
    true
}

/// Rendering-side services needed to build an overlay
pub trait OverlayBackend {
    type Playback: PlaybackHandle;

    /// Build the chroma-key material for a media stream
    fn build_material(
        &self,
        media: &str,
        key: ChromaKey,
    ) -> impl Future<Output = Result<ChromaKeyMaterial, OverlayError>>;

    fn open_playback(&self, media: &str) -> Result<Self::Playback, OverlayError>;
}

/// One anchored overlay: anchor → transformable node → video node
#[derive(Debug)]
pub struct OverlayInstance {
    target: TargetIndex,
    anchor: Anchor,
    anchor_node: NodeId,
    transform_node: NodeId,
    video_node: NodeId,
    playback: PlaybackId,
}

impl OverlayInstance {
    pub fn target(&self) -> TargetIndex {
        self.target
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn anchor_node(&self) -> NodeId {
        self.anchor_node
    }

    pub fn transform_node(&self) -> NodeId {
        self.transform_node
    }

    pub fn video_node(&self) -> NodeId {
        self.video_node
    }

    pub fn playback(&self) -> PlaybackId {
        self.playback
    }
}

pub struct OverlayLifecycleManager<B: OverlayBackend> {
    backend: B,
    settings: OverlaySettings,
    scene: SceneGraph,
    playbacks: PlaybackRegistry<B::Playback>,
    overlays: BTreeMap<TargetIndex, OverlayInstance>,
    notifier: Arc<dyn Notifier>,
    destroyed: bool,
}

impl<B: OverlayBackend> OverlayLifecycleManager<B> {
    pub fn new(backend: B, settings: OverlaySettings, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            settings,
            scene: SceneGraph::new(),
            playbacks: PlaybackRegistry::new(),
            overlays: BTreeMap::new(),
            notifier,
            destroyed: false,
        }
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn playbacks(&self) -> &PlaybackRegistry<B::Playback> {
        &self.playbacks
    }

    pub fn overlay(&self, target: TargetIndex) -> Option<&OverlayInstance> {
        self.overlays.get(&target)
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Create the overlay for a triggered target
    ///
    /// Construction failures are reported to the user and leave no partial
    /// overlay behind. The target is not retried.
    pub async fn spawn(&mut self, request: &SpawnRequest) -> Result<&OverlayInstance, OverlayError> {
        if self.destroyed {
            warn!(target_index = %request.index, "Spawn requested after host destroy");
            return Err(OverlayError::HostDestroyed);
        }
        if self.overlays.contains_key(&request.index) {
            warn!(target_index = %request.index, "Overlay already exists");
            return Err(OverlayError::AlreadySpawned(request.index));
        }

        match self.construct(request).await {
            Ok(instance) => {
                info!(
                    target_index = %request.index,
                    anchor = %instance.anchor.id(),
                    playback = %instance.playback,
                    "Overlay spawned"
                );
                Ok(self.overlays.entry(request.index).or_insert(instance))
            }
            Err(e) => {
                error!(target_index = %request.index, error = %e, "Failed to build overlay");
                match &e {
                    OverlayError::Material(_) => self.notifier.notify("Unable to load material"),
                    other => self
                        .notifier
                        .notify(&format!("Unable to create overlay: {}", other)),
                }
                Err(e)
            }
        }
    }

    async fn construct(&mut self, request: &SpawnRequest) -> Result<OverlayInstance, OverlayError> {
        let material = self
            .backend
            .build_material(&self.settings.media, self.settings.chroma_key)
            .await?;

        let mut playback = self.backend.open_playback(&self.settings.media)?;
        playback.set_looping(self.settings.looping);
        if let Err(e) = playback.start() {
            discard_playback(&mut playback);
            return Err(e.into());
        }

        let anchor = Anchor::new(request.pose);
        let anchor_node = self.scene.add_root(NodeKind::Anchor { anchor: anchor.id() });
        let (transform_node, video_node) = match self.attach_nodes(anchor_node, material) {
            Ok(nodes) => nodes,
            Err(e) => {
                if let Err(detach_err) = self.scene.detach(anchor_node) {
                    warn!(error = %detach_err, "Error detaching partial overlay");
                }
                discard_playback(&mut playback);
                return Err(e.into());
            }
        };

        let playback = self.playbacks.register(playback);
        Ok(OverlayInstance {
            target: request.index,
            anchor,
            anchor_node,
            transform_node,
            video_node,
            playback,
        })
    }

    fn attach_nodes(
        &mut self,
        anchor_node: NodeId,
        material: ChromaKeyMaterial,
    ) -> Result<(NodeId, NodeId), SceneError> {
        let transform_node = self
            .scene
            .add_child(anchor_node, NodeKind::Transformable { selected: true })?;
        let video_node = self
            .scene
            .add_child(transform_node, NodeKind::Video { material })?;

        // Keyed video must stay out of the shadow pass
        let video = self
            .scene
            .get_mut(video_node)
            .ok_or(SceneError::UnknownNode(video_node))?;
        video.local_scale = self.settings.scale;
        video.cast_shadows = false;
        video.receive_shadows = false;

        Ok((transform_node, video_node))
    }

    /// Pause every playback resource; returns how many paused cleanly
    pub fn on_host_background(&mut self) -> usize {
        let total = self.playbacks.len();
        let paused = self.playbacks.pause_all();
        info!(paused, total, "Host moved to background");
        paused
    }

    /// Release every playback resource and tear down all overlays
    pub fn on_host_destroy(&mut self) {
        let released = self.playbacks.release_all();

        let overlays = std::mem::take(&mut self.overlays);
        for (target, mut overlay) in overlays {
            if let Err(e) = self.scene.detach(overlay.anchor_node) {
                warn!(target_index = %target, error = %e, "Error detaching overlay nodes");
            }
            overlay.anchor.detach();
            debug!(target_index = %target, anchor = %overlay.anchor.id(), "Overlay torn down");
        }

        if !self.destroyed {
            info!(released, "Host destroyed, overlay resources released");
        }
        self.destroyed = true;
    }
}

/// Stop and release a playback that never made it into the registry
fn discard_playback<P: PlaybackHandle>(playback: &mut P) {
    if let Err(e) = playback.stop() {
        warn!(error = %e, "Error stopping discarded playback");
    }
    if let Err(e) = playback.release() {
        warn!(error = %e, "Error releasing discarded playback");
    }
}
