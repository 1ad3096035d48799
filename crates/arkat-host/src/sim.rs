//! Headless stand-ins for the platform's scene, tracking session and media stack

use arkat_core::{AssetStore, PlaneFindingMode, SessionRejected, TrackingConfig, TrackingSession};
use arkat_overlay::{ChromaKey, ChromaKeyMaterial, HeadlessPlayback, OverlayBackend, OverlayError};
use arkat_session::ReadinessProbe;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info};

/// Scene that becomes constructible after a fixed number of checks
#[derive(Debug)]
pub struct SimulatedReadiness {
    checks: AtomicU32,
    ready_after: u32,
}

impl SimulatedReadiness {
    pub fn new(ready_after: u32) -> Self {
        Self {
            checks: AtomicU32::new(0),
            ready_after,
        }
    }
}

impl ReadinessProbe for SimulatedReadiness {
    fn is_ready(&self) -> bool {
        let checks = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(checks, ready_after = self.ready_after, "Scene readiness check");
        checks >= self.ready_after
    }
}

/// Tracking session that records the configuration it accepts
#[derive(Debug, Default)]
pub struct ScriptedSession {
    config: Option<TrackingConfig>,
}

impl ScriptedSession {
    pub fn config(&self) -> Option<&TrackingConfig> {
        self.config.as_ref()
    }
}

impl TrackingSession for ScriptedSession {
    fn configure(&mut self, config: &TrackingConfig) -> Result<(), SessionRejected> {
        if config.registry.is_empty() {
            return Err(SessionRejected("image database is empty".to_string()));
        }
        if config.plane_finding != PlaneFindingMode::Disabled {
            return Err(SessionRejected(
                "plane finding is not supported by the headless session".to_string(),
            ));
        }
        info!(
            targets = config.registry.len(),
            update_mode = ?config.update_mode,
            "Headless session configured"
        );
        self.config = Some(config.clone());
        Ok(())
    }
}

/// Overlay backend that resolves media from the asset store
pub struct HeadlessBackend<A> {
    assets: A,
}

impl<A: AssetStore> HeadlessBackend<A> {
    pub fn new(assets: A) -> Self {
        Self { assets }
    }
}

impl<A: AssetStore> OverlayBackend for HeadlessBackend<A> {
    type Playback = HeadlessPlayback;

    async fn build_material(
        &self,
        media: &str,
        key: ChromaKey,
    ) -> Result<ChromaKeyMaterial, OverlayError> {
        if !self.assets.exists(media) {
            return Err(OverlayError::Material(format!("media asset {} not found", media)));
        }
        Ok(ChromaKeyMaterial {
            media: media.to_string(),
            key,
        })
    }

    fn open_playback(&self, media: &str) -> Result<HeadlessPlayback, OverlayError> {
        self.assets
            .open(media)
            .map_err(|e| OverlayError::Media {
                media: media.to_string(),
                reason: e.to_string(),
            })?;
        Ok(HeadlessPlayback::new(media))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkat_core::{DirAssetStore, ReferenceTargetRegistry};
    use arkat_core::{FocusMode, UpdateMode};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_simulated_readiness() {
        let probe = SimulatedReadiness::new(3);
        assert!(!probe.is_ready());
        assert!(!probe.is_ready());
        assert!(probe.is_ready());
        assert!(probe.is_ready());
    }

    #[test]
    fn test_session_rejects_empty_database() {
        let mut session = ScriptedSession::default();
        let config = TrackingConfig {
            plane_finding: PlaneFindingMode::Disabled,
            update_mode: UpdateMode::LatestCameraImage,
            focus_mode: FocusMode::Auto,
            plane_renderer: false,
            registry: Arc::new(ReferenceTargetRegistry::default()),
        };
        assert!(session.configure(&config).is_err());
        assert!(session.config().is_none());
    }

    #[tokio::test]
    async fn test_backend_requires_media_asset() {
        let dir = TempDir::new().unwrap();
        let backend = HeadlessBackend::new(DirAssetStore::new(dir.path()));
        assert!(matches!(
            backend.build_material("oiia.mp4", ChromaKey::GREEN).await,
            Err(OverlayError::Material(_))
        ));
        assert!(matches!(
            backend.open_playback("oiia.mp4"),
            Err(OverlayError::Media { .. })
        ));

        std::fs::write(dir.path().join("oiia.mp4"), b"video").unwrap();
        let material = backend.build_material("oiia.mp4", ChromaKey::GREEN).await.unwrap();
        assert_eq!(material.key, ChromaKey::GREEN);
        assert_eq!(backend.open_playback("oiia.mp4").unwrap().media(), "oiia.mp4");
    }
}
