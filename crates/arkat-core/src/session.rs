//! One-time tracking session configuration
//!
//! Builds the reference-target registry from a named image asset and hands a
//! tracking configuration to the session. Plane finding is always disabled
//! and the update mode always follows the latest camera image, since the
//! trigger decision is latency-sensitive.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::assets::{AssetError, AssetStore};
use crate::notify::Notifier;
use crate::target::{ReferenceTargetRegistry, RegistryError, RegistryLimits};
use crate::tracking::TargetIndex;

/// The tracking session refused a configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SessionRejected(pub String);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load reference image: {0}")]
    Asset(#[from] AssetError),
    #[error("Failed to decode reference image {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to add image to database: {0}")]
    Registry(#[from] RegistryError),
    #[error("Session rejected configuration: {0}")]
    SessionRejected(#[from] SessionRejected),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneFindingMode {
    #[default]
    Disabled,
    Horizontal,
    HorizontalAndVertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Each update reflects the most recent camera image
    #[default]
    LatestCameraImage,
    /// Updates wait for the next camera image
    Blocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    #[default]
    Auto,
    Fixed,
}

/// Configuration handed to the tracking session
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub plane_finding: PlaneFindingMode,
    pub update_mode: UpdateMode,
    pub focus_mode: FocusMode,
    /// Whether detected planes are visualized
    pub plane_renderer: bool,
    pub registry: Arc<ReferenceTargetRegistry>,
}

/// Tracking session that accepts a configuration
pub trait TrackingSession {
    fn configure(&mut self, config: &TrackingConfig) -> Result<(), SessionRejected>;
}

/// The reference target to register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Target name in the registry
    pub name: String,
    /// Asset name of the reference image
    pub image: String,
    /// Physical width of the printed image in meters
    pub width_m: f32,
}

/// Result of a successful configuration
#[derive(Debug, Clone)]
pub struct ConfiguredSession {
    pub index: TargetIndex,
    pub config: TrackingConfig,
}

impl ConfiguredSession {
    pub fn registry(&self) -> &ReferenceTargetRegistry {
        &self.config.registry
    }
}

/// Builds the registry and tracking configuration for a session
pub struct SessionConfigurator<A> {
    assets: A,
    limits: RegistryLimits,
    focus_mode: FocusMode,
}

impl<A: AssetStore> SessionConfigurator<A> {
    pub fn new(assets: A, limits: RegistryLimits) -> Self {
        Self {
            assets,
            limits,
            focus_mode: FocusMode::default(),
        }
    }

    pub fn with_focus_mode(mut self, focus_mode: FocusMode) -> Self {
        self.focus_mode = focus_mode;
        self
    }

    /// Register the target and configure the session
    pub fn configure<S: TrackingSession + ?Sized>(
        &self,
        session: &mut S,
        spec: &TargetSpec,
    ) -> Result<ConfiguredSession, ConfigError> {
        let bytes = self.assets.open(&spec.image)?;
        let image = image::load_from_memory(&bytes).map_err(|source| ConfigError::Decode {
            name: spec.image.clone(),
            source,
        })?;

        let mut registry = ReferenceTargetRegistry::new(self.limits);
        let index = registry.add_image(&spec.name, &image, spec.width_m)?;

        let config = TrackingConfig {
            plane_finding: PlaneFindingMode::Disabled,
            update_mode: UpdateMode::LatestCameraImage,
            focus_mode: self.focus_mode,
            plane_renderer: false,
            registry: Arc::new(registry),
        };
        session.configure(&config)?;

        info!(
            target_name = %spec.name,
            index = %index,
            focus = ?config.focus_mode,
            "Tracking session configured"
        );
        Ok(ConfiguredSession { index, config })
    }

    /// Configure, reporting any failure to the user instead of returning it
    pub fn configure_reporting<S: TrackingSession + ?Sized>(
        &self,
        session: &mut S,
        spec: &TargetSpec,
        notifier: &dyn Notifier,
    ) -> Option<ConfiguredSession> {
        match self.configure(session, spec) {
            Ok(configured) => Some(configured),
            Err(e) => {
                error!(error = %e, "Error setting up AR session");
                notifier.notify(&format!("Error setting up AR: {}", e));
                None
            }
        }
    }
}
