//! Configuration loading and validation

use anyhow::{bail, Result};
use arkat_core::{FocusMode, RegistryLimits, TargetSpec};
use arkat_overlay::OverlaySettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub overlay: OverlaySettings,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Readiness poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Polls before the simulated scene reports ready
    #[serde(default = "default_ready_after_polls")]
    pub ready_after_polls: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            ready_after_polls: default_ready_after_polls(),
        }
    }
}

fn default_poll_interval() -> u64 {
    500
}

fn default_ready_after_polls() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Name of the reference target
    #[serde(default = "default_target_name")]
    pub name: String,
    /// Reference image asset
    #[serde(default = "default_target_image")]
    pub image: String,
    /// Physical width of the printed image in meters
    #[serde(default = "default_target_width")]
    pub width_m: f32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: default_target_name(),
            image: default_target_image(),
            width_m: default_target_width(),
        }
    }
}

fn default_target_name() -> String {
    "card".to_string()
}

fn default_target_image() -> String {
    "card.jpg".to_string()
}

fn default_target_width() -> f32 {
    0.13 // 13 cm
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_max_targets")]
    pub max_targets: usize,
    /// Minimum shorter side of a reference image in pixels
    #[serde(default = "default_min_dimension")]
    pub min_image_dimension: u32,
    #[serde(default = "default_min_feature_density")]
    pub min_feature_density: f32,
    #[serde(default)]
    pub focus_mode: FocusMode,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_targets: default_max_targets(),
            min_image_dimension: default_min_dimension(),
            min_feature_density: default_min_feature_density(),
            focus_mode: FocusMode::default(),
        }
    }
}

fn default_max_targets() -> usize {
    RegistryLimits::default().max_targets
}

fn default_min_dimension() -> u32 {
    RegistryLimits::default().min_dimension
}

fn default_min_feature_density() -> f32 {
    RegistryLimits::default().min_feature_density
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Directory holding reference images and overlay media
    #[serde(default = "default_assets_path")]
    pub path: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            path: default_assets_path(),
        }
    }
}

fn default_assets_path() -> String {
    "./assets".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Delay between replayed frames in milliseconds
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
        }
    }
}

fn default_frame_interval() -> u64 {
    33 // ~30 fps
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.session.poll_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.replay.frame_interval_ms)
    }

    pub fn registry_limits(&self) -> RegistryLimits {
        RegistryLimits {
            max_targets: self.tracking.max_targets,
            min_dimension: self.tracking.min_image_dimension,
            min_feature_density: self.tracking.min_feature_density,
        }
    }

    /// Reject values the runtime cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.session.poll_interval_ms == 0 {
            bail!("session.poll_interval_ms must be greater than zero");
        }
        if self.replay.frame_interval_ms == 0 {
            bail!("replay.frame_interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn target_spec(&self) -> TargetSpec {
        TargetSpec {
            name: self.target.name.clone(),
            image: self.target.image.clone(),
            width_m: self.target.width_m,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}
