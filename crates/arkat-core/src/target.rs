//! Reference-target registry
//!
//! The registry holds every reference image the tracking subsystem searches
//! for. Images are validated on insertion the way an image database would:
//! too small or too featureless images are rejected, and the registry has a
//! fixed capacity.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::tracking::TargetIndex;

/// Gradient magnitude above which a pixel counts as a feature
const FEATURE_GRADIENT_THRESHOLD: u16 = 32;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid physical width for {name}: {width_m} m")]
    InvalidWidth { name: String, width_m: f32 },
    #[error("Reference target already registered: {0}")]
    DuplicateName(String),
    #[error("Image {name} is {width}x{height}, smaller than the {min} px minimum")]
    TooSmall {
        name: String,
        width: u32,
        height: u32,
        min: u32,
    },
    #[error("Image {name} has feature density {density:.3}, below the {min:.3} minimum")]
    InsufficientFeatures { name: String, density: f32, min: f32 },
    #[error("Registry is full ({capacity} targets)")]
    Full { capacity: usize },
}

/// Acceptance limits for reference images
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegistryLimits {
    /// Maximum number of targets
    pub max_targets: usize,
    /// Minimum length of the shorter image side in pixels
    pub min_dimension: u32,
    /// Minimum fraction of pixels with a strong intensity gradient
    pub min_feature_density: f32,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_targets: 1000,
            min_dimension: 300,
            min_feature_density: 0.05,
        }
    }
}

/// An immutable reference image descriptor
#[derive(Debug, Clone)]
pub struct ReferenceTarget {
    name: String,
    image: Arc<GrayImage>,
    physical_width_m: f32,
    index: TargetIndex,
}

impl ReferenceTarget {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grayscale pixel data the tracker matches against
    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn physical_width_m(&self) -> f32 {
        self.physical_width_m
    }

    pub fn index(&self) -> TargetIndex {
        self.index
    }
}

/// Registry of reference targets, indexed by insertion order
#[derive(Debug, Clone, Default)]
pub struct ReferenceTargetRegistry {
    targets: Vec<ReferenceTarget>,
    limits: RegistryLimits,
}

impl ReferenceTargetRegistry {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            targets: Vec::new(),
            limits,
        }
    }

    /// Validate and insert a reference image, returning its stable index
    pub fn add_image(
        &mut self,
        name: &str,
        image: &DynamicImage,
        physical_width_m: f32,
    ) -> Result<TargetIndex, RegistryError> {
        if !physical_width_m.is_finite() || physical_width_m <= 0.0 {
            return Err(RegistryError::InvalidWidth {
                name: name.to_string(),
                width_m: physical_width_m,
            });
        }
        if self.targets.len() >= self.limits.max_targets {
            return Err(RegistryError::Full {
                capacity: self.limits.max_targets,
            });
        }
        if self.find_by_name(name).is_some() {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        if width.min(height) < self.limits.min_dimension {
            return Err(RegistryError::TooSmall {
                name: name.to_string(),
                width,
                height,
                min: self.limits.min_dimension,
            });
        }

        let density = feature_density(&gray);
        debug!(target_name = %name, density, "Measured reference image feature density");
        if density < self.limits.min_feature_density {
            return Err(RegistryError::InsufficientFeatures {
                name: name.to_string(),
                density,
                min: self.limits.min_feature_density,
            });
        }

        let index = TargetIndex(self.targets.len() as u32);
        self.targets.push(ReferenceTarget {
            name: name.to_string(),
            image: Arc::new(gray),
            physical_width_m,
            index,
        });

        info!(
            target_name = %name,
            index = %index,
            width_m = physical_width_m,
            "Registered reference target"
        );
        Ok(index)
    }

    pub fn get(&self, index: TargetIndex) -> Option<&ReferenceTarget> {
        self.targets.get(index.0 as usize)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ReferenceTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceTarget> {
        self.targets.iter()
    }

    pub fn indices(&self) -> impl Iterator<Item = TargetIndex> + '_ {
        self.targets.iter().map(|t| t.index)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Fraction of interior pixels whose central-difference gradient is strong
pub fn feature_density(image: &GrayImage) -> f32 {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| image.get_pixel(x, y).0[0] as i16;
    let mut features = 0u64;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = (px(x + 1, y) - px(x - 1, y)).unsigned_abs();
            let gy = (px(x, y + 1) - px(x, y - 1)).unsigned_abs();
            if gx + gy > FEATURE_GRADIENT_THRESHOLD {
                features += 1;
            }
        }
    }

    let interior = (width - 2) as u64 * (height - 2) as u64;
    features as f32 / interior as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checkerboard(size: u32, cell: u32) -> DynamicImage {
        let img = GrayImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([20])
            } else {
                Luma([230])
            }
        });
        DynamicImage::ImageLuma8(img)
    }

    fn flat(size: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(size, size, Luma([128])))
    }

    #[test]
    fn test_add_image_assigns_sequential_indices() {
        let mut registry = ReferenceTargetRegistry::default();
        let card = registry.add_image("card", &checkerboard(320, 8), 0.13).unwrap();
        let poster = registry.add_image("poster", &checkerboard(400, 16), 0.5).unwrap();

        assert_eq!(card, TargetIndex(0));
        assert_eq!(poster, TargetIndex(1));
        assert_eq!(registry.len(), 2);

        let target = registry.get(card).unwrap();
        assert_eq!(target.name(), "card");
        assert_eq!(target.physical_width_m(), 0.13);
        assert_eq!(target.image().dimensions(), (320, 320));
        assert_eq!(registry.find_by_name("poster").unwrap().index(), poster);
    }

    #[test]
    fn test_rejects_invalid_images() {
        let mut registry = ReferenceTargetRegistry::default();

        assert!(matches!(
            registry.add_image("blank", &flat(320), 0.13),
            Err(RegistryError::InsufficientFeatures { .. })
        ));
        assert!(matches!(
            registry.add_image("tiny", &checkerboard(64, 8), 0.13),
            Err(RegistryError::TooSmall { .. })
        ));
        assert!(matches!(
            registry.add_image("card", &checkerboard(320, 8), 0.0),
            Err(RegistryError::InvalidWidth { .. })
        ));
        assert!(matches!(
            registry.add_image("card", &checkerboard(320, 8), f32::NAN),
            Err(RegistryError::InvalidWidth { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_and_capacity() {
        let mut registry = ReferenceTargetRegistry::new(RegistryLimits {
            max_targets: 1,
            ..RegistryLimits::default()
        });
        registry.add_image("card", &checkerboard(320, 8), 0.13).unwrap();

        assert!(matches!(
            registry.add_image("other", &checkerboard(320, 8), 0.13),
            Err(RegistryError::Full { capacity: 1 })
        ));

        let mut registry = ReferenceTargetRegistry::default();
        registry.add_image("card", &checkerboard(320, 8), 0.13).unwrap();
        assert!(matches!(
            registry.add_image("card", &checkerboard(320, 8), 0.13),
            Err(RegistryError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_feature_density() {
        let flat = flat(32).to_luma8();
        assert_eq!(feature_density(&flat), 0.0);

        let board = checkerboard(64, 4).to_luma8();
        assert!(feature_density(&board) > 0.3);
    }
}
