//! Chroma-key compositing material

use serde::{Deserialize, Serialize};

/// Color removed from the video during compositing, as linear RGB in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChromaKey(pub [f32; 3]);

impl ChromaKey {
    /// Saturated green screen
    pub const GREEN: ChromaKey = ChromaKey([0.1843, 1.0, 0.098]);
}

impl Default for ChromaKey {
    fn default() -> Self {
        Self::GREEN
    }
}

/// Compositing material binding a media stream to its key color
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaKeyMaterial {
    pub media: String,
    pub key: ChromaKey,
}

impl ChromaKeyMaterial {
    pub fn new(media: impl Into<String>, key: ChromaKey) -> Self {
        Self {
            media: media.into(),
            key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key_is_green() {
        assert_eq!(ChromaKey::default(), ChromaKey::GREEN);
        let material = ChromaKeyMaterial::new("oiia.mp4", ChromaKey::default());
        assert_eq!(material.media, "oiia.mp4");
        assert_eq!(material.key.0, [0.1843, 1.0, 0.098]);
    }
}
