use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Registered image size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
    pub crop: bool,
}

/// What the host can do with images; consulted while normalizing thumbnail
/// settings.
pub trait ThumbnailProbe: Send + Sync {
    fn can_create_thumbnails(&self) -> bool;

    fn get_sizes(&self) -> HashMap<String, ThumbnailSize>;

    fn get_size(&self, name: &str) -> Option<ThumbnailSize> {
        self.get_sizes().get(name).copied()
    }
}

/// Fixed capability answer, e.g. from process configuration.
#[derive(Debug, Clone)]
pub struct StaticThumbnailProbe {
    enabled: bool,
    sizes: HashMap<String, ThumbnailSize>,
}

impl StaticThumbnailProbe {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            sizes: HashMap::new(),
        }
    }

    /// Host without image support: thumbnails are always switched off.
    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn with_size(mut self, name: impl Into<String>, size: ThumbnailSize) -> Self {
        self.sizes.insert(name.into(), size);
        self
    }
}

impl Default for StaticThumbnailProbe {
    /// Image support with the stock `thumbnail`, `medium` and `large` sizes.
    fn default() -> Self {
        Self::new(true)
            .with_size(
                "thumbnail",
                ThumbnailSize {
                    width: 150,
                    height: 150,
                    crop: true,
                },
            )
            .with_size(
                "medium",
                ThumbnailSize {
                    width: 300,
                    height: 300,
                    crop: false,
                },
            )
            .with_size(
                "large",
                ThumbnailSize {
                    width: 1024,
                    height: 1024,
                    crop: false,
                },
            )
    }
}

impl ThumbnailProbe for StaticThumbnailProbe {
    fn can_create_thumbnails(&self) -> bool {
        self.enabled
    }

    fn get_sizes(&self) -> HashMap<String, ThumbnailSize> {
        self.sizes.clone()
    }

    fn get_size(&self, name: &str) -> Option<ThumbnailSize> {
        self.sizes.get(name).copied()
    }
}
