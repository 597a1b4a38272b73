use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;
use wpp_widget_types::WidgetConfig;

use super::normalize::{Normalizer, RawInstance};

/// Site-wide widget defaults. Readers take a snapshot per call, so a reload
/// never mixes two templates within one normalization.
pub struct DefaultsProvider {
    current: ArcSwap<WidgetConfig>,
}

impl Default for DefaultsProvider {
    fn default() -> Self {
        Self::new(WidgetConfig::default())
    }
}

impl DefaultsProvider {
    pub fn new(defaults: WidgetConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(defaults),
        }
    }

    /// Defaults from a (possibly sparse) stored instance, filled from the
    /// built-in template and normalized.
    pub fn from_instance(raw: &RawInstance, normalizer: &Normalizer) -> Self {
        Self::new(normalizer.resolve(raw, &WidgetConfig::default()))
    }

    pub fn snapshot(&self) -> Arc<WidgetConfig> {
        self.current.load_full()
    }

    pub fn replace(&self, defaults: WidgetConfig) {
        self.current.store(Arc::new(defaults));
        info!(op = "replace", target_module = "application::defaults", "Widget defaults reloaded");
    }
}
