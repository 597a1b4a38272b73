use wpp_widget_types::{PopularPost, WidgetConfig};

/// Turns a ranked result set into list markup.
pub trait RenderPipeline: Send + Sync {
    /// Must produce valid (possibly empty) markup for an empty `posts`.
    fn render(&self, posts: &[PopularPost], config: &WidgetConfig) -> String;
}
