//! Sidebar widget shell around the popular-posts list.

use serde::Serialize;
use tracing::warn;
use wpp_widget_types::{WidgetConfig, WidgetPayload};

use crate::config::WidgetSettings;

use super::normalize::{RawInstance, decode_html};
use super::popular::PopularPostsService;

/// Shown instead of a deferred list when the sidebar gives the widget no
/// addressable container.
pub const MISSING_CONTAINER_NOTICE: &str = "<p>Error: cannot ajaxify WordPress Popular Posts on this sidebar. It's missing the <em>id</em> attribute on before_widget.</p>";

/// Markup the sidebar wraps around each widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidebarArgs {
    pub before_widget: String,
    pub after_widget: String,
    pub before_title: String,
    pub after_title: String,
    pub widget_id: String,
}

/// Follow-up fetch a deferred widget performs once the page has loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredLoad {
    pub container_id: String,
    pub endpoint: String,
    pub lazyload: bool,
}

/// What goes between the title and `after_widget`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetBody {
    Inline(String),
    Deferred(DeferredLoad),
    MissingContainerId,
}

impl WidgetBody {
    fn into_markup(self) -> String {
        match self {
            Self::Inline(html) => html,
            Self::Deferred(load) => match serde_json::to_string(&load) {
                Ok(json) => format!(
                    "<script type=\"application/json\" class=\"wpp-deferred\">{json}</script>"
                ),
                Err(err) => {
                    warn!(op = "deferred", error = %err, "Failed to encode deferred widget load");
                    String::new()
                }
            },
            Self::MissingContainerId => MISSING_CONTAINER_NOTICE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct WidgetRenderer {
    service: PopularPostsService,
    settings: WidgetSettings,
}

impl WidgetRenderer {
    pub fn new(service: PopularPostsService, settings: WidgetSettings) -> Self {
        Self { service, settings }
    }

    /// Full widget markup for instance `number` placed in a sidebar.
    pub async fn render(&self, number: u32, args: &SidebarArgs, raw: &RawInstance) -> String {
        let config = self.service.resolve(raw);

        let mut out = String::new();
        out.push('\n');
        out.push_str(&args.before_widget);
        out.push('\n');
        out.push_str(&title_markup(&config, args));
        out.push_str(&self.body(number, args, raw, &config).await.into_markup());
        out.push('\n');
        out.push_str(&args.after_widget);
        out.push('\n');
        out
    }

    pub async fn body(
        &self,
        number: u32,
        args: &SidebarArgs,
        raw: &RawInstance,
        config: &WidgetConfig,
    ) -> WidgetBody {
        if !self.settings.ajax {
            return WidgetBody::Inline(self.inline(raw).await);
        }

        if !has_id_attribute(&args.before_widget) {
            return WidgetBody::MissingContainerId;
        }

        WidgetBody::Deferred(DeferredLoad {
            container_id: args.widget_id.clone(),
            endpoint: format!("/widget/{number}"),
            lazyload: config.thumbnail.active && self.settings.thumbnail_lazyload,
        })
    }

    /// Response body of the deferred fetch.
    pub async fn payload(&self, raw: &RawInstance) -> WidgetPayload {
        WidgetPayload {
            widget: self.inline(raw).await,
        }
    }

    async fn inline(&self, raw: &RawInstance) -> String {
        self.service
            .get_popular(raw)
            .await
            .map(|output| output.with_marker())
            .unwrap_or_default()
    }
}

fn title_markup(config: &WidgetConfig, args: &SidebarArgs) -> String {
    if config.title.is_empty() {
        return String::new();
    }

    let markup = &config.markup;
    if markup.custom_html && !markup.title_start.is_empty() && !markup.title_end.is_empty() {
        format!(
            "{}{}{}",
            decode_html(&markup.title_start),
            config.title,
            decode_html(&markup.title_end)
        )
    } else {
        format!("{}{}{}", args.before_title, config.title, args.after_title)
    }
}

/// Whether the opening markup carries an `id="…"` attribute.
fn has_id_attribute(before_widget: &str) -> bool {
    before_widget
        .match_indices("id=\"")
        .any(|(index, needle)| before_widget[index + needle.len()..].contains('"'))
}
