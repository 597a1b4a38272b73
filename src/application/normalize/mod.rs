//! Widget instance normalization.
//!
//! A [`RawInstance`] is deep-merged onto the defaults template and every
//! field is then validated on its own. Invalid values fall back to their
//! documented defaults; nothing here fails.

mod form;
mod merge;
mod sanitize;
mod validators;

use std::sync::Arc;

use serde_json::{Map, Value};
use wpp_widget_types::{
    DEFAULT_DATE_FORMAT, DEFAULT_EXCERPT_LENGTH, DEFAULT_LIMIT, DEFAULT_POST_HTML,
    DEFAULT_POST_TYPE, DEFAULT_TAXONOMY, DEFAULT_THUMBNAIL_HEIGHT, DEFAULT_THUMBNAIL_WIDTH,
    DEFAULT_TIME_QUANTITY, DEFAULT_TITLE_END, DEFAULT_TITLE_LENGTH, DEFAULT_TITLE_START,
    DEFAULT_WPP_END, DEFAULT_WPP_START, DateTag, Excerpt, IdList, Markup, OrderBy, ShortenTitle,
    StatsTag, TaxonomyTag, Thumbnail, ThumbnailBuild, TimeRange, TimeUnit, WidgetConfig,
};

pub use merge::deep_merge;
pub use sanitize::{
    decode_html, escape_html, sanitize_id_list, sanitize_key, sanitize_key_list, strip_tags,
};

use super::thumbnails::{StaticThumbnailProbe, ThumbnailProbe};
use merge::lookup;

/// Where a payload came from; decides how absent keys are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOrigin {
    /// Flat admin-form submission.
    Form,
    /// Previously persisted nested instance.
    Stored,
}

/// Untrusted settings payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInstance {
    origin: PayloadOrigin,
    fields: Map<String, Value>,
}

impl RawInstance {
    pub fn new(origin: PayloadOrigin, fields: Map<String, Value>) -> Self {
        Self { origin, fields }
    }

    pub fn form(fields: Map<String, Value>) -> Self {
        Self::new(PayloadOrigin::Form, fields)
    }

    pub fn stored(fields: Map<String, Value>) -> Self {
        Self::new(PayloadOrigin::Stored, fields)
    }

    /// Wrap a decoded JSON document; anything but an object is empty.
    pub fn from_value(origin: PayloadOrigin, value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::new(origin, fields),
            _ => Self::new(origin, Map::new()),
        }
    }

    /// Persisted form of an already normalized configuration.
    pub fn from_config(config: &WidgetConfig) -> Self {
        Self::from_value(
            PayloadOrigin::Stored,
            serde_json::to_value(config).unwrap_or_default(),
        )
    }

    pub fn origin(&self) -> PayloadOrigin {
        self.origin
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn overlay(&self) -> Value {
        match self.origin {
            PayloadOrigin::Form => form::unflatten(&self.fields),
            PayloadOrigin::Stored => Value::Object(self.fields.clone()),
        }
    }
}

/// Applies the field rules; owns the thumbnail capability probe.
#[derive(Clone)]
pub struct Normalizer {
    probe: Arc<dyn ThumbnailProbe>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(StaticThumbnailProbe::default()))
    }
}

impl Normalizer {
    pub fn new(probe: Arc<dyn ThumbnailProbe>) -> Self {
        Self { probe }
    }

    /// Normalize an update of `previous`.
    ///
    /// Library markup defaults are injected into empty fragments only when
    /// this update switches custom HTML on.
    pub fn normalize(
        &self,
        raw: &RawInstance,
        defaults: &WidgetConfig,
        previous: &WidgetConfig,
    ) -> WidgetConfig {
        self.apply(raw, defaults, Some(previous.markup.custom_html))
    }

    /// Normalize an instance for rendering; markup is never injected.
    pub fn resolve(&self, raw: &RawInstance, defaults: &WidgetConfig) -> WidgetConfig {
        self.apply(raw, defaults, None)
    }

    fn apply(
        &self,
        raw: &RawInstance,
        defaults: &WidgetConfig,
        prior_custom_html: Option<bool>,
    ) -> WidgetConfig {
        let mut merged = serde_json::to_value(defaults).unwrap_or_default();
        deep_merge(&mut merged, &raw.overlay());
        let leaves = Leaves(&merged);

        let taxonomy_active = leaves.flag(&["stats_tag", "taxonomy", "active"]);

        WidgetConfig {
            title: escape_html(strip_tags(&leaves.text(&["title"])).trim()),
            limit: leaves.positive(&["limit"], DEFAULT_LIMIT),
            range: leaves
                .parse(&["range"], TimeRange::parse)
                .unwrap_or(defaults.range),
            time_quantity: leaves.positive(&["time_quantity"], DEFAULT_TIME_QUANTITY),
            time_unit: leaves
                .parse(&["time_unit"], TimeUnit::parse)
                .unwrap_or(defaults.time_unit),
            order_by: leaves
                .parse(&["order_by"], OrderBy::parse)
                .unwrap_or(defaults.order_by),
            post_type: non_empty_or(
                sanitize_key_list(&leaves.text(&["post_type"])),
                DEFAULT_POST_TYPE,
            ),
            pid: leaves.ids(&["pid"], false),
            cat: String::new(),
            taxonomy: non_empty_or(sanitize_key(&leaves.text(&["taxonomy"])), DEFAULT_TAXONOMY),
            term_id: leaves.ids(&["term_id"], true),
            author: leaves.ids(&["author"], false),
            freshness: leaves.flag(&["freshness"]),
            shorten_title: ShortenTitle {
                active: leaves.flag(&["shorten_title", "active"]),
                words: leaves.count(&["shorten_title", "words"], defaults.shorten_title.words),
                length: leaves.positive(&["shorten_title", "length"], DEFAULT_TITLE_LENGTH),
            },
            excerpt: Excerpt {
                active: leaves.flag(&["post-excerpt", "active"]),
                keep_format: leaves.flag(&["post-excerpt", "keep_format"]),
                words: leaves.count(&["post-excerpt", "words"], defaults.excerpt.words),
                length: leaves.positive(&["post-excerpt", "length"], DEFAULT_EXCERPT_LENGTH),
            },
            thumbnail: self.thumbnail(&leaves, defaults.thumbnail.build),
            rating: leaves.flag(&["rating"]),
            stats_tag: StatsTag {
                comment_count: leaves.flag(&["stats_tag", "comment_count"]),
                views: leaves.flag(&["stats_tag", "views"]),
                author: leaves.flag(&["stats_tag", "author"]),
                date: DateTag {
                    active: leaves.flag(&["stats_tag", "date", "active"]),
                    format: non_empty_or(
                        leaves.text(&["stats_tag", "date", "format"]).trim().to_string(),
                        DEFAULT_DATE_FORMAT,
                    ),
                },
                category: taxonomy_active,
                taxonomy: TaxonomyTag {
                    active: taxonomy_active,
                    name: non_empty_or(
                        sanitize_key(&leaves.text(&["stats_tag", "taxonomy", "name"])),
                        DEFAULT_TAXONOMY,
                    ),
                },
            },
            markup: markup(&leaves, prior_custom_html),
        }
    }

    fn thumbnail(&self, leaves: &Leaves<'_>, fallback_build: ThumbnailBuild) -> Thumbnail {
        let build = leaves
            .parse(&["thumbnail", "build"], ThumbnailBuild::parse)
            .unwrap_or(fallback_build);
        // Only predefined builds name a size.
        let size_name = Some(sanitize_key(&leaves.text(&["thumbnail", "size_name"])))
            .filter(|name| build == ThumbnailBuild::Predefined && !name.is_empty());

        let mut thumbnail = Thumbnail {
            active: false,
            build,
            width: DEFAULT_THUMBNAIL_WIDTH,
            height: DEFAULT_THUMBNAIL_HEIGHT,
            crop: leaves.flag(&["thumbnail", "crop"]),
            size_name,
        };

        if !self.probe.can_create_thumbnails() {
            return thumbnail;
        }

        thumbnail.active = leaves.flag(&["thumbnail", "active"]);
        match build {
            ThumbnailBuild::Predefined => {
                if let Some(size) = thumbnail
                    .size_name
                    .as_deref()
                    .and_then(|name| self.probe.get_size(name))
                {
                    thumbnail.width = size.width;
                    thumbnail.height = size.height;
                    thumbnail.crop = size.crop;
                }
            }
            ThumbnailBuild::Manual => {
                let width = validators::positive_int(leaves.get(&["thumbnail", "width"]));
                let height = validators::positive_int(leaves.get(&["thumbnail", "height"]));
                if let (Some(width), Some(height)) = (width, height) {
                    thumbnail.width = width;
                    thumbnail.height = height;
                    thumbnail.crop = true;
                }
            }
        }
        thumbnail
    }
}

/// Normalize with the stock thumbnail probe.
pub fn normalize(raw: &RawInstance, defaults: &WidgetConfig, previous: &WidgetConfig) -> WidgetConfig {
    Normalizer::default().normalize(raw, defaults, previous)
}

fn markup(leaves: &Leaves<'_>, prior_custom_html: Option<bool>) -> Markup {
    let custom_html = leaves.flag(&["markup", "custom_html"]);
    let switched_on = custom_html && !prior_custom_html.unwrap_or(custom_html);

    let fragment = |key: &str, library_default: &str| {
        let submitted = escape_html(&leaves.text(&["markup", key]));
        if submitted.is_empty() && switched_on {
            library_default.to_string()
        } else {
            submitted
        }
    };

    let post_html = escape_html(&leaves.text(&["markup", "post-html"]));

    Markup {
        custom_html,
        wpp_start: fragment("wpp-start", DEFAULT_WPP_START),
        wpp_end: fragment("wpp-end", DEFAULT_WPP_END),
        post_html: non_empty_or(post_html, DEFAULT_POST_HTML),
        title_start: fragment("title-start", DEFAULT_TITLE_START),
        title_end: fragment("title-end", DEFAULT_TITLE_END),
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Typed reads over the merged instance.
struct Leaves<'a>(&'a Value);

impl Leaves<'_> {
    fn get(&self, path: &[&str]) -> &Value {
        lookup(self.0, path)
    }

    fn flag(&self, path: &[&str]) -> bool {
        validators::flag(self.get(path))
    }

    fn text(&self, path: &[&str]) -> String {
        validators::text(self.get(path))
    }

    fn positive(&self, path: &[&str], fallback: u32) -> u32 {
        validators::positive_int(self.get(path)).unwrap_or(fallback)
    }

    fn count(&self, path: &[&str], fallback: u32) -> u32 {
        validators::non_negative_int(self.get(path)).unwrap_or(fallback)
    }

    fn parse<T>(&self, path: &[&str], parse: fn(&str) -> Option<T>) -> Option<T> {
        parse(&self.text(path))
    }

    fn ids(&self, path: &[&str], allow_negative: bool) -> IdList {
        let text = match self.get(path) {
            Value::Array(items) => items
                .iter()
                .map(validators::text)
                .collect::<Vec<_>>()
                .join(","),
            value => validators::text(value),
        };
        sanitize_id_list(&text, allow_negative)
    }
}
