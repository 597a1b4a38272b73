//! Persisted shapes for the popular-posts widget.
//!
//! These types mirror the nested instance layout the storage layer has
//! always written (hyphenated keys such as `post-excerpt` and `wpp-start`
//! included), so previously saved widgets load unchanged. Field order is
//! the serialization order and therefore part of the cache fingerprint.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_TIME_QUANTITY: u32 = 24;
pub const DEFAULT_TITLE_LENGTH: u32 = 25;
pub const DEFAULT_EXCERPT_LENGTH: u32 = 55;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 75;
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 75;
pub const DEFAULT_POST_TYPE: &str = "post,page";
pub const DEFAULT_TAXONOMY: &str = "category";
pub const DEFAULT_DATE_FORMAT: &str = "F j, Y";

/// Library markup defaults, stored HTML-escaped like every other markup field.
pub const DEFAULT_WPP_START: &str = "&lt;ul class=&quot;wpp-list&quot;&gt;";
pub const DEFAULT_WPP_END: &str = "&lt;/ul&gt;";
pub const DEFAULT_TITLE_START: &str = "&lt;h2&gt;";
pub const DEFAULT_TITLE_END: &str = "&lt;/h2&gt;";
pub const DEFAULT_POST_HTML: &str = "&lt;li&gt;{thumb} {title} {stats}&lt;/li&gt;";

/// Fully normalized widget configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub title: String,
    pub limit: u32,
    pub range: TimeRange,
    pub time_quantity: u32,
    pub time_unit: TimeUnit,
    pub order_by: OrderBy,
    pub post_type: String,
    pub pid: IdList,
    /// Retired category filter; always written empty.
    pub cat: String,
    pub taxonomy: String,
    pub term_id: IdList,
    pub author: IdList,
    pub freshness: bool,
    pub shorten_title: ShortenTitle,
    #[serde(rename = "post-excerpt")]
    pub excerpt: Excerpt,
    pub thumbnail: Thumbnail,
    pub rating: bool,
    pub stats_tag: StatsTag,
    pub markup: Markup,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            limit: DEFAULT_LIMIT,
            range: TimeRange::default(),
            time_quantity: DEFAULT_TIME_QUANTITY,
            time_unit: TimeUnit::default(),
            order_by: OrderBy::default(),
            post_type: DEFAULT_POST_TYPE.to_string(),
            pid: IdList::default(),
            cat: String::new(),
            taxonomy: DEFAULT_TAXONOMY.to_string(),
            term_id: IdList::default(),
            author: IdList::default(),
            freshness: false,
            shorten_title: ShortenTitle::default(),
            excerpt: Excerpt::default(),
            thumbnail: Thumbnail::default(),
            rating: false,
            stats_tag: StatsTag::default(),
            markup: Markup::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenTitle {
    pub active: bool,
    pub words: u32,
    pub length: u32,
}

impl Default for ShortenTitle {
    fn default() -> Self {
        Self {
            active: false,
            words: 0,
            length: DEFAULT_TITLE_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Excerpt {
    pub active: bool,
    pub keep_format: bool,
    pub words: u32,
    pub length: u32,
}

impl Default for Excerpt {
    fn default() -> Self {
        Self {
            active: false,
            keep_format: false,
            words: 0,
            length: DEFAULT_EXCERPT_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub active: bool,
    pub build: ThumbnailBuild,
    pub width: u32,
    pub height: u32,
    pub crop: bool,
    /// Registered image size, only meaningful with [`ThumbnailBuild::Predefined`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_name: Option<String>,
}

impl Default for Thumbnail {
    fn default() -> Self {
        Self {
            active: false,
            build: ThumbnailBuild::default(),
            width: DEFAULT_THUMBNAIL_WIDTH,
            height: DEFAULT_THUMBNAIL_HEIGHT,
            crop: true,
            size_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsTag {
    pub comment_count: bool,
    pub views: bool,
    pub author: bool,
    pub date: DateTag,
    /// Retired mirror of `taxonomy.active`.
    pub category: bool,
    pub taxonomy: TaxonomyTag,
}

impl Default for StatsTag {
    fn default() -> Self {
        Self {
            comment_count: false,
            views: true,
            author: false,
            date: DateTag::default(),
            category: false,
            taxonomy: TaxonomyTag::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateTag {
    pub active: bool,
    pub format: String,
}

impl Default for DateTag {
    fn default() -> Self {
        Self {
            active: false,
            format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyTag {
    pub active: bool,
    pub name: String,
}

impl Default for TaxonomyTag {
    fn default() -> Self {
        Self {
            active: false,
            name: DEFAULT_TAXONOMY.to_string(),
        }
    }
}

/// Custom list markup. Every fragment is stored HTML-escaped and decoded at
/// render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markup {
    pub custom_html: bool,
    #[serde(rename = "wpp-start")]
    pub wpp_start: String,
    #[serde(rename = "wpp-end")]
    pub wpp_end: String,
    #[serde(rename = "post-html")]
    pub post_html: String,
    #[serde(rename = "title-start")]
    pub title_start: String,
    #[serde(rename = "title-end")]
    pub title_end: String,
}

impl Default for Markup {
    fn default() -> Self {
        Self {
            custom_html: false,
            wpp_start: DEFAULT_WPP_START.to_string(),
            wpp_end: DEFAULT_WPP_END.to_string(),
            post_html: DEFAULT_POST_HTML.to_string(),
            title_start: DEFAULT_TITLE_START.to_string(),
            title_end: DEFAULT_TITLE_END.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[default]
    #[serde(alias = "last24hours", alias = "daily")]
    Day,
    #[serde(alias = "last7days", alias = "weekly")]
    Week,
    #[serde(alias = "last30days", alias = "monthly")]
    Month,
    All,
    Custom,
}

impl TimeRange {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" | "last24hours" => Some(Self::Day),
            "week" | "weekly" | "last7days" => Some(Self::Week),
            "month" | "monthly" | "last30days" => Some(Self::Month),
            "all" => Some(Self::All),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Views,
    Comments,
    Avg,
}

impl OrderBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "views" => Some(Self::Views),
            "comments" => Some(Self::Comments),
            "avg" => Some(Self::Avg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailBuild {
    Predefined,
    #[default]
    Manual,
}

impl ThumbnailBuild {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "predefined" => Some(Self::Predefined),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Ordered list of numeric IDs, persisted as a comma-separated string
/// (`""` means "no filter").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IdList(Vec<i64>);

impl IdList {
    pub fn new(ids: Vec<i64>) -> Self {
        Self(ids)
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse an already-canonical list, skipping tokens that are not integers.
    pub fn parse_lenient(value: &str) -> Self {
        Self(
            value
                .split(',')
                .filter_map(|token| token.trim().parse::<i64>().ok())
                .collect(),
        )
    }
}

impl fmt::Display for IdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, id) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl Serialize for IdList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IdList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Single(i64),
            Many(Vec<i64>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Self::parse_lenient(&text),
            Repr::Single(id) => Self(vec![id]),
            Repr::Many(ids) => Self(ids),
        })
    }
}

/// One ranked entry produced by the popular-posts query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularPost {
    pub id: u64,
    pub title: String,
    pub permalink: String,
    pub author_id: u64,
    #[serde(with = "time::serde::timestamp")]
    pub date: OffsetDateTime,
    pub comment_count: u64,
    pub pageviews: u64,
    #[serde(default)]
    pub avg_views: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// JSON body returned by the deferred widget fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetPayload {
    pub widget: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_keys_keep_their_historic_names() {
        let value = serde_json::to_value(WidgetConfig::default()).expect("serialize defaults");
        assert!(value.get("post-excerpt").is_some());
        assert!(value["markup"].get("wpp-start").is_some());
        assert!(value["markup"].get("title-end").is_some());
        assert_eq!(value["pid"], "");
        assert_eq!(value["cat"], "");
    }

    #[test]
    fn id_list_round_trips_as_comma_string() {
        let ids = IdList::new(vec![12, -3, 56]);
        assert_eq!(ids.to_string(), "12,-3,56");

        let json = serde_json::to_string(&ids).expect("serialize ids");
        assert_eq!(json, "\"12,-3,56\"");

        let back: IdList = serde_json::from_str(&json).expect("deserialize ids");
        assert_eq!(back, ids);
    }

    #[test]
    fn id_list_accepts_numeric_and_array_forms() {
        let single: IdList = serde_json::from_str("7").expect("single id");
        assert_eq!(single.ids(), &[7]);

        let many: IdList = serde_json::from_str("[1,2]").expect("id array");
        assert_eq!(many.ids(), &[1, 2]);
    }

    #[test]
    fn legacy_range_names_deserialize() {
        let range: TimeRange = serde_json::from_str("\"last7days\"").expect("legacy range");
        assert_eq!(range, TimeRange::Week);
        assert_eq!(TimeRange::parse("LAST30DAYS"), Some(TimeRange::Month));
        assert_eq!(TimeRange::parse("fortnight"), None);
    }

    #[test]
    fn sparse_stored_instance_fills_from_defaults() {
        let config: WidgetConfig =
            serde_json::from_str(r#"{"limit": 5, "thumbnail": {"width": 120}}"#)
                .expect("sparse instance");
        assert_eq!(config.limit, 5);
        assert_eq!(config.thumbnail.width, 120);
        assert_eq!(config.thumbnail.height, DEFAULT_THUMBNAIL_HEIGHT);
        assert_eq!(config.post_type, DEFAULT_POST_TYPE);
    }
}
