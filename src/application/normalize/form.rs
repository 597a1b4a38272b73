//! Flat admin-form fields mapped onto the persisted nested shape.

use serde_json::{Map, Value};

use super::merge::insert_path;
use super::validators::flag;

#[derive(Clone, Copy)]
enum Kind {
    /// Copied verbatim when present, otherwise left to the defaults.
    Value,
    /// Unchecked boxes are not submitted at all, so absence means `false`.
    Checkbox,
    /// Markup fragments: absence is an empty submission.
    Markup,
}

const FIELDS: &[(&str, &[&str], Kind)] = &[
    ("title", &["title"], Kind::Value),
    ("limit", &["limit"], Kind::Value),
    ("range", &["range"], Kind::Value),
    ("time_quantity", &["time_quantity"], Kind::Value),
    ("time_unit", &["time_unit"], Kind::Value),
    ("order_by", &["order_by"], Kind::Value),
    ("post_type", &["post_type"], Kind::Value),
    ("pid", &["pid"], Kind::Value),
    ("taxonomy", &["taxonomy"], Kind::Value),
    ("term_id", &["term_id"], Kind::Value),
    ("uid", &["author"], Kind::Value),
    ("freshness", &["freshness"], Kind::Checkbox),
    ("shorten_title-active", &["shorten_title", "active"], Kind::Checkbox),
    ("shorten_title-words", &["shorten_title", "words"], Kind::Value),
    ("shorten_title-length", &["shorten_title", "length"], Kind::Value),
    ("post-excerpt-active", &["post-excerpt", "active"], Kind::Checkbox),
    ("post-excerpt-format", &["post-excerpt", "keep_format"], Kind::Checkbox),
    ("post-excerpt-words", &["post-excerpt", "words"], Kind::Value),
    ("post-excerpt-length", &["post-excerpt", "length"], Kind::Value),
    ("thumbnail-active", &["thumbnail", "active"], Kind::Checkbox),
    ("thumbnail-size-source", &["thumbnail", "build"], Kind::Value),
    ("thumbnail-size", &["thumbnail", "size_name"], Kind::Value),
    ("thumbnail-width", &["thumbnail", "width"], Kind::Value),
    ("thumbnail-height", &["thumbnail", "height"], Kind::Value),
    ("rating", &["rating"], Kind::Checkbox),
    ("comment_count", &["stats_tag", "comment_count"], Kind::Checkbox),
    ("views", &["stats_tag", "views"], Kind::Checkbox),
    ("author", &["stats_tag", "author"], Kind::Checkbox),
    ("date", &["stats_tag", "date", "active"], Kind::Checkbox),
    ("date_format", &["stats_tag", "date", "format"], Kind::Value),
    ("stats_taxonomy", &["stats_tag", "taxonomy", "active"], Kind::Checkbox),
    ("stats_taxonomy_name", &["stats_tag", "taxonomy", "name"], Kind::Value),
    ("custom_html", &["markup", "custom_html"], Kind::Checkbox),
    ("wpp-start", &["markup", "wpp-start"], Kind::Markup),
    ("wpp-end", &["markup", "wpp-end"], Kind::Markup),
    ("post-html", &["markup", "post-html"], Kind::Markup),
    ("title-start", &["markup", "title-start"], Kind::Markup),
    ("title-end", &["markup", "title-end"], Kind::Markup),
];

/// Build the nested overlay for a form submission. Unknown keys are ignored.
pub fn unflatten(fields: &Map<String, Value>) -> Value {
    let mut overlay = Value::Object(Map::new());
    for (key, path, kind) in FIELDS {
        let value = match (kind, fields.get(*key)) {
            (Kind::Checkbox, submitted) => Value::Bool(submitted.is_some_and(flag)),
            (Kind::Value | Kind::Markup, Some(submitted)) => submitted.clone(),
            (Kind::Markup, None) => Value::String(String::new()),
            (Kind::Value, None) => continue,
        };
        insert_path(&mut overlay, path, value);
    }
    overlay
}
