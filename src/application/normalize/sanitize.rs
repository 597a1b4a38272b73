//! Text sanitizers shared by the field rules.

use std::collections::HashSet;

use wpp_widget_types::IdList;

/// HTML-escape `input`, quotes included.
///
/// Existing entity references (`&amp;`, `&#039;`, `&#x27;`, ...) are copied
/// through untouched so escaping an already escaped value is a no-op.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (index, ch) in input.char_indices() {
        match ch {
            '&' if entity_len(&input[index..]).is_some() => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_html`] for rendering stored markup.
pub fn decode_html(input: &str) -> String {
    const ENTITIES: &[(&str, char)] = &[
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#039;", '\''),
        ("&#39;", '\''),
        ("&#x27;", '\''),
        ("&apos;", '\''),
    ];

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(position) = rest.find('&') {
        out.push_str(&rest[..position]);
        rest = &rest[position..];
        match ENTITIES
            .iter()
            .find(|(entity, _)| starts_with_ignore_case(rest, entity))
        {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Remove every markup tag, keeping the text content.
///
/// The result is HTML text as serialized by the sanitizer: `&`, `<` and `>`
/// in the content come back as entity references, and `script`/`style`
/// bodies are dropped with their tags.
pub fn strip_tags(input: &str) -> String {
    tag_stripper().clean(input).to_string()
}

fn tag_stripper() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::empty();
    builder
        .clean_content_tags(HashSet::from(["script", "style"]))
        .strip_comments(true);
    builder
}

/// Lowercase and keep `[a-z0-9_-]`.
pub fn sanitize_key(input: &str) -> String {
    input
        .chars()
        .map(|ch| ch.to_ascii_lowercase())
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-'))
        .collect()
}

/// Comma-separated list of sanitized keys with empty tokens dropped.
pub fn sanitize_key_list(input: &str) -> String {
    input
        .split(',')
        .map(sanitize_key)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Reduce free text to an [`IdList`].
///
/// Everything but digits and commas is stripped (`-` survives too when
/// `allow_negative`, for exclusion IDs); tokens that are not integers after
/// that are dropped.
pub fn sanitize_id_list(input: &str, allow_negative: bool) -> IdList {
    let kept: String = input
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == ',' || (allow_negative && *ch == '-'))
        .collect();

    IdList::new(
        kept.trim_end_matches(',')
            .split(',')
            .filter_map(|token| token.parse::<i64>().ok())
            .collect(),
    )
}

fn entity_len(input: &str) -> Option<usize> {
    let body = input.strip_prefix('&')?;
    let end = body.find(';')?;
    let name = &body[..end];

    let valid = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        !hex.is_empty() && hex.chars().all(|ch| ch.is_ascii_hexdigit())
    } else if let Some(decimal) = name.strip_prefix('#') {
        !decimal.is_empty() && decimal.chars().all(|ch| ch.is_ascii_digit())
    } else {
        name.chars().next().is_some_and(|ch| ch.is_ascii_alphabetic())
            && name.chars().all(|ch| ch.is_ascii_alphanumeric())
    };

    valid.then_some(end + 2)
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
