//! Declarative article schema and the engine that applies it to raw LLM output.

use serde_json::{Map, Value};
use url::Url;

use super::normalize::{fold_accents, normalize_tag, slugify, truncate_at_word};
use super::Violation;
use crate::modules::ingest::text::{collapse_whitespace, tidy_paragraphs};

pub const CATEGORIES: &[&str] = &[
    "politica",
    "economia",
    "esportes",
    "tecnologia",
    "saude",
    "entretenimento",
    "internacional",
    "brasil",
    "ciencia",
    "cultura",
];

const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("mundo", "internacional"),
    ("esporte", "esportes"),
    ("nacional", "brasil"),
    ("tech", "tecnologia"),
];

pub const TAG_COUNT: usize = 12;
pub const SLUG_MAX: usize = 100;

pub const REQUIRED: &str = "is required";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overflow {
    Reject,
    Truncate,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text { min: usize, max: usize, overflow: Overflow, multiline: bool },
    Slug { max: usize },
    Enum { allowed: &'static [&'static str], aliases: &'static [(&'static str, &'static str)] },
    /// Exactly `count` distinct entries after normalization; surplus is cut.
    TagList { count: usize, item_max: usize },
    StringList { max_items: usize, item_max: usize },
    HttpsUrl,
}

/// `path` is dot-separated. A nested rule is only checked when its parent
/// object is present; `required` is relative to that parent.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub path: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

pub const ARTICLE_SCHEMA: &[FieldRule] = &[
    FieldRule { path: "title", required: true, kind: FieldKind::Text { min: 10, max: 120, overflow: Overflow::Reject, multiline: false } },
    FieldRule { path: "slug", required: true, kind: FieldKind::Slug { max: SLUG_MAX } },
    FieldRule { path: "summary", required: true, kind: FieldKind::Text { min: 50, max: 300, overflow: Overflow::Truncate, multiline: false } },
    FieldRule { path: "content", required: true, kind: FieldKind::Text { min: 300, max: usize::MAX, overflow: Overflow::Reject, multiline: true } },
    FieldRule { path: "category", required: true, kind: FieldKind::Enum { allowed: CATEGORIES, aliases: CATEGORY_ALIASES } },
    FieldRule { path: "tags", required: true, kind: FieldKind::TagList { count: TAG_COUNT, item_max: 40 } },
    FieldRule { path: "seo.meta_title", required: true, kind: FieldKind::Text { min: 1, max: 60, overflow: Overflow::Truncate, multiline: false } },
    FieldRule { path: "seo.meta_description", required: true, kind: FieldKind::Text { min: 1, max: 160, overflow: Overflow::Truncate, multiline: false } },
    FieldRule { path: "seo.keywords", required: false, kind: FieldKind::StringList { max_items: 10, item_max: 60 } },
    FieldRule { path: "image.url", required: true, kind: FieldKind::HttpsUrl },
    FieldRule { path: "image.alt", required: false, kind: FieldKind::Text { min: 1, max: 200, overflow: Overflow::Truncate, multiline: false } },
    FieldRule { path: "image.credit", required: false, kind: FieldKind::Text { min: 1, max: 120, overflow: Overflow::Truncate, multiline: false } },
];

pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, key| node.get(key))
}

pub fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut keys: Vec<&str> = path.split('.').collect();
    let last = match keys.pop() {
        Some(k) => k,
        None => return,
    };
    let mut node = root;
    for key in keys {
        let entry = node.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    node.insert(last.to_string(), value);
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn parent_present(root: &Value, path: &str) -> bool {
    match path.rsplit_once('.') {
        Some((parent, _)) => get_path(root, parent).map(Value::is_object).unwrap_or(false),
        None => true,
    }
}

/// Applies every rule to `raw`, returning the normalized object or all violations.
pub fn apply(schema: &[FieldRule], raw: &Value) -> Result<Map<String, Value>, Vec<Violation>> {
    let mut normalized = Map::new();
    let mut violations = Vec::new();

    if !raw.is_object() {
        violations.push(Violation::new("$", "expected a JSON object"));
        return Err(violations);
    }

    for rule in schema {
        if !parent_present(raw, rule.path) {
            continue;
        }
        let value = get_path(raw, rule.path);
        if is_blank(value) {
            if rule.required {
                violations.push(Violation::new(rule.path, REQUIRED));
            }
            continue;
        }
        let value = value.unwrap_or(&Value::Null);
        match check(rule.kind, value) {
            Ok(v) => set_path(&mut normalized, rule.path, v),
            Err(msg) => violations.push(Violation::new(rule.path, msg)),
        }
    }

    if violations.is_empty() {
        Ok(normalized)
    } else {
        Err(violations)
    }
}

fn check(kind: FieldKind, value: &Value) -> Result<Value, String> {
    match kind {
        FieldKind::Text { min, max, overflow, multiline } => {
            let raw = value.as_str().ok_or("expected text")?;
            let text = if multiline { tidy_paragraphs(raw) } else { collapse_whitespace(raw) };
            let len = text.chars().count();
            if len < min {
                return Err(format!("must have at least {} characters (got {})", min, len));
            }
            if len > max {
                return match overflow {
                    Overflow::Truncate => Ok(Value::String(truncate_at_word(&text, max))),
                    Overflow::Reject => Err(format!("must have at most {} characters (got {})", max, len)),
                };
            }
            Ok(Value::String(text))
        }
        FieldKind::Slug { max } => {
            let raw = value.as_str().ok_or("expected text")?;
            let slug = slugify(raw, max);
            if slug.is_empty() {
                return Err("no usable characters for a slug".to_string());
            }
            Ok(Value::String(slug))
        }
        FieldKind::Enum { allowed, aliases } => {
            let raw = value.as_str().ok_or("expected text")?;
            let folded = fold_accents(raw.trim());
            let resolved = aliases
                .iter()
                .find(|(alias, _)| *alias == folded)
                .map(|(_, target)| *target)
                .unwrap_or(folded.as_str());
            allowed
                .iter()
                .find(|c| **c == resolved)
                .map(|c| Value::String(c.to_string()))
                .ok_or_else(|| format!("\"{}\" is not one of: {}", raw.trim(), allowed.join(", ")))
        }
        FieldKind::TagList { count, item_max } => {
            let tags = distinct_strings(value, item_max)?;
            if tags.len() < count {
                return Err(format!("expected exactly {} distinct tags (got {})", count, tags.len()));
            }
            Ok(Value::from(tags.into_iter().take(count).collect::<Vec<_>>()))
        }
        FieldKind::StringList { max_items, item_max } => {
            let items = distinct_strings(value, item_max)?;
            Ok(Value::from(items.into_iter().take(max_items).collect::<Vec<_>>()))
        }
        FieldKind::HttpsUrl => {
            let raw = value.as_str().ok_or("expected text")?.trim();
            match Url::parse(raw) {
                Ok(url) if url.scheme() == "https" && url.host_str().is_some() => Ok(Value::String(url.to_string())),
                _ => Err(format!("\"{}\" is not an absolute https URL", raw)),
            }
        }
    }
}

/// Accepts a JSON array of strings or a comma-separated string.
fn distinct_strings(value: &Value, item_max: usize) -> Result<Vec<String>, String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or("list entries must be text"))
            .collect::<Result<_, _>>()?,
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => return Err("expected a list of text".to_string()),
    };

    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for entry in raw {
        let tag = truncate_at_word(&normalize_tag(&entry), item_max);
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    Ok(out)
}
