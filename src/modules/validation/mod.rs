pub mod normalize;
pub mod schema;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;
use url::Url;

use normalize::slugify;
use schema::{REQUIRED, SLUG_MAX};

pub use schema::{ARTICLE_SCHEMA, CATEGORIES};

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
#[error("article failed validation: {}", join_violations(.0))]
pub struct ValidationErrors(pub Vec<Violation>);

fn join_violations(violations: &[Violation]) -> String {
    violations.iter().map(Violation::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoFields {
    pub meta_title: String,
    pub meta_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleImage {
    pub url: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub credit: Option<String>,
}

/// A normalized article, ready to be routed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub seo: SeoFields,
    #[serde(default)]
    pub image: Option<ArticleImage>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub source_published_at: Option<DateTime<Utc>>,
}

/// Facts known from the feed that fill gaps in the LLM output.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext<'a> {
    pub source_url: &'a str,
    pub source_published_at: Option<DateTime<Utc>>,
    pub default_category: Option<&'a str>,
    pub feed_image: Option<&'a str>,
}

fn is_https(raw: &str) -> bool {
    Url::parse(raw).map(|u| u.scheme() == "https" && u.host_str().is_some()).unwrap_or(false)
}

fn missing(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Fills defaults that only need the raw input and the feed context.
fn prefill(raw: &Value, ctx: &ValidationContext<'_>) -> Value {
    let mut doc = raw.clone();
    if let Some(obj) = doc.as_object_mut() {
        fill_defaults(obj, ctx);
    }
    doc
}

/// Blank, or nothing left once slugified (`"???"`, `"—"`).
fn unusable_slug(v: Option<&Value>) -> bool {
    match v {
        Some(Value::String(s)) => slugify(s, SLUG_MAX).is_empty(),
        other => missing(other),
    }
}

fn fill_defaults(obj: &mut Map<String, Value>, ctx: &ValidationContext<'_>) {
    if unusable_slug(obj.get("slug")) {
        if let Some(title) = obj.get("title").cloned() {
            obj.insert("slug".to_string(), title);
        }
    }
    if missing(obj.get("category")) {
        if let Some(cat) = ctx.default_category {
            obj.insert("category".to_string(), json!(cat));
        }
    }

    if !obj.get("seo").map(Value::is_object).unwrap_or(false) {
        obj.insert("seo".to_string(), json!({}));
    }
    let title = obj.get("title").cloned();
    let summary = obj.get("summary").cloned();
    if let Some(seo) = obj.get_mut("seo").and_then(Value::as_object_mut) {
        if missing(seo.get("meta_title")) {
            if let Some(t) = title {
                seo.insert("meta_title".to_string(), t);
            }
        }
        if missing(seo.get("meta_description")) {
            if let Some(s) = summary {
                seo.insert("meta_description".to_string(), s);
            }
        }
    }

    match obj.get("image").cloned() {
        Some(Value::String(url)) if !url.trim().is_empty() => {
            obj.insert("image".to_string(), json!({ "url": url }));
        }
        None | Some(Value::Null) | Some(Value::String(_)) => {
            obj.remove("image");
            if let Some(feed_image) = ctx.feed_image.filter(|u| is_https(u)) {
                obj.insert("image".to_string(), json!({ "url": feed_image }));
            }
        }
        _ => {}
    }
}

/// Fields filled from another field when absent, as `(derived, source)`.
const DERIVED_FIELDS: &[(&str, &str)] = &[
    ("slug", "title"),
    ("seo.meta_title", "title"),
    ("seo.meta_description", "summary"),
];

/// A derived field is only reported missing when its source is present.
fn drop_derived_duplicates(violations: &mut Vec<Violation>) {
    let failed: Vec<String> = violations.iter().map(|v| v.field.clone()).collect();
    violations.retain(|v| {
        v.message != REQUIRED
            || !DERIVED_FIELDS
                .iter()
                .any(|(derived, source)| v.field == *derived && failed.iter().any(|f| f == source))
    });
}

/// Validates and normalizes raw LLM output against [`ARTICLE_SCHEMA`].
pub fn validate_article(raw: &Value, ctx: &ValidationContext<'_>) -> Result<ArticleDraft, ValidationErrors> {
    let doc = prefill(raw, ctx);
    let mut violations = Vec::new();

    match Url::parse(ctx.source_url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        _ => violations.push(Violation::new("source_url", format!("\"{}\" is not an absolute http(s) URL", ctx.source_url))),
    }

    let normalized = match schema::apply(ARTICLE_SCHEMA, &doc) {
        Ok(map) => Some(map),
        Err(mut errs) => {
            violations.append(&mut errs);
            None
        }
    };
    drop_derived_duplicates(&mut violations);

    let Some(normalized) = normalized.filter(|_| violations.is_empty()) else {
        return Err(ValidationErrors(violations));
    };

    let mut draft: ArticleDraft = serde_json::from_value(Value::Object(normalized))
        .map_err(|e| ValidationErrors(vec![Violation::new("$", e.to_string())]))?;

    if draft.seo.keywords.is_empty() {
        draft.seo.keywords = draft.tags.iter().take(5).cloned().collect();
    }
    if let Some(image) = draft.image.as_mut() {
        if image.alt.trim().is_empty() {
            image.alt = draft.title.clone();
        }
    }
    draft.source_url = ctx.source_url.to_string();
    draft.source_published_at = ctx.source_published_at;

    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Tag {}", i)).collect()
    }

    fn good_output() -> Value {
        json!({
            "title": "Copom mantém a Selic em 10,5% ao ano",
            "summary": "O Comitê de Política Monetária do Banco Central decidiu manter a taxa básica de juros pela segunda vez.",
            "content": "Parágrafo inicial sobre a decisão do Copom. ".repeat(10),
            "category": "Economia",
            "tags": tags(14),
            "seo": { "meta_title": "Copom mantém Selic em 10,5%" }
        })
    }

    fn ctx<'a>() -> ValidationContext<'a> {
        ValidationContext {
            source_url: "https://fonte.example.com/selic",
            source_published_at: None,
            default_category: Some("brasil"),
            feed_image: None,
        }
    }

    #[test]
    fn accepts_and_fills_defaults() {
        let draft = validate_article(&good_output(), &ctx()).unwrap();
        assert_eq!(draft.slug, "copom-mantem-a-selic-em-10-5-ao-ano");
        assert_eq!(draft.category, "economia");
        assert_eq!(draft.tags.len(), 12);
        assert_eq!(draft.tags[0], "tag 1");
        assert_eq!(draft.seo.meta_description, draft.summary);
        assert_eq!(draft.seo.keywords, vec!["tag 1", "tag 2", "tag 3", "tag 4", "tag 5"]);
        assert_eq!(draft.source_url, "https://fonte.example.com/selic");
        assert!(draft.image.is_none());
    }

    #[test]
    fn collects_every_violation() {
        let raw = json!({
            "title": "Curto",
            "summary": "pequeno",
            "content": "nada",
            "category": "fofoca",
            "tags": ["um", "dois"],
            "image": { "url": "http://img.example.com/x.jpg" }
        });
        let err = validate_article(&raw, &ValidationContext { source_url: "notaurl", ..ctx() }).unwrap_err();
        let fields: Vec<&str> = err.0.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["source_url", "title", "summary", "content", "category", "tags", "image.url"]);
        assert!(err.to_string().starts_with("article failed validation: source_url:"));
    }

    #[test]
    fn feed_category_and_https_feed_image_are_used() {
        let mut raw = good_output();
        raw.as_object_mut().unwrap().remove("category");
        let with_image = ValidationContext { feed_image: Some("https://img.example.com/capa.jpg"), ..ctx() };
        let draft = validate_article(&raw, &with_image).unwrap();
        assert_eq!(draft.category, "brasil");
        let image = draft.image.unwrap();
        assert_eq!(image.url, "https://img.example.com/capa.jpg");
        assert_eq!(image.alt, draft.title);
    }

    #[test]
    fn plain_http_feed_image_is_dropped_silently() {
        let with_image = ValidationContext { feed_image: Some("http://img.example.com/capa.jpg"), ..ctx() };
        let draft = validate_article(&good_output(), &with_image).unwrap();
        assert!(draft.image.is_none());
    }

    #[test]
    fn image_given_as_string_is_promoted() {
        let mut raw = good_output();
        raw["image"] = json!("https://img.example.com/y.png");
        let draft = validate_article(&raw, &ctx()).unwrap();
        assert_eq!(draft.image.unwrap().url, "https://img.example.com/y.png");
    }

    #[test]
    fn long_summary_and_seo_are_truncated() {
        let mut raw = good_output();
        raw["summary"] = json!("palavra ".repeat(60));
        raw["seo"]["meta_description"] = json!("descrição ".repeat(30));
        let draft = validate_article(&raw, &ctx()).unwrap();
        assert!(draft.summary.chars().count() <= 300);
        assert!(draft.seo.meta_description.chars().count() <= 160);
        assert!(!draft.summary.ends_with(' '));
    }

    #[test]
    fn slug_without_usable_characters_falls_back_to_title() {
        for junk in ["???", "—", "  !! "] {
            let mut raw = good_output();
            raw["slug"] = json!(junk);
            let draft = validate_article(&raw, &ctx()).unwrap();
            assert_eq!(draft.slug, "copom-mantem-a-selic-em-10-5-ao-ano");
        }
    }

    #[test]
    fn missing_title_is_reported_once() {
        let mut raw = good_output();
        let obj = raw.as_object_mut().unwrap();
        obj.remove("title");
        obj.remove("seo");
        let err = validate_article(&raw, &ctx()).unwrap_err();
        let fields: Vec<&str> = err.0.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["title"]);
    }

    #[test]
    fn explicit_seo_problems_are_still_reported() {
        let mut raw = good_output();
        raw.as_object_mut().unwrap().remove("title");
        raw["seo"]["meta_title"] = json!(42);
        let err = validate_article(&raw, &ctx()).unwrap_err();
        let fields: Vec<&str> = err.0.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "seo.meta_title"]);
    }
}
