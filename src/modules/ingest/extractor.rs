//! Regex-based item extraction for RSS 2.0 and Atom documents.
//!
//! Feeds in the wild are frequently malformed (unescaped ampersands, stray
//! markup inside CDATA, truncated documents), so items are located and read
//! with patterns instead of a strict XML parser. A broken item is skipped
//! without losing its neighbours.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::structs::FeedItem;
use super::text::{clean_inline, decode_entities, unwrap_cdata};

fn element(name: &str) -> Regex {
    let name = regex::escape(name);
    Regex::new(&format!(r"(?is)<{name}(?:\s[^>]*)?>(.*?)</{name}\s*>")).unwrap()
}

fn open_tag(name: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{}\b([^>]*)>", regex::escape(name))).unwrap()
}

static ITEM: LazyLock<Regex> = LazyLock::new(|| element("item"));
static ENTRY: LazyLock<Regex> = LazyLock::new(|| element("entry"));

static TITLE: LazyLock<Regex> = LazyLock::new(|| element("title"));
static LINK_TEXT: LazyLock<Regex> = LazyLock::new(|| element("link"));
static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| open_tag("link"));
static GUID: LazyLock<Regex> = LazyLock::new(|| element("guid"));

static CONTENT_ENCODED: LazyLock<Regex> = LazyLock::new(|| element("content:encoded"));
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| element("description"));
static ATOM_CONTENT: LazyLock<Regex> = LazyLock::new(|| element("content"));
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| element("summary"));

static PUB_DATE: LazyLock<Regex> = LazyLock::new(|| element("pubDate"));
static PUBLISHED: LazyLock<Regex> = LazyLock::new(|| element("published"));
static UPDATED: LazyLock<Regex> = LazyLock::new(|| element("updated"));
static DC_DATE: LazyLock<Regex> = LazyLock::new(|| element("dc:date"));

static MEDIA_CONTENT: LazyLock<Regex> = LazyLock::new(|| open_tag("media:content"));
static MEDIA_THUMBNAIL: LazyLock<Regex> = LazyLock::new(|| open_tag("media:thumbnail"));
static ENCLOSURE: LazyLock<Regex> = LazyLock::new(|| open_tag("enclosure"));
static IMG: LazyLock<Regex> = LazyLock::new(|| open_tag("img"));

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Extracts up to `limit` items, in document order. RSS `<item>` blocks win;
/// `<entry>` blocks are only read when the document has no items.
pub fn extract_items(xml: &str, limit: usize) -> Vec<FeedItem> {
    let mut blocks: Vec<&str> = ITEM
        .captures_iter(xml)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if blocks.is_empty() {
        blocks = ENTRY
            .captures_iter(xml)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
    }

    blocks
        .into_iter()
        .filter_map(parse_block)
        .take(limit)
        .collect()
}

fn parse_block(block: &str) -> Option<FeedItem> {
    let title = first_text(block, &[&TITLE]).map(|t| clean_inline(&t))?;
    if title.is_empty() {
        return None;
    }
    let link = find_link(block)?;

    let description = first_text(block, &[&CONTENT_ENCODED, &DESCRIPTION, &ATOM_CONTENT, &SUMMARY])
        .map(|d| unwrap_cdata(&d).trim().to_string())
        .unwrap_or_default();

    let pub_date = first_text(block, &[&PUB_DATE, &PUBLISHED, &UPDATED, &DC_DATE])
        .and_then(|d| parse_date(&clean_inline(&d)));

    let image_url = find_image(block, &description);

    Some(FeedItem { title, link, description, pub_date, image_url })
}

/// First non-empty capture among `patterns`, tried in order.
fn first_text(block: &str, patterns: &[&LazyLock<Regex>]) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !unwrap_cdata(s).trim().is_empty())
    })
}

fn attributes(raw: &str) -> HashMap<String, String> {
    ATTR.captures_iter(raw)
        .map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).map(|m| m.as_str()).unwrap_or("");
            (c[1].to_ascii_lowercase(), decode_entities(value).trim().to_string())
        })
        .collect()
}

fn find_link(block: &str) -> Option<String> {
    // RSS: <link>https://...</link>
    if let Some(text) = first_text(block, &[&LINK_TEXT]) {
        let link = normalize_url(&clean_inline(&text));
        if !link.is_empty() && !link.contains('<') {
            return Some(link);
        }
    }

    // Atom: <link href="..." rel="alternate"/>
    for cap in LINK_TAG.captures_iter(block) {
        let attrs = attributes(&cap[1]);
        let rel = attrs.get("rel").map(String::as_str).unwrap_or("alternate");
        if rel != "alternate" {
            continue;
        }
        if let Some(href) = attrs.get("href").filter(|h| !h.is_empty()) {
            return Some(normalize_url(href));
        }
    }

    first_text(block, &[&GUID])
        .map(|g| normalize_url(&clean_inline(&g)))
        .filter(|g| g.starts_with("http://") || g.starts_with("https://"))
}

fn find_image(block: &str, description: &str) -> Option<String> {
    for cap in MEDIA_CONTENT.captures_iter(block) {
        let attrs = attributes(&cap[1]);
        let is_image = match (attrs.get("medium"), attrs.get("type")) {
            (Some(medium), _) => medium == "image",
            (None, Some(mime)) => mime.starts_with("image/"),
            (None, None) => true,
        };
        if is_image {
            if let Some(url) = attrs.get("url").filter(|u| !u.is_empty()) {
                return Some(normalize_url(url));
            }
        }
    }

    if let Some(url) = MEDIA_THUMBNAIL
        .captures_iter(block)
        .find_map(|cap| attributes(&cap[1]).remove("url").filter(|u| !u.is_empty()))
    {
        return Some(normalize_url(&url));
    }

    for cap in ENCLOSURE.captures_iter(block) {
        let attrs = attributes(&cap[1]);
        let is_image = attrs.get("type").map(|t| t.starts_with("image/")).unwrap_or(false);
        if is_image {
            if let Some(url) = attrs.get("url").filter(|u| !u.is_empty()) {
                return Some(normalize_url(url));
            }
        }
    }

    // Escaped markup inside <description> is common; decode before looking for <img>.
    let html = decode_entities(description);
    IMG.captures_iter(&html)
        .find_map(|cap| attributes(&cap[1]).remove("src").filter(|s| !s.is_empty() && !s.starts_with("data:")))
        .map(|src| normalize_url(&src))
}

/// Trims, decodes `&amp;` and friends, and upgrades protocol-relative URLs.
pub fn normalize_url(raw: &str) -> String {
    let url = decode_entities(raw.trim());
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    url
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
  <title>Portal</title>
  <link>https://portal.example.com</link>
  <item>
    <title><![CDATA[Copom mantém Selic em 10,5% ao ano]]></title>
    <link>https://portal.example.com/economia/selic?utm=rss&amp;x=1</link>
    <description><![CDATA[<p>O Comitê de Política Monetária decidiu...</p>]]></description>
    <pubDate>Wed, 19 Jun 2024 21:35:00 -0300</pubDate>
    <media:content url="https://img.example.com/selic.jpg" medium="image" />
  </item>
  <item>
    <title>Sem link</title>
    <description>ignorado</description>
  </item>
  <item>
    <title>Seleção vence amistoso</title>
    <link>https://portal.example.com/esportes/amistoso</link>
    <description>&lt;img src="//img.example.com/jogo.png"&gt; Resumo do jogo</description>
    <enclosure url="https://cdn.example.com/audio.mp3" type="audio/mpeg" />
  </item>
  <item>
    <title>Terceira</title>
    <link>https://portal.example.com/terceira</link>
    <enclosure url="http://cdn.example.com/foto.jpg" type="image/jpeg" length="1" />
  </item>
</channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Blog</title>
  <link href="https://blog.example.com/" rel="self"/>
  <entry>
    <title type="html">Nova vacina aprovada &amp; distribuída</title>
    <link rel="self" href="https://blog.example.com/api/1"/>
    <link rel="alternate" type="text/html" href="https://blog.example.com/vacina"/>
    <published>2024-06-20T10:00:00Z</published>
    <summary>Resumo da notícia</summary>
  </entry>
  <entry>
    <title>Sem rel</title>
    <link href="https://blog.example.com/sem-rel"/>
    <updated>2024-06-21T08:30:00-03:00</updated>
    <content type="html">&lt;p&gt;Corpo&lt;/p&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn reads_rss_items_and_drops_items_without_link() {
        let items = extract_items(RSS, 10);
        assert_eq!(items.len(), 3);

        let first = &items[0];
        assert_eq!(first.title, "Copom mantém Selic em 10,5% ao ano");
        assert_eq!(first.link, "https://portal.example.com/economia/selic?utm=rss&x=1");
        assert_eq!(first.description, "<p>O Comitê de Política Monetária decidiu...</p>");
        assert_eq!(first.image_url.as_deref(), Some("https://img.example.com/selic.jpg"));
        assert_eq!(first.pub_date, Some(Utc.with_ymd_and_hms(2024, 6, 20, 0, 35, 0).unwrap()));
    }

    #[test]
    fn falls_back_to_img_in_description_and_image_enclosures() {
        let items = extract_items(RSS, 10);
        assert_eq!(items[1].image_url.as_deref(), Some("https://img.example.com/jogo.png"));
        assert_eq!(items[1].pub_date, None);
        assert_eq!(items[2].image_url.as_deref(), Some("http://cdn.example.com/foto.jpg"));
    }

    #[test]
    fn limit_applies_after_filtering() {
        let items = extract_items(RSS, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title, "Seleção vence amistoso");
    }

    #[test]
    fn reads_atom_entries_preferring_alternate_links() {
        let items = extract_items(ATOM, 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Nova vacina aprovada & distribuída");
        assert_eq!(items[0].link, "https://blog.example.com/vacina");
        assert_eq!(items[0].description, "Resumo da notícia");
        assert_eq!(items[0].pub_date, Some(Utc.with_ymd_and_hms(2024, 6, 20, 10, 0, 0).unwrap()));

        assert_eq!(items[1].link, "https://blog.example.com/sem-rel");
        assert_eq!(items[1].description, "&lt;p&gt;Corpo&lt;/p&gt;");
        assert_eq!(items[1].pub_date, Some(Utc.with_ymd_and_hms(2024, 6, 21, 11, 30, 0).unwrap()));
    }

    #[test]
    fn guid_is_used_when_it_is_a_url() {
        let xml = "<rss><channel><item><title>Só guid</title><guid isPermaLink=\"true\">https://x.example.com/a</guid></item></channel></rss>";
        let items = extract_items(xml, 5);
        assert_eq!(items[0].link, "https://x.example.com/a");
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(extract_items("<html><body>not a feed</body></html>", 5).is_empty());
        assert_eq!(parse_date("ontem à tarde"), None);
        assert!(parse_date("2024-06-01 12:00:00").is_some());
    }
}
