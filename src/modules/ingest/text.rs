//! String helpers shared by the feed extractor and the page text fetcher.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static CDATA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z][a-zA-Z0-9]{1,9});").unwrap());
static INLINE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\f\v\x{A0}]+").unwrap());
static ANY_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)+").unwrap());

/// Replaces every `<![CDATA[...]]>` section with its raw contents.
pub fn unwrap_cdata(raw: &str) -> String {
    CDATA.replace_all(raw, "$1").into_owned()
}

pub fn strip_tags(raw: &str) -> String {
    TAG.replace_all(raw, "").into_owned()
}

fn named_entity(name: &str) -> Option<&'static str> {
    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "–",
        "mdash" => "—",
        "hellip" => "…",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        "laquo" => "«",
        "raquo" => "»",
        "ordf" => "ª",
        "ordm" => "º",
        "deg" => "°",
        "euro" => "€",
        "copy" => "©",
        "ccedil" => "ç",
        "Ccedil" => "Ç",
        "atilde" => "ã",
        "Atilde" => "Ã",
        "otilde" => "õ",
        "Otilde" => "Õ",
        "aacute" => "á",
        "Aacute" => "Á",
        "eacute" => "é",
        "Eacute" => "É",
        "iacute" => "í",
        "Iacute" => "Í",
        "oacute" => "ó",
        "Oacute" => "Ó",
        "uacute" => "ú",
        "Uacute" => "Ú",
        "acirc" => "â",
        "Acirc" => "Â",
        "ecirc" => "ê",
        "Ecirc" => "Ê",
        "ocirc" => "ô",
        "Ocirc" => "Ô",
        "agrave" => "à",
        "Agrave" => "À",
        "uuml" => "ü",
        _ => return None,
    };
    Some(decoded)
}

/// Decodes named and numeric character references. Unknown names are kept verbatim.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    ENTITY
        .replace_all(raw, |caps: &Captures| {
            let body = &caps[1];
            let numeric = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };

            if body.starts_with('#') {
                return numeric
                    .and_then(char::from_u32)
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| caps[0].to_string());
            }
            named_entity(body)
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Collapses all whitespace, newlines included, to single spaces.
pub fn collapse_whitespace(raw: &str) -> String {
    ANY_WS.replace_all(raw, " ").trim().to_string()
}

/// Collapses whitespace inside lines and keeps at most one blank line between paragraphs.
pub fn tidy_paragraphs(raw: &str) -> String {
    let inline = INLINE_WS.replace_all(raw, " ");
    let lines: Vec<&str> = inline.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_LINES.replace_all(&joined, "\n\n").trim().to_string()
}

/// Plain single-line text from a feed field: CDATA, tags and entities removed.
pub fn clean_inline(raw: &str) -> String {
    let unwrapped = unwrap_cdata(raw);
    // Some feeds escape their markup, so decode before stripping as well as after.
    let decoded = decode_entities(&unwrapped);
    collapse_whitespace(&decode_entities(&strip_tags(&decoded)))
}

pub fn truncate_chars(raw: &str, max: usize) -> String {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => raw[..idx].to_string(),
        None => raw.to_string(),
    }
}
