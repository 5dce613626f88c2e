//! Text normalization used by the article schema.

use crate::modules::ingest::text::collapse_whitespace;

/// Lowercases and strips Portuguese (and common Latin) diacritics.
pub fn fold_accents(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

pub fn slugify(raw: &str, max_len: usize) -> String {
    let folded = fold_accents(raw);
    let mut slug = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.len() <= max_len {
        return slug.to_string();
    }
    // ASCII only at this point, byte slicing is safe.
    let cut = &slug[..max_len];
    match cut.rfind('-') {
        Some(idx) if idx > max_len / 2 => cut[..idx].to_string(),
        _ => cut.trim_end_matches('-').to_string(),
    }
}

/// Cuts `raw` to at most `max` chars, backing up to the previous word
/// boundary when that does not lose more than half the budget.
pub fn truncate_at_word(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        return raw.to_string();
    }
    let cut: String = raw.chars().take(max).collect();
    let next_is_space = raw.chars().nth(max).map(char::is_whitespace).unwrap_or(true);
    let trimmed = if next_is_space {
        cut.as_str()
    } else {
        match cut.rfind(char::is_whitespace) {
            Some(idx) if cut[..idx].chars().count() > max / 2 => &cut[..idx],
            _ => cut.as_str(),
        }
    };
    trimmed.trim_end_matches(|c: char| c.is_whitespace() || ",;:-".contains(c)).to_string()
}

/// Tag form: trimmed, lowercased, single-spaced, no leading `#`.
pub fn normalize_tag(raw: &str) -> String {
    collapse_whitespace(&raw.to_lowercase())
        .trim_start_matches('#')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_fold_accents_and_collapse_separators() {
        assert_eq!(slugify("Câmara aprova reforma tributária!", 100), "camara-aprova-reforma-tributaria");
        assert_eq!(slugify("  --São João 2024: festa -- ", 100), "sao-joao-2024-festa");
        assert_eq!(slugify("???", 100), "");
    }

    #[test]
    fn long_slugs_are_cut_on_a_dash() {
        let slug = slugify("governo anuncia pacote bilionario para infraestrutura", 30);
        assert_eq!(slug, "governo-anuncia-pacote");
        assert!(slug.len() <= 30);
    }

    #[test]
    fn truncation_prefers_word_boundaries() {
        assert_eq!(truncate_at_word("curto", 10), "curto");
        assert_eq!(truncate_at_word("Governo anuncia novo pacote", 18), "Governo anuncia");
        assert_eq!(truncate_at_word("abcdefghijklmnop", 5), "abcde");
        assert_eq!(truncate_at_word("uma, duas, tres", 9), "uma, duas");
    }

    #[test]
    fn tags_are_normalized() {
        assert_eq!(normalize_tag("  #Banco   Central "), "banco central");
        assert_eq!(normalize_tag("SELIC"), "selic");
    }
}
