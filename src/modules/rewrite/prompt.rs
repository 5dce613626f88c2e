use crate::modules::ingest::FeedItem;
use crate::modules::validation::CATEGORIES;

pub const SYSTEM_PROMPT: &str = r#"Você é editor-chefe de um portal de notícias brasileiro.
Reescreva a matéria de origem com texto 100% original, em português do Brasil, tom jornalístico, imparcial, sem inventar fatos.

### REGRAS
1. Não copie frases inteiras da fonte. Preserve nomes, números, datas e citações.
2. O campo "content" deve ter no mínimo 4 parágrafos, separados por linha em branco, sem HTML.
3. "summary" entre 50 e 300 caracteres. "title" entre 10 e 120 caracteres.
4. "tags": EXATAMENTE 12 tags distintas, minúsculas, curtas (até 40 caracteres).
5. "category": use apenas uma das categorias permitidas.
6. "image.url" somente se houver imagem da fonte com https; caso contrário omita "image".

### FORMATO DE SAÍDA (SOMENTE JSON, SEM COMENTÁRIOS)
{
  "title": "...",
  "slug": "titulo-em-kebab-case-sem-acentos",
  "summary": "...",
  "content": "...",
  "category": "...",
  "tags": ["...", "... (12 itens)"],
  "seo": { "meta_title": "até 60 caracteres", "meta_description": "até 160 caracteres", "keywords": ["..."] },
  "image": { "url": "https://...", "alt": "descrição da imagem", "credit": "fonte" }
}"#;

pub fn build_user_prompt(item: &FeedItem, source_text: &str, default_category: Option<&str>) -> String {
    let published = item
        .pub_date
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "desconhecida".to_string());
    let image = item.image_url.as_deref().unwrap_or("nenhuma");
    let category_hint = default_category.unwrap_or("escolha a mais adequada");

    format!(
        r#"=== CATEGORIAS PERMITIDAS ===
{}

=== CATEGORIA SUGERIDA PELO FEED ===
{}

=== MATÉRIA DE ORIGEM ===
Título: {}
URL: {}
Publicada em: {}
Imagem: {}

{}
"#,
        CATEGORIES.join(", "),
        category_hint,
        item.title,
        item.link,
        published,
        image,
        source_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_carries_source_fields() {
        let item = FeedItem {
            title: "Chuva forte no Sul".to_string(),
            link: "https://example.com/chuva".to_string(),
            description: String::new(),
            pub_date: None,
            image_url: None,
        };
        let prompt = build_user_prompt(&item, "Texto da matéria.", Some("brasil"));
        assert!(prompt.contains("Título: Chuva forte no Sul"));
        assert!(prompt.contains("URL: https://example.com/chuva"));
        assert!(prompt.contains("Publicada em: desconhecida"));
        assert!(prompt.contains("politica, economia"));
        assert!(prompt.contains("=== CATEGORIA SUGERIDA PELO FEED ===\nbrasil"));
        assert!(prompt.trim_end().ends_with("Texto da matéria."));
    }
}
