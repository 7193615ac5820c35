use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("code block pattern is valid"))
}

/// Escapes HTML outside fenced code blocks (```), leaving the blocks
/// untouched. Existing entities are decoded first so nothing is escaped
/// twice.
pub fn sanitize_post_content(markdown_input: &str) -> String {
    let mut code_blocks: Vec<String> = Vec::new();

    let with_placeholders = code_block_regex().replace_all(markdown_input, |caps: &regex::Captures| {
        code_blocks.push(caps[0].to_string());
        format!("__CODE_BLOCK_PLACEHOLDER_{}__", code_blocks.len() - 1)
    });

    let decoded = html_escape::decode_html_entities(&with_placeholders);
    let mut output = html_escape::encode_text(&decoded).to_string();

    for (i, block) in code_blocks.iter().enumerate() {
        let placeholder = format!("__CODE_BLOCK_PLACEHOLDER_{}__", i);
        output = output.replacen(&placeholder, block, 1);
    }
    output
}

/// Removes every tag, keeping text. Used for titles, names and comments.
/// The result stays entity-encoded; it is never decoded back into markup.
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
        .trim()
        .to_string()
}

pub fn strip_optional(input: Option<&str>) -> Option<String> {
    input
        .map(strip_all_html)
        .filter(|s| !s.is_empty())
}
