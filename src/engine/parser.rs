use anyhow::{Context, Result, anyhow};
use tree_sitter::{Parser, Tree};

use crate::language::LangId;

/// Files larger than this are not parsed; callers fall back to line heuristics.
pub const MAX_PARSE_SIZE: usize = 4 * 1024 * 1024;

/// Parse source text with a known language.
pub fn parse_source(source: &str, lang_id: LangId) -> Result<Tree> {
    if source.len() > MAX_PARSE_SIZE {
        return Err(anyhow!(
            "Source too large to parse ({} bytes > {} bytes)",
            source.len(),
            MAX_PARSE_SIZE
        ));
    }

    let mut parser = Parser::new();
    parser
        .set_language(&lang_id.ts_language())
        .context("Failed to set parser language")?;

    parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| anyhow!("Failed to parse {lang_id:?} source"))
}

/// Whether the grammar for `lang_id` loads into a parser.
pub fn grammar_available(lang_id: LangId) -> bool {
    let mut parser = Parser::new();
    parser.set_language(&lang_id.ts_language()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rust_source() {
        let tree = parse_source("fn main() {}\n", LangId::Rust).unwrap();
        assert_eq!(tree.root_node().kind(), "source_file");
    }

    #[test]
    fn oversized_source_is_rejected() {
        let big = "a".repeat(MAX_PARSE_SIZE + 1);
        assert!(parse_source(&big, LangId::C).is_err());
    }
}
