//! "Important symbols" of a file: names whose history is worth searching.

use std::collections::HashSet;

use anyhow::Result;
use camino::Utf8Path;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Query, QueryCursor};

use crate::engine::parser;
use crate::language::LangId;

/// Shorter names produce too many pickaxe hits to be useful.
pub const MIN_SYMBOL_LEN: usize = 3;

/// Extract the symbols of `content` that are worth a history search.
///
/// Grammar-backed extraction is used when the language is known; otherwise,
/// or when parsing fails, a generic "identifier before `(`" rule applies.
/// Only valid identifiers of at least [`MIN_SYMBOL_LEN`] chars are kept,
/// in first-seen order.
pub fn important_symbols(path: &str, content: &str) -> Vec<String> {
    let raw = match LangId::detect(Utf8Path::new(path), content) {
        Some(lang_id) => match grammar_symbols(content, lang_id) {
            Ok(names) => names,
            Err(e) => {
                debug!(path, error = %e, "grammar extraction failed, using generic rule");
                generic_symbols(content)
            }
        },
        None => generic_symbols(content),
    };

    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|name| name.chars().count() >= MIN_SYMBOL_LEN && is_identifier(name))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// ASCII identifier check: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// For each non-comment line with parentheses, the last token before `(`.
pub fn generic_symbols(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('#'))
        .filter(|line| line.contains('(') && line.contains(')'))
        .filter_map(|line| {
            let before = line.split('(').next()?.trim();
            let token = before.split_whitespace().last()?;
            is_identifier(token).then(|| token.to_string())
        })
        .collect()
}

fn grammar_symbols(content: &str, lang_id: LangId) -> Result<Vec<String>> {
    let tree = parser::parse_source(content, lang_id)?;
    let source = content.as_bytes();
    let query_src = symbol_query(lang_id);

    let language = lang_id.ts_language();
    let query = Query::new(&language, query_src)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);

    let mut names = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let capture_name = &query.capture_names()[capture.index as usize];
            if !is_symbol_capture(capture_name) {
                continue;
            }
            let name = node_text(capture.node, source);
            if !name.is_empty() {
                names.push(name);
            }
        }
    }

    Ok(names)
}

fn node_text(node: Node<'_>, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or("").to_string()
}

fn is_symbol_capture(name: &str) -> bool {
    matches!(
        name,
        "function.name"
            | "method.name"
            | "class.name"
            | "struct.name"
            | "enum.name"
            | "interface.name"
            | "trait.name"
            | "constant.name"
            | "type.name"
            | "macro.name"
    )
}

fn symbol_query(lang_id: LangId) -> &'static str {
    match lang_id {
        LangId::Rust => {
            r#"
            (function_item name: (identifier) @function.name)
            (struct_item name: (type_identifier) @struct.name)
            (enum_item name: (type_identifier) @enum.name)
            (trait_item name: (type_identifier) @trait.name)
            (const_item name: (identifier) @constant.name)
            (static_item name: (identifier) @constant.name)
            (type_item name: (type_identifier) @type.name)
            (macro_definition name: (identifier) @macro.name)
            "#
        }
        LangId::C => {
            r#"
            (function_definition declarator: (function_declarator declarator: (identifier) @function.name))
            (declaration declarator: (function_declarator declarator: (identifier) @function.name))
            (struct_specifier name: (type_identifier) @struct.name)
            (enum_specifier name: (type_identifier) @enum.name)
            (preproc_def name: (identifier) @macro.name)
            (preproc_function_def name: (identifier) @macro.name)
            "#
        }
        LangId::Cpp => {
            r#"
            (function_definition declarator: (function_declarator declarator: (identifier) @function.name))
            (class_specifier name: (type_identifier) @class.name)
            (struct_specifier name: (type_identifier) @struct.name)
            (enum_specifier name: (type_identifier) @enum.name)
            (preproc_def name: (identifier) @macro.name)
            "#
        }
        LangId::Python => {
            r#"
            (function_definition name: (identifier) @function.name)
            (class_definition name: (identifier) @class.name)
            "#
        }
        LangId::Javascript => {
            r#"
            (function_declaration name: (identifier) @function.name)
            (class_declaration name: (identifier) @class.name)
            (method_definition name: (property_identifier) @method.name)
            "#
        }
        LangId::Typescript | LangId::Tsx => {
            r#"
            (function_declaration name: (identifier) @function.name)
            (class_declaration name: (type_identifier) @class.name)
            (method_definition name: (property_identifier) @method.name)
            (interface_declaration name: (type_identifier) @interface.name)
            (type_alias_declaration name: (type_identifier) @type.name)
            (enum_declaration name: (identifier) @enum.name)
            "#
        }
        LangId::Go => {
            r#"
            (function_declaration name: (identifier) @function.name)
            (method_declaration name: (field_identifier) @method.name)
            (type_declaration (type_spec name: (type_identifier) @type.name))
            "#
        }
        LangId::Php => {
            r#"
            (function_definition name: (name) @function.name)
            (class_declaration name: (name) @class.name)
            (method_declaration name: (name) @method.name)
            (interface_declaration name: (name) @interface.name)
            (trait_declaration name: (name) @trait.name)
            "#
        }
        LangId::Java => {
            r#"
            (method_declaration name: (identifier) @function.name)
            (class_declaration name: (identifier) @class.name)
            (interface_declaration name: (identifier) @interface.name)
            (enum_declaration name: (identifier) @enum.name)
            "#
        }
        LangId::Swift => {
            r#"
            (function_declaration name: (simple_identifier) @function.name)
            (class_declaration name: (type_identifier) @class.name)
            (protocol_declaration name: (type_identifier) @interface.name)
            "#
        }
        LangId::CSharp => {
            r#"
            (method_declaration name: (identifier) @function.name)
            (class_declaration name: (identifier) @class.name)
            (struct_declaration name: (identifier) @struct.name)
            (interface_declaration name: (identifier) @interface.name)
            (enum_declaration name: (identifier) @enum.name)
            "#
        }
        LangId::Bash => {
            r#"
            (function_definition name: (word) @function.name)
            "#
        }
    }
}
