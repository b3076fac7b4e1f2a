use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;

/// Include/import syntaxes recognised in any file, in scan order.
static INCLUDE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"#\s*include\s*[<"]([^>"]+)[>"]"#,
        r#"import\s+['"]([^'"]+)['"]"#,
        r#"from\s+['"]([^'"]+)['"]"#,
        r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
        r#"@import\s+['"]([^'"]+)['"]"#,
        r#"<link[^>]+href=['"]([^'"]+)['"]"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Extensions that mark an include as already complete.
const KNOWN_EXTENSIONS: [&str; 7] = ["h", "c", "cpp", "hpp", "py", "js", "css"];

/// Extensions tried, in order, for an include written without one.
const COMPLETION_EXTENSIONS: [&str; 3] = [".h", ".py", ".js"];

/// Extract included/imported paths from file content, pattern by pattern,
/// in match order. Duplicates are kept; callers dedupe.
pub fn extract_includes(content: &str) -> Vec<String> {
    INCLUDE_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(content))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Complete an extensionless include against the tracked file list.
///
/// `linux/kgsl` becomes `linux/kgsl.h` when a tracked file ends with it.
/// Paths with a known extension, or a dotted base name, are returned as is.
pub fn complete_include(include: &str, tracked: &[String]) -> String {
    let path = Utf8Path::new(include);
    if let Some(ext) = path.extension()
        && KNOWN_EXTENSIONS.contains(&ext)
    {
        return include.to_string();
    }
    if path.file_name().is_some_and(|name| name.contains('.')) {
        return include.to_string();
    }

    for ext in COMPLETION_EXTENSIONS {
        let candidate = format!("{include}{ext}");
        if tracked.iter().any(|f| f.ends_with(&candidate)) {
            return candidate;
        }
    }
    include.to_string()
}
