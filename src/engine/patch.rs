//! Path handling inside single-commit patches (`git format-patch` output).

use std::collections::BTreeMap;

use aho_corasick::{AhoCorasick, MatchKind};

/// Header prefixes whose remainder names a path.
const PATH_HEADERS: [&str; 6] = [
    "--- ",
    "+++ ",
    "rename from ",
    "rename to ",
    "copy from ",
    "copy to ",
];

/// Paths named by the `diff --git` headers of a patch, in order, deduped.
pub fn patch_paths(patch: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for line in patch.lines() {
        let Some(rest) = line.strip_prefix("diff --git ") else {
            continue;
        };
        let Some((old, new)) = split_git_header(rest) else {
            continue;
        };
        for path in [old, new] {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// `a/<old> b/<new>` → `(old, new)`. Paths containing " b/" are ambiguous
/// and resolved by preferring equal halves.
fn split_git_header(rest: &str) -> Option<(String, String)> {
    let rest = rest.strip_prefix("a/")?;
    if rest.len() % 2 == 1 {
        let half = (rest.len() - 3) / 2;
        if rest.is_char_boundary(half)
            && rest[half..].starts_with(" b/")
            && rest[..half] == rest[half + 3..]
        {
            return Some((rest[..half].to_string(), rest[half + 3..].to_string()));
        }
    }
    let idx = rest.find(" b/")?;
    Some((rest[..idx].to_string(), rest[idx + 3..].to_string()))
}

/// Substitute renamed paths in the header lines of a patch.
///
/// Only whole path tokens inside `diff --git`, `---`/`+++`, `rename` and
/// `copy` headers are replaced; hunk content is never touched. When keys
/// overlap, the longest one wins.
pub fn rewrite_paths(patch: &str, renames: &BTreeMap<String, String>) -> String {
    let renames: Vec<(&String, &String)> =
        renames.iter().filter(|(from, to)| from != to && !from.is_empty()).collect();
    if renames.is_empty() {
        return patch.to_string();
    }

    let keys: Vec<&str> = renames.iter().map(|(from, _)| from.as_str()).collect();
    let matcher = match AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(&keys)
    {
        Ok(m) => m,
        Err(_) => return patch.to_string(),
    };

    let mut out = String::with_capacity(patch.len());
    let mut in_header = false;
    for line in patch.split_inclusive('\n') {
        if line.starts_with("diff --git ") {
            in_header = true;
        } else if line.starts_with("@@") {
            in_header = false;
        }

        let is_path_line = line.starts_with("diff --git ")
            || (in_header && PATH_HEADERS.iter().any(|h| line.starts_with(h)));

        if is_path_line {
            out.push_str(&rewrite_line(line, &matcher, &renames));
        } else {
            out.push_str(line);
        }
    }
    out
}

fn rewrite_line(line: &str, matcher: &AhoCorasick, renames: &[(&String, &String)]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for m in matcher.find_iter(line) {
        if !is_path_token(line, m.start(), m.end()) {
            continue;
        }
        out.push_str(&line[last..m.start()]);
        out.push_str(renames[m.pattern().as_usize()].1);
        last = m.end();
    }
    out.push_str(&line[last..]);
    out
}

/// A match is a whole path when it starts after `a/`, `b/`, a space or the
/// start of the line, and ends at whitespace or the end of the line.
fn is_path_token(line: &str, start: usize, end: usize) -> bool {
    let before = &line[..start];
    let starts_ok = before.is_empty()
        || before.ends_with(' ')
        || before.ends_with(" a/")
        || before.ends_with(" b/");
    let ends_ok = line[end..]
        .chars()
        .next()
        .is_none_or(|c| c.is_whitespace());
    starts_ok && ends_ok
}

/// Paths reported by a failed `git apply` / `git apply --check`.
pub fn failed_apply_paths(output: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix("error: ") else {
            continue;
        };
        let path = if let Some(p) = rest.strip_prefix("patch failed: ") {
            // "patch failed: <path>:<line>"
            p.rsplit_once(':').map(|(path, _)| path).unwrap_or(p)
        } else if let Some(p) = rest
            .strip_suffix(": patch does not apply")
            .or_else(|| rest.strip_suffix(": does not exist in index"))
            .or_else(|| rest.strip_suffix(": No such file or directory"))
            .or_else(|| rest.strip_suffix(": already exists in index"))
        {
            p
        } else {
            continue;
        };
        let path = path.trim().to_string();
        if !path.is_empty() && !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}
