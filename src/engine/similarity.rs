//! Levenshtein-based name similarity used to find renamed files.

use std::num::NonZeroUsize;

use camino::Utf8Path;
use lru::LruCache;

use crate::models::similarity::SimilarityCandidate;

/// Bonus when a candidate lives in exactly the same directory as the target.
pub const SAME_DIR_BONUS: u32 = 20;
/// Bonus when the two directories are themselves near-identical.
pub const SIMILAR_DIR_BONUS: u32 = 10;
/// Directory similarity needed for [`SIMILAR_DIR_BONUS`].
pub const SIMILAR_DIR_THRESHOLD: u32 = 80;
/// Candidates returned by [`find_similar_files`].
pub const MAX_CANDIDATES: usize = 5;

/// Classic Levenshtein distance over chars, one rolling row of `min(len) + 1`.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    let mut row: Vec<usize> = (0..=short.len()).collect();
    for (i, lc) in long.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let above = row[j + 1];
            let substitution = diagonal + usize::from(lc != sc);
            row[j + 1] = (above + 1).min(row[j] + 1).min(substitution);
            diagonal = above;
        }
    }
    row[short.len()]
}

/// Similarity percentage in `0..=100`.
///
/// Either string being empty yields 0, including when both are empty.
/// Halves round to even.
pub fn similarity(a: &str, b: &str) -> u32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let distance = edit_distance(a, b);
    let ratio = (max_len - distance) as f64 / max_len as f64 * 100.0;
    ratio.round_ties_even() as u32
}

/// Rank `files` by how likely each is the local counterpart of `target`.
///
/// Keeps candidates whose total score reaches `threshold`, sorted by score
/// descending; ties stay in enumeration order. At most five are returned.
pub fn find_similar_files<'a>(
    target: &str,
    files: impl IntoIterator<Item = &'a str>,
    threshold: u32,
) -> Vec<SimilarityCandidate> {
    let target_path = Utf8Path::new(target);
    let target_name = target_path.file_name().unwrap_or(target);
    let target_dir = target_path.parent().map(|p| p.as_str()).unwrap_or("");

    let mut candidates: Vec<SimilarityCandidate> = files
        .into_iter()
        .filter_map(|file| {
            let path = Utf8Path::new(file);
            let name = path.file_name().unwrap_or(file);
            let dir = path.parent().map(|p| p.as_str()).unwrap_or("");

            let mut score = similarity(target_name, name);
            if dir == target_dir {
                score += SAME_DIR_BONUS;
            } else if similarity(dir, target_dir) >= SIMILAR_DIR_THRESHOLD {
                score += SIMILAR_DIR_BONUS;
            }

            (score >= threshold).then(|| SimilarityCandidate {
                path: file.to_string(),
                score,
            })
        })
        .collect();

    // Stable sort keeps enumeration order among equal scores.
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

/// Per-run memo of [`find_similar_files`] results keyed by target path.
pub struct SimilarityCache {
    entries: LruCache<String, Vec<SimilarityCandidate>>,
}

impl Default for SimilarityCache {
    fn default() -> Self {
        Self::new(256)
    }
}

impl SimilarityCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get_or_compute(
        &mut self,
        target: &str,
        compute: impl FnOnce() -> Vec<SimilarityCandidate>,
    ) -> Vec<SimilarityCandidate> {
        if let Some(hit) = self.entries.get(target) {
            return hit.clone();
        }
        let computed = compute();
        self.entries.put(target.to_string(), computed.clone());
        computed
    }
}
