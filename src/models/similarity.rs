use serde::{Deserialize, Serialize};

/// A tracked file that may be the local counterpart of a missing path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityCandidate {
    pub path: String,
    /// Base-name similarity plus directory bonuses. May exceed 100.
    pub score: u32,
}
