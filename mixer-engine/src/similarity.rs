//! Semantic similarity seam
//!
//! Production deployments plug an embedding index in behind [`SimilarityIndex`]. The
//! bundled [`TokenSimilarityIndex`] scores tracks by bag-of-words cosine similarity over
//! their mood summary, genres, section themes and tones, which is enough for the CLI
//! and for deterministic tests.

use crate::error::Result;
use mixer_common::TrackProfile;
use std::collections::{BTreeMap, HashMap};

/// Ranked semantic lookup over a candidate pool
#[async_trait::async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Similarity of each candidate to `text`, best first
    ///
    /// Candidates the index knows nothing about are omitted.
    async fn semantic_query(&self, text: &str, candidates: &[String]) -> Result<Vec<(String, f64)>>;
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "to", "in", "on", "with", "for", "is", "it", "its", "about",
    "that", "this", "by", "as", "at", "from", "or", "but",
];

fn tokenize(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
    {
        *counts.entry(word.to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Text representation used for semantic matching
pub fn profile_document(profile: &TrackProfile) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(profile.mood_summary.clone());
    parts.extend(profile.genres.iter().cloned());
    parts.extend(profile.theme_set());
    parts.extend(profile.tones_in_order());
    parts.join(" ")
}

/// In-process bag-of-words index
#[derive(Debug, Default, Clone)]
pub struct TokenSimilarityIndex {
    documents: BTreeMap<String, HashMap<String, f64>>,
}

impl TokenSimilarityIndex {
    pub fn from_profiles<'a>(profiles: impl IntoIterator<Item = &'a TrackProfile>) -> Self {
        let documents = profiles
            .into_iter()
            .map(|p| (p.id.clone(), tokenize(&profile_document(p))))
            .collect();
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait::async_trait]
impl SimilarityIndex for TokenSimilarityIndex {
    async fn semantic_query(&self, text: &str, candidates: &[String]) -> Result<Vec<(String, f64)>> {
        let query = tokenize(text);
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .filter_map(|id| {
                self.documents
                    .get(id)
                    .map(|doc| (id.clone(), cosine(&query, doc)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(scored)
    }
}
