//! Compatibility scorer
//!
//! `find_matches` runs a mandatory hard filter (tempo within tolerance, key distance at
//! most one step) and then ranks survivors harmonically, semantically, or by reciprocal
//! rank fusion of both. Every returned match is mixable regardless of mode, and the
//! ordering is deterministic: ties always fall back to a documented secondary key and
//! finally the candidate id.

pub mod fusion;
pub mod scoring;

use crate::config::{MixerConfig, ScoreWeights};
use crate::engineer::StrategyKind;
use crate::error::{MashupError, Result};
use crate::harmony::{parse_key, Key};
use crate::recommender::{recommend, Recommendation};
use crate::retry::{retry_transient, RetryPolicy};
use crate::similarity::{profile_document, SimilarityIndex};
use crate::store::ProfileStore;
use mixer_common::TrackProfile;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use fusion::reciprocal_rank_fusion;
pub use scoring::{compatibility, Compatibility, SubScores};

/// Ranking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Ascending tempo difference
    Harmonic,
    /// Descending similarity to a text query
    Semantic,
    /// Reciprocal rank fusion of the harmonic and semantic rankings
    #[default]
    Hybrid,
}

impl std::str::FromStr for MatchMode {
    type Err = MashupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "harmonic" => Ok(MatchMode::Harmonic),
            "semantic" => Ok(MatchMode::Semantic),
            "hybrid" => Ok(MatchMode::Hybrid),
            other => Err(MashupError::InvalidJob(format!("unknown match mode '{}'", other))),
        }
    }
}

/// Where candidates come from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidatePool {
    #[default]
    Library,
    Ids(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub target_id: String,
    #[serde(default)]
    pub pool: CandidatePool,
    #[serde(default)]
    pub mode: Option<MatchMode>,
    /// Defaults to `curator.max_candidates`
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Query text for semantic and hybrid modes; defaults to the target's own description
    #[serde(default)]
    pub semantic_query: Option<String>,
    /// Keep only candidates whose primary genre matches (case-insensitive)
    #[serde(default)]
    pub genre_filter: Option<String>,
    #[serde(default)]
    pub weights: Option<ScoreWeights>,
}

impl MatchRequest {
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            pool: CandidatePool::Library,
            mode: None,
            max_results: None,
            semantic_query: None,
            genre_filter: None,
            weights: None,
        }
    }

    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn pool(mut self, ids: Vec<String>) -> Self {
        self.pool = CandidatePool::Ids(ids);
        self
    }

    pub fn max_results(mut self, n: usize) -> Self {
        self.max_results = Some(n);
        self
    }

    pub fn query(mut self, text: impl Into<String>) -> Self {
        self.semantic_query = Some(text.into());
        self
    }
}

/// One ranked candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateMatch {
    pub target_id: String,
    pub candidate_id: String,
    /// Weighted compatibility score in [0, 1]
    pub score: f64,
    /// Value the list is ordered by (tempo score, similarity or fused score per mode)
    pub ranking_score: f64,
    pub sub_scores: SubScores,
    pub reasons: Vec<String>,
}

/// Library-wide pair suggestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairRecommendation {
    pub track_a: String,
    pub track_b: String,
    pub score: f64,
    pub sub_scores: SubScores,
    pub reasons: Vec<String>,
    pub recommendation: Recommendation,
}

struct Survivor {
    profile: TrackProfile,
    key: Key,
    tempo_diff: f64,
    key_distance: u32,
}

pub struct Curator {
    store: Arc<dyn ProfileStore>,
    index: Arc<dyn SimilarityIndex>,
    config: Arc<MixerConfig>,
    retry: RetryPolicy,
}

impl Curator {
    pub fn new(store: Arc<dyn ProfileStore>, index: Arc<dyn SimilarityIndex>, config: Arc<MixerConfig>) -> Self {
        let retry = RetryPolicy::from(&config.jobs);
        Self {
            store,
            index,
            config,
            retry,
        }
    }

    /// Rank compatible candidates for `request.target_id`
    ///
    /// Unknown target fails with `ProfileNotFound`; an empty filtered pool is an empty list.
    pub async fn find_matches(&self, request: &MatchRequest) -> Result<Vec<CandidateMatch>> {
        let cfg = &self.config.curator;
        let mode = request.mode.unwrap_or(cfg.default_mode);
        let max_results = request.max_results.unwrap_or(cfg.max_candidates);
        let weights = request.weights.unwrap_or(cfg.weights);

        let target_id = request.target_id.as_str();
        let target = retry_transient("get_profile", &self.retry, || self.store.get_profile(target_id)).await?;
        let target_key = parse_key(&target.key).map_err(|e| e.with_track(&target.id))?;
        if !(target.bpm.is_finite() && target.bpm > 0.0) {
            return Err(MashupError::InvalidProfile {
                id: target.id.clone(),
                reason: format!("tempo {} is not positive", target.bpm),
            });
        }

        info!(
            target_id,
            mode = ?mode,
            max_results,
            "Finding matches"
        );

        let pool = self.load_pool(&request.pool, target_id).await?;
        let survivors = self.hard_filter(&target, &target_key, pool, request.genre_filter.as_deref());

        info!(target_id, survivors = survivors.len(), "Hard filter complete");
        if survivors.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let harmonic_order = harmonic_ranking(&survivors);

        let mut similarities: BTreeMap<String, f64> = BTreeMap::new();
        let mut semantic_order: Vec<String> = Vec::new();
        let mut query_text = String::new();
        if mode != MatchMode::Harmonic {
            query_text = semantic_query_text(request, &target)?;
            let ids: Vec<String> = survivors.iter().map(|s| s.profile.id.clone()).collect();
            let ranked = retry_transient("semantic_query", &self.retry, || {
                self.index.semantic_query(&query_text, &ids)
            })
            .await?;

            let allowed: BTreeSet<&String> = ids.iter().collect();
            let mut ranked: Vec<(String, f64)> =
                ranked.into_iter().filter(|(id, _)| allowed.contains(id)).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let mut seen = BTreeSet::new();
            ranked.retain(|(id, _)| seen.insert(id.clone()));

            semantic_order = ranked.iter().map(|(id, _)| id.clone()).collect();
            similarities = ranked.into_iter().collect();
        }

        let by_id: BTreeMap<&str, &Survivor> =
            survivors.iter().map(|s| (s.profile.id.as_str(), s)).collect();

        let ordered: Vec<(String, f64)> = match mode {
            MatchMode::Harmonic => harmonic_order
                .iter()
                .map(|id| {
                    let s = by_id[id.as_str()];
                    let ranking = scoring::tempo_score(target.bpm, s.profile.bpm, cfg.bpm_tolerance);
                    (id.clone(), ranking)
                })
                .collect(),
            MatchMode::Semantic => semantic_order
                .iter()
                .map(|id| (id.clone(), similarities[id]))
                .collect(),
            MatchMode::Hybrid => {
                let fused = reciprocal_rank_fusion(&[harmonic_order.clone(), semantic_order.clone()], cfg.rrf_k);
                let mut fused: Vec<(String, f64)> = fused.into_iter().collect();
                fused.sort_by(|a, b| {
                    let ta = by_id[a.0.as_str()].tempo_diff;
                    let tb = by_id[b.0.as_str()].tempo_diff;
                    b.1.total_cmp(&a.1)
                        .then_with(|| ta.total_cmp(&tb))
                        .then_with(|| a.0.cmp(&b.0))
                });
                fused
            }
        };

        let matches: Vec<CandidateMatch> = ordered
            .into_iter()
            .take(max_results)
            .map(|(id, ranking_score)| {
                let s = by_id[id.as_str()];
                let mut compat = compatibility(&target, &target_key, &s.profile, &s.key, cfg, &weights);
                if let Some(sim) = similarities.get(&id) {
                    compat.sub_scores.semantic = Some(*sim);
                    compat
                        .reasons
                        .push(format!("Semantic: {:.2} similarity to \"{}\"", sim, query_text));
                }
                if mode == MatchMode::Hybrid {
                    compat.reasons.insert(0, format!("Fused rank score: {:.4}", ranking_score));
                }
                CandidateMatch {
                    target_id: target.id.clone(),
                    candidate_id: id,
                    score: compat.score,
                    ranking_score,
                    sub_scores: compat.sub_scores,
                    reasons: compat.reasons,
                }
            })
            .collect();

        info!(target_id, returned = matches.len(), "Matches found");
        Ok(matches)
    }

    async fn load_pool(&self, pool: &CandidatePool, target_id: &str) -> Result<Vec<TrackProfile>> {
        let profiles = match pool {
            CandidatePool::Library => {
                retry_transient("list_profiles", &self.retry, || self.store.list_profiles()).await?
            }
            CandidatePool::Ids(ids) => {
                let unique: BTreeSet<&String> = ids.iter().collect();
                let mut profiles = Vec::with_capacity(unique.len());
                for id in unique {
                    if id == target_id {
                        continue;
                    }
                    let profile =
                        retry_transient("get_profile", &self.retry, || self.store.get_profile(id)).await?;
                    profiles.push(profile);
                }
                profiles
            }
        };
        Ok(profiles.into_iter().filter(|p| p.id != target_id).collect())
    }

    fn hard_filter(
        &self,
        target: &TrackProfile,
        target_key: &Key,
        pool: Vec<TrackProfile>,
        genre_filter: Option<&str>,
    ) -> Vec<Survivor> {
        let cfg = &self.config.curator;
        pool.into_iter()
            .filter_map(|profile| {
                let key = match parse_key(&profile.key) {
                    Ok(key) => key,
                    Err(err) => {
                        warn!(candidate_id = %profile.id, error = %err, "Skipping candidate with unreadable key");
                        return None;
                    }
                };
                if !(profile.bpm.is_finite() && profile.bpm > 0.0) {
                    warn!(candidate_id = %profile.id, bpm = profile.bpm, "Skipping candidate with invalid tempo");
                    return None;
                }

                let tempo_diff = (profile.bpm - target.bpm).abs();
                let key_distance = target_key.distance(&key);
                if tempo_diff / target.bpm > cfg.bpm_tolerance + 1e-12 {
                    debug!(candidate_id = %profile.id, bpm = profile.bpm, "Rejected: tempo");
                    return None;
                }
                if key_distance > cfg.max_key_distance {
                    debug!(candidate_id = %profile.id, key_distance, "Rejected: key");
                    return None;
                }
                if let Some(genre) = genre_filter {
                    let matches = profile
                        .main_genre()
                        .map(|g| g.eq_ignore_ascii_case(genre.trim()))
                        .unwrap_or(false);
                    if !matches {
                        debug!(candidate_id = %profile.id, "Rejected: genre filter");
                        return None;
                    }
                }

                Some(Survivor {
                    profile,
                    key,
                    tempo_diff,
                    key_distance,
                })
            })
            .collect()
    }

    /// Score every unordered pair in the library and attach a strategy recommendation
    pub async fn find_best_pairs(
        &self,
        max_pairs: usize,
        min_compatibility: f64,
        genre_filter: Option<&str>,
    ) -> Result<Vec<PairRecommendation>> {
        let cfg = &self.config.curator;
        let profiles = retry_transient("list_profiles", &self.retry, || self.store.list_profiles()).await?;

        let mut keyed: Vec<(TrackProfile, Key)> = Vec::new();
        for profile in profiles {
            if let Some(genre) = genre_filter {
                if !profile
                    .main_genre()
                    .map(|g| g.eq_ignore_ascii_case(genre.trim()))
                    .unwrap_or(false)
                {
                    continue;
                }
            }
            match parse_key(&profile.key) {
                Ok(key) if profile.bpm > 0.0 => keyed.push((profile, key)),
                Ok(_) => warn!(track_id = %profile.id, "Skipping track with invalid tempo"),
                Err(err) => warn!(track_id = %profile.id, error = %err, "Skipping track with unreadable key"),
            }
        }

        if keyed.len() < 2 {
            warn!(tracks = keyed.len(), "Fewer than two tracks, no pairs to score");
            return Ok(Vec::new());
        }

        info!(tracks = keyed.len(), "Scoring library pairs");
        let mut pairs = Vec::new();
        for i in 0..keyed.len() {
            for j in (i + 1)..keyed.len() {
                let (a, key_a) = &keyed[i];
                let (b, key_b) = &keyed[j];
                let compat = compatibility(a, key_a, b, key_b, cfg, &cfg.weights);
                if compat.score < min_compatibility {
                    continue;
                }
                let recommendation = recommend(a, b, &self.config.recommender);
                pairs.push(PairRecommendation {
                    track_a: a.id.clone(),
                    track_b: b.id.clone(),
                    score: compat.score,
                    sub_scores: compat.sub_scores,
                    reasons: compat.reasons,
                    recommendation,
                });
            }
        }

        pairs.sort_by(|x, y| {
            y.score
                .total_cmp(&x.score)
                .then_with(|| x.track_a.cmp(&y.track_a))
                .then_with(|| x.track_b.cmp(&y.track_b))
        });
        let total = pairs.len();
        pairs.truncate(max_pairs);
        info!(returned = pairs.len(), candidates = total, "Pair discovery complete");
        Ok(pairs)
    }

    /// Recommended strategy for a pair, looked up through the store
    pub async fn recommend_strategy(&self, id_a: &str, id_b: &str) -> Result<(StrategyKind, StrategyKind)> {
        let rec = self.recommendation(id_a, id_b).await?;
        Ok((rec.primary, rec.fallback))
    }

    pub async fn recommendation(&self, id_a: &str, id_b: &str) -> Result<Recommendation> {
        let a = retry_transient("get_profile", &self.retry, || self.store.get_profile(id_a)).await?;
        let b = retry_transient("get_profile", &self.retry, || self.store.get_profile(id_b)).await?;
        Ok(recommend(&a, &b, &self.config.recommender))
    }
}

/// Survivor ids by ascending tempo difference, then key distance, then id
fn harmonic_ranking(survivors: &[Survivor]) -> Vec<String> {
    let mut order: Vec<&Survivor> = survivors.iter().collect();
    order.sort_by(|a, b| {
        a.tempo_diff
            .total_cmp(&b.tempo_diff)
            .then_with(|| a.key_distance.cmp(&b.key_distance))
            .then_with(|| a.profile.id.cmp(&b.profile.id))
    });
    order.into_iter().map(|s| s.profile.id.clone()).collect()
}

fn semantic_query_text(request: &MatchRequest, target: &TrackProfile) -> Result<String> {
    if let Some(query) = request.semantic_query.as_deref().filter(|q| !q.trim().is_empty()) {
        return Ok(query.trim().to_string());
    }
    if !target.mood_summary.trim().is_empty() {
        return Ok(target.mood_summary.trim().to_string());
    }
    let document = profile_document(target);
    if !document.trim().is_empty() {
        return Ok(document.trim().to_string());
    }
    Err(MashupError::SemanticQueryRequired {
        target_id: target.id.clone(),
    })
}
