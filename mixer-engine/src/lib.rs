//! # Mashup Matching & Composition Engine
//!
//! Given analyzed track profiles, finds compatible pairings and composes mashups:
//! - `harmony`: Camelot keys, tempo stretch bounds
//! - `curator`: candidate filtering, weighted scoring, reciprocal rank fusion
//! - `recommender`: rule-based strategy choice for a pair
//! - `engineer`: the eight composition strategies and their shared pipeline
//! - `jobs`: bounded concurrent execution with per-job time budgets
//!
//! Profiles and audio come from a [`store::ProfileStore`]; semantic similarity comes
//! from a [`similarity::SimilarityIndex`]. Neither is mutated here.

pub mod alignment;
pub mod config;
pub mod curator;
pub mod dsp;
pub mod engineer;
pub mod error;
pub mod harmony;
pub mod jobs;
pub mod recommender;
pub mod retry;
pub mod similarity;
pub mod store;
pub mod wav;

pub use config::MixerConfig;
pub use curator::{CandidateMatch, CandidatePool, Curator, MatchMode, MatchRequest, PairRecommendation};
pub use engineer::{Decision, Engineer, MashupJob, MashupResult, StrategyKind};
pub use error::{ErrorCategory, MashupError, Result};
pub use harmony::{key_distance, parse_key, stretch_ratio, validate_stretch, Key, TempoMatch};
pub use jobs::{JobOutcome, JobReport, JobRunner};
pub use recommender::{recommend, Recommendation};
pub use similarity::{SimilarityIndex, TokenSimilarityIndex};
pub use store::{InMemoryProfileStore, ProfileStore, SqliteProfileStore};
