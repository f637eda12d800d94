//! Mashup strategy recommender
//!
//! An ordered rule list evaluated top to bottom. Each rule is a pure predicate over
//! facts derived from the two profiles; the first match is the primary strategy. The
//! fallback is the rule's own fallback when it names one, otherwise the next matching
//! rule's strategy. The final rule always matches, so there is always an answer.

use crate::config::RecommenderConfig;
use crate::engineer::StrategyKind;
use crate::harmony::parse_key;
use mixer_common::{TrackProfile, VocalDensity};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Facts about a pair that the rules inspect
#[derive(Debug, Clone, PartialEq)]
pub struct PairFacts {
    pub both_have_sections: bool,
    pub both_have_vocals: bool,
    /// `None` when either key spelling is unreadable
    pub key_distance: Option<u32>,
    pub shared_themes: Vec<String>,
    /// Jaccard overlap of the two theme sets
    pub theme_overlap: f64,
    pub question_answer: bool,
    pub narrative_reflection: bool,
    pub has_dense: bool,
    pub has_sparse: bool,
    pub distinct_tones: usize,
    pub energy_diff: f64,
}

impl PairFacts {
    pub fn from_profiles(a: &TrackProfile, b: &TrackProfile) -> Self {
        let key_distance = match (parse_key(&a.key), parse_key(&b.key)) {
            (Ok(ka), Ok(kb)) => Some(ka.distance(&kb)),
            _ => None,
        };

        let themes_a = a.theme_set();
        let themes_b = b.theme_set();
        let shared: Vec<String> = themes_a.intersection(&themes_b).cloned().collect();
        let union = themes_a.union(&themes_b).count();
        let theme_overlap = if union == 0 {
            0.0
        } else {
            shared.len() as f64 / union as f64
        };

        let funcs_a = a.lyrical_functions();
        let funcs_b = b.lyrical_functions();
        let crosses = |x: &str, y: &str| {
            (funcs_a.contains(x) && funcs_b.contains(y)) || (funcs_b.contains(x) && funcs_a.contains(y))
        };

        let densities: Vec<VocalDensity> = a
            .sections
            .iter()
            .chain(b.sections.iter())
            .map(|s| s.vocal_density)
            .collect();

        let tones: BTreeSet<String> = a
            .tones_in_order()
            .into_iter()
            .chain(b.tones_in_order())
            .collect();

        Self {
            both_have_sections: a.has_sections() && b.has_sections(),
            both_have_vocals: a.has_vocals && b.has_vocals,
            key_distance,
            shared_themes: shared,
            theme_overlap,
            question_answer: crosses("question", "answer"),
            narrative_reflection: crosses("narrative", "reflection"),
            has_dense: densities.contains(&VocalDensity::Dense),
            has_sparse: densities.contains(&VocalDensity::Sparse),
            distinct_tones: tones.len(),
            energy_diff: (a.energy_level - b.energy_level).abs(),
        }
    }
}

/// Rule predicate: `Some(reason)` when the rule applies
pub type Predicate = fn(&PairFacts, &RecommenderConfig) -> Option<String>;

pub struct Rule {
    pub name: &'static str,
    pub strategy: StrategyKind,
    /// Overrides "next matching rule" as the fallback
    pub fallback: Option<StrategyKind>,
    /// Skipped unless both profiles carry section metadata
    pub requires_sections: bool,
    pub predicate: Predicate,
}

/// Recommender output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub primary: StrategyKind,
    pub fallback: StrategyKind,
    /// Reasons of every matching rule, in rule order
    pub reasons: Vec<String>,
    pub matched_rules: Vec<String>,
    /// Theme to use when the primary is theme filtering
    pub suggested_theme: Option<String>,
}

fn missing_sections(f: &PairFacts, _: &RecommenderConfig) -> Option<String> {
    (!f.both_have_sections).then(|| {
        "Section metadata missing - only whole-track swaps are possible".to_string()
    })
}

fn key_clash(f: &PairFacts, _: &RecommenderConfig) -> Option<String> {
    match f.key_distance {
        Some(d) if d > 1 => Some(format!(
            "Keys are {} steps apart - transposing the instrumental fixes the clash",
            d
        )),
        _ => None,
    }
}

fn shared_themes(f: &PairFacts, cfg: &RecommenderConfig) -> Option<String> {
    (!f.shared_themes.is_empty() && f.theme_overlap >= cfg.theme_overlap_threshold).then(|| {
        format!(
            "Strong theme overlap ({:.0}%): {}",
            f.theme_overlap * 100.0,
            f.shared_themes.join(", ")
        )
    })
}

fn complementary_functions(f: &PairFacts, _: &RecommenderConfig) -> Option<String> {
    if f.question_answer {
        Some("Complementary lyrical functions (question -> answer)".to_string())
    } else if f.narrative_reflection {
        Some("Complementary lyrical functions (narrative -> reflection)".to_string())
    } else {
        None
    }
}

fn vocal_contrast(f: &PairFacts, _: &RecommenderConfig) -> Option<String> {
    (f.both_have_vocals && f.has_dense && f.has_sparse).then(|| {
        "Contrasting vocal densities - lead/harmony/texture roles available".to_string()
    })
}

fn tone_palette(f: &PairFacts, cfg: &RecommenderConfig) -> Option<String> {
    (f.distinct_tones >= cfg.min_arc_tones).then(|| {
        format!(
            "{} distinct emotional tones - enough for an arc",
            f.distinct_tones
        )
    })
}

fn similar_energy(f: &PairFacts, cfg: &RecommenderConfig) -> Option<String> {
    (f.energy_diff <= cfg.energy_similarity).then(|| {
        format!("Similar energy (difference {:.2}) - sections interleave cleanly", f.energy_diff)
    })
}

fn always(_: &PairFacts, _: &RecommenderConfig) -> Option<String> {
    Some("Default: vocal + instrumental swap".to_string())
}

/// Rule list in evaluation order
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "missing_sections",
            strategy: StrategyKind::DirectSwap,
            fallback: Some(StrategyKind::StemAssembly),
            requires_sections: false,
            predicate: missing_sections,
        },
        Rule {
            name: "key_clash",
            strategy: StrategyKind::KeyCorrected,
            fallback: Some(StrategyKind::DirectSwap),
            requires_sections: false,
            predicate: key_clash,
        },
        Rule {
            name: "shared_themes",
            strategy: StrategyKind::ThemeFiltered,
            fallback: None,
            requires_sections: true,
            predicate: shared_themes,
        },
        Rule {
            name: "complementary_functions",
            strategy: StrategyKind::Dialogue,
            fallback: None,
            requires_sections: true,
            predicate: complementary_functions,
        },
        Rule {
            name: "vocal_contrast",
            strategy: StrategyKind::RoleAware,
            fallback: None,
            requires_sections: true,
            predicate: vocal_contrast,
        },
        Rule {
            name: "tone_palette",
            strategy: StrategyKind::SemanticArc,
            fallback: None,
            requires_sections: true,
            predicate: tone_palette,
        },
        Rule {
            name: "similar_energy",
            strategy: StrategyKind::EnergyMatched,
            fallback: None,
            requires_sections: true,
            predicate: similar_energy,
        },
        Rule {
            name: "default",
            strategy: StrategyKind::DirectSwap,
            fallback: Some(StrategyKind::StemAssembly),
            requires_sections: false,
            predicate: always,
        },
    ]
}

/// Evaluate `rules` against `facts`
pub fn evaluate(rules: &[Rule], facts: &PairFacts, cfg: &RecommenderConfig) -> Recommendation {
    let mut matched: Vec<(&Rule, String)> = Vec::new();
    for rule in rules {
        if rule.requires_sections && !facts.both_have_sections {
            continue;
        }
        if let Some(reason) = (rule.predicate)(facts, cfg) {
            debug!(rule = rule.name, strategy = %rule.strategy, "Recommender rule matched");
            matched.push((rule, reason));
        }
    }

    let (primary, fallback) = match matched.first() {
        Some((rule, _)) => {
            let fallback = rule.fallback.unwrap_or_else(|| {
                matched
                    .iter()
                    .skip(1)
                    .map(|(r, _)| r.strategy)
                    .find(|s| *s != rule.strategy)
                    .unwrap_or(StrategyKind::DirectSwap)
            });
            (rule.strategy, fallback)
        }
        None => (StrategyKind::DirectSwap, StrategyKind::StemAssembly),
    };

    let suggested_theme = if primary == StrategyKind::ThemeFiltered {
        facts.shared_themes.first().cloned()
    } else {
        None
    };

    Recommendation {
        primary,
        fallback,
        reasons: matched.iter().map(|(_, reason)| reason.clone()).collect(),
        matched_rules: matched.iter().map(|(r, _)| r.name.to_string()).collect(),
        suggested_theme,
    }
}

/// Recommend a strategy for two in-hand profiles
pub fn recommend(a: &TrackProfile, b: &TrackProfile, cfg: &RecommenderConfig) -> Recommendation {
    let facts = PairFacts::from_profiles(a, b);
    evaluate(&default_rules(), &facts, cfg)
}
