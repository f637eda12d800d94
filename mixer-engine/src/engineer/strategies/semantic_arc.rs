//! Semantic-arc assembly: sections chosen to walk an emotional sequence

use super::{plan_tempo, Pair, Pick, Side};
use crate::config::MixerConfig;
use crate::engineer::{
    Arrangement, DecisionLog, Join, Material, MaterialLayer, Segment, SourceRequest, StemNeed, Strategy,
    StrategyKind,
};
use crate::error::{MashupError, Result};
use std::collections::BTreeSet;

pub struct SemanticArc {
    pair: Pair,
    arc: Option<Vec<String>>,
}

impl SemanticArc {
    pub fn new(track_a: String, track_b: String, arc: Option<Vec<String>>) -> Self {
        Self {
            pair: Pair::new(track_a, track_b),
            arc,
        }
    }
}

/// 0 for the same tone, 0.5 when one tone contains the other ("hope"/"hopeful"), else 1
pub fn tone_distance(a: &str, b: &str) -> f64 {
    if a == b {
        0.0
    } else if !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a)) {
        0.5
    } else {
        1.0
    }
}

/// Target energy for step `k` of `n`, rising linearly from `low` to `high`
pub fn energy_target(k: usize, n: usize, low: f64, high: f64) -> f64 {
    if n <= 1 {
        return high;
    }
    low + (high - low) * k as f64 / (n - 1) as f64
}

/// A candidate section: position, tone, energy
#[derive(Debug, Clone)]
pub struct ArcCandidate {
    pub pick: Pick,
    pub tone: String,
    pub energy: f64,
}

/// Greedy walk of `arc`; each step takes the closest unused section
pub fn walk_arc(arc: &[String], candidates: &[ArcCandidate]) -> Vec<(usize, f64)> {
    let low = candidates.iter().map(|c| c.energy).fold(f64::INFINITY, f64::min);
    let high = candidates.iter().map(|c| c.energy).fold(f64::NEG_INFINITY, f64::max);
    let mut used = BTreeSet::new();
    let mut chosen = Vec::with_capacity(arc.len());

    for (k, tone) in arc.iter().enumerate() {
        let target = energy_target(k, arc.len(), low, high);
        let best = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .min_by(|(_, x), (_, y)| {
                tone_distance(&x.tone, tone)
                    .total_cmp(&tone_distance(&y.tone, tone))
                    .then_with(|| (x.energy - target).abs().total_cmp(&(y.energy - target).abs()))
                    .then_with(|| x.pick.cmp(&y.pick))
            });
        let Some((i, candidate)) = best else {
            break;
        };
        used.insert(i);
        chosen.push((i, tone_distance(&candidate.tone, tone)));
    }
    chosen
}

impl Strategy for SemanticArc {
    type Selection = Vec<Pick>;

    fn kind(&self) -> StrategyKind {
        StrategyKind::SemanticArc
    }

    fn validate(&self) -> Result<()> {
        self.pair.validate()?;
        if let Some(arc) = &self.arc {
            if arc.is_empty() || arc.iter().any(|t| t.trim().is_empty()) {
                return Err(MashupError::InvalidJob(
                    "an emotional arc needs at least one non-empty tone".into(),
                ));
            }
        }
        Ok(())
    }

    fn sources(&self) -> Vec<SourceRequest> {
        self.pair.sources(StemNeed::None)
    }

    fn select_material(
        &self,
        config: &MixerConfig,
        material: &Material,
        log: &mut DecisionLog,
    ) -> Result<Vec<Pick>> {
        let (a, b) = self.pair.sectioned(material, self.kind().as_str())?;
        plan_tempo(b, a, &config.stretch, log)?;

        let arc: Vec<String> = match &self.arc {
            Some(arc) => arc.iter().map(|t| t.trim().to_lowercase()).collect(),
            None => {
                let mut tones = a.profile.tones_in_order();
                for tone in b.profile.tones_in_order() {
                    if !tones.contains(&tone) {
                        tones.push(tone);
                    }
                }
                tones
            }
        };

        let candidates: Vec<ArcCandidate> = [(Side::A, a), (Side::B, b)]
            .into_iter()
            .flat_map(|(side, track)| {
                track.sections().iter().enumerate().map(move |(index, s)| ArcCandidate {
                    pick: Pick { side, index },
                    tone: s.tone(),
                    energy: s.energy_level,
                })
            })
            .collect();

        if arc.len() > candidates.len() {
            log.warning(format!(
                "arc has {} steps but only {} sections are available; it will be cut short",
                arc.len(),
                candidates.len()
            ));
        }

        let chosen = walk_arc(&arc, &candidates);
        let mut sequence = Vec::with_capacity(chosen.len());
        let mut logged = Vec::with_capacity(chosen.len());
        for (step, (i, distance)) in chosen.into_iter().enumerate() {
            let candidate = &candidates[i];
            let detail = if distance >= 1.0 {
                format!(
                    "arc step {} '{}': no matching tone, closest energy ('{}')",
                    step, arc[step], candidate.tone
                )
            } else {
                format!("arc step {} '{}' ('{}')", step, arc[step], candidate.tone)
            };
            sequence.push(candidate.pick);
            logged.push((candidate.pick, MaterialLayer::Mix, detail));
        }

        self.pair.log_picks(material, &logged, log)?;
        Ok(sequence)
    }

    fn transform(
        &self,
        config: &MixerConfig,
        material: &Material,
        sequence: Vec<Pick>,
        _log: &mut DecisionLog,
    ) -> Result<Arrangement> {
        let join = Join::Crossfade(config.engineer.effective_crossfade_sec());
        let mut segments = Vec::with_capacity(sequence.len());
        for pick in sequence {
            let audio = self.pair.render(material, pick, MaterialLayer::Mix, &config.stretch)?;
            segments.push(Segment::new(audio, join));
        }
        Ok(Arrangement::Sequence(segments))
    }

    fn output_name(&self) -> String {
        self.pair.output_name("semantic_arc")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(side: Side, index: usize, tone: &str, energy: f64) -> ArcCandidate {
        ArcCandidate {
            pick: Pick { side, index },
            tone: tone.to_string(),
            energy,
        }
    }

    #[test]
    fn test_tone_distance() {
        assert_eq!(tone_distance("hopeful", "hopeful"), 0.0);
        assert_eq!(tone_distance("hope", "hopeful"), 0.5);
        assert_eq!(tone_distance("defiant", "hopeful"), 1.0);
    }

    #[test]
    fn test_energy_target_rises() {
        assert_eq!(energy_target(0, 3, 0.2, 0.8), 0.2);
        assert!((energy_target(1, 3, 0.2, 0.8) - 0.5).abs() < 1e-12);
        assert_eq!(energy_target(0, 1, 0.2, 0.8), 0.8);
    }

    #[test]
    fn test_walk_follows_tones_without_reuse() {
        let candidates = vec![
            candidate(Side::A, 0, "defiant", 0.9),
            candidate(Side::A, 1, "hopeful", 0.3),
            candidate(Side::B, 0, "doubtful", 0.5),
        ];
        let arc: Vec<String> = ["hopeful", "doubtful", "defiant"].iter().map(|s| s.to_string()).collect();
        let chosen: Vec<usize> = walk_arc(&arc, &candidates).into_iter().map(|(i, _)| i).collect();
        assert_eq!(chosen, vec![1, 2, 0]);
    }

    #[test]
    fn test_ties_broken_by_energy_curve() {
        let candidates = vec![
            candidate(Side::A, 0, "calm", 0.9),
            candidate(Side::B, 0, "calm", 0.1),
        ];
        let arc = vec!["calm".to_string(), "calm".to_string()];
        let chosen: Vec<usize> = walk_arc(&arc, &candidates).into_iter().map(|(i, _)| i).collect();
        // Curve starts low: the quiet section first
        assert_eq!(chosen, vec![1, 0]);
    }
}
