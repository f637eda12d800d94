//! Energy-matched assembly
//!
//! Each section of A is paired with the section of B closest in energy. The output
//! follows A's structure, alternating between A's section and its B partner, with short
//! crossfades at every boundary.

use super::{plan_tempo, Pair, Pick, Side};
use crate::config::MixerConfig;
use crate::engineer::{
    Arrangement, DecisionLog, Join, Material, MaterialLayer, Segment, SourceRequest, StemNeed, Strategy,
    StrategyKind,
};
use crate::error::Result;
use mixer_common::Section;

pub struct EnergyMatched {
    pair: Pair,
}

impl EnergyMatched {
    pub fn new(track_a: String, track_b: String) -> Self {
        Self {
            pair: Pair::new(track_a, track_b),
        }
    }
}

/// Index of the section in `candidates` closest in energy to `target`
///
/// Ties prefer the same section type, then the earliest section.
pub fn closest_energy(target: &Section, candidates: &[Section]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .min_by(|(i, x), (j, y)| {
            let dx = (x.energy_level - target.energy_level).abs();
            let dy = (y.energy_level - target.energy_level).abs();
            dx.total_cmp(&dy)
                .then_with(|| {
                    let tx = x.section_type != target.section_type;
                    let ty = y.section_type != target.section_type;
                    tx.cmp(&ty)
                })
                .then_with(|| i.cmp(j))
        })
        .map(|(i, _)| i)
}

impl Strategy for EnergyMatched {
    type Selection = Vec<Pick>;

    fn kind(&self) -> StrategyKind {
        StrategyKind::EnergyMatched
    }

    fn validate(&self) -> Result<()> {
        self.pair.validate()
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

        let mut sequence = Vec::with_capacity(a.sections().len());
        let mut logged = Vec::with_capacity(a.sections().len());
        for (i, section) in a.sections().iter().enumerate() {
            let Some(j) = closest_energy(section, b.sections()) else {
                continue;
            };
            let partner = &b.sections()[j];
            let pick = if i % 2 == 0 { Pick::a(i) } else { Pick::b(j) };
            let detail = match pick.side {
                Side::A => format!(
                    "slot {}: {} (energy {:.2}) from A",
                    i, section.section_type, section.energy_level
                ),
                Side::B => format!(
                    "slot {}: {} (energy {:.2}) from B, matched to A {} (energy {:.2})",
                    i, partner.section_type, partner.energy_level, section.section_type, section.energy_level
                ),
            };
            sequence.push(pick);
            logged.push((pick, MaterialLayer::Mix, detail));
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
        let crossfade = config.engineer.effective_crossfade_sec();
        let mut segments = Vec::with_capacity(sequence.len());
        for pick in sequence {
            let audio = self.pair.render(material, pick, MaterialLayer::Mix, &config.stretch)?;
            segments.push(Segment::new(audio, Join::Crossfade(crossfade)));
        }
        Ok(Arrangement::Sequence(segments))
    }

    fn output_name(&self) -> String {
        self.pair.output_name("energy_matched")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(kind: &str, energy: f64) -> Section {
        serde_json::from_value(serde_json::json!({
            "section_type": kind, "start_sec": 0.0, "end_sec": 1.0, "energy_level": energy
        }))
        .unwrap()
    }

    #[test]
    fn test_closest_energy_wins() {
        let candidates = vec![section("verse", 0.2), section("chorus", 0.75), section("bridge", 0.5)];
        assert_eq!(closest_energy(&section("chorus", 0.8), &candidates), Some(1));
        assert_eq!(closest_energy(&section("verse", 0.45), &candidates), Some(2));
    }

    #[test]
    fn test_ties_prefer_matching_type_then_earliest() {
        let candidates = vec![section("verse", 0.6), section("chorus", 0.6), section("chorus", 0.6)];
        assert_eq!(closest_energy(&section("chorus", 0.6), &candidates), Some(1));
        assert_eq!(closest_energy(&section("bridge", 0.6), &candidates), Some(0));
        assert_eq!(closest_energy(&section("bridge", 0.6), &[]), None);
    }
}
