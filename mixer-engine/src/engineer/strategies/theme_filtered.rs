//! Theme-filtered assembly
//!
//! Keeps sections of either track tagged with the requested theme and plays them in
//! descending energy. A run of skipped sections between two kept sections of the same
//! track that lasts longer than the kept section before it is bridged with the
//! instrumental of the first skipped section. When nothing carries the theme the job
//! degrades to every section of both tracks.

use super::{plan_tempo, Pair, Pick, Side};
use crate::config::MixerConfig;
use crate::engineer::{
    file_part, Arrangement, DecisionLog, Join, Material, MaterialLayer, Segment, SourceRequest, StemNeed,
    Strategy, StrategyKind, TrackAudio,
};
use crate::error::{MashupError, Result};
use std::collections::BTreeMap;

pub struct ThemeFiltered {
    pair: Pair,
    theme: String,
}

#[derive(Debug, Default)]
pub struct ThemeSelection {
    /// Kept sections, in source order
    pub kept: Vec<Pick>,
    /// Instrumental filler played after a kept section
    pub fillers: BTreeMap<Pick, Pick>,
}

impl ThemeFiltered {
    pub fn new(track_a: String, track_b: String, theme: String) -> Self {
        Self {
            pair: Pair::new(track_a, track_b),
            theme,
        }
    }
}

/// Section indices of `track` carrying `theme`, in source order
pub fn matching_sections(track: &TrackAudio, theme: &str) -> Vec<usize> {
    track
        .sections()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.has_theme(theme))
        .map(|(i, _)| i)
        .collect()
}

/// Gaps worth filling: `(kept index, first skipped index)` pairs
pub fn gaps_to_fill(track: &TrackAudio, kept: &[usize]) -> Vec<(usize, usize)> {
    let sections = track.sections();
    kept.windows(2)
        .filter_map(|w| {
            let (prev, next) = (w[0], w[1]);
            if next <= prev + 1 {
                return None;
            }
            let skipped: f64 = sections[prev + 1..next].iter().map(|s| s.duration_sec()).sum();
            (skipped > sections[prev].duration_sec()).then_some((prev, prev + 1))
        })
        .collect()
}

impl Strategy for ThemeFiltered {
    type Selection = ThemeSelection;

    fn kind(&self) -> StrategyKind {
        StrategyKind::ThemeFiltered
    }

    fn validate(&self) -> Result<()> {
        self.pair.validate()?;
        if self.theme.trim().is_empty() {
            return Err(MashupError::InvalidJob("theme must not be empty".into()));
        }
        Ok(())
    }

    fn sources(&self) -> Vec<SourceRequest> {
        self.pair.sources(StemNeed::Optional)
    }

    fn select_material(
        &self,
        config: &MixerConfig,
        material: &Material,
        log: &mut DecisionLog,
    ) -> Result<ThemeSelection> {
        let (a, b) = self.pair.sectioned(material, self.kind().as_str())?;
        plan_tempo(b, a, &config.stretch, log)?;
        let theme = self.theme.trim();

        let mut selection = ThemeSelection::default();
        let mut logged = Vec::new();

        let per_side = [(Side::A, a), (Side::B, b)].map(|(side, track)| (side, track, matching_sections(track, theme)));
        let total: usize = per_side.iter().map(|(_, _, kept)| kept.len()).sum();

        if total == 0 {
            log.warning(format!(
                "no section of {} or {} carries theme '{}'",
                a.id(),
                b.id(),
                theme
            ));
            log.fallback("select", "using every section of both tracks unfiltered");
            for (side, track) in [(Side::A, a), (Side::B, b)] {
                for index in 0..track.sections().len() {
                    let pick = Pick { side, index };
                    selection.kept.push(pick);
                    logged.push((pick, MaterialLayer::Mix, "unfiltered".to_string()));
                }
            }
            self.pair.log_picks(material, &logged, log)?;
            return Ok(selection);
        }

        for (side, track, kept) in &per_side {
            for &index in kept {
                let pick = Pick { side: *side, index };
                selection.kept.push(pick);
                logged.push((pick, MaterialLayer::Mix, format!("tagged '{}'", theme)));
            }

            for (prev, filler) in gaps_to_fill(track, kept) {
                if track.has_stems() {
                    let filler_pick = Pick { side: *side, index: filler };
                    selection.fillers.insert(Pick { side: *side, index: prev }, filler_pick);
                    logged.push((
                        filler_pick,
                        MaterialLayer::Instrumental,
                        format!("instrumental gap fill after section {}", prev),
                    ));
                } else {
                    log.fallback(
                        "select",
                        format!(
                            "gap after section {} of {} left out: no instrumental stem",
                            prev,
                            track.id()
                        ),
                    );
                }
            }
        }

        self.pair.log_picks(material, &logged, log)?;
        Ok(selection)
    }

    fn transform(
        &self,
        config: &MixerConfig,
        material: &Material,
        selection: ThemeSelection,
        _log: &mut DecisionLog,
    ) -> Result<Arrangement> {
        let mut ordered = Vec::with_capacity(selection.kept.len());
        for pick in selection.kept {
            let energy = self.pair.track(material, pick.side)?.section(pick.index)?.energy_level;
            ordered.push((pick, energy));
        }
        // Stable: equal energies keep source order
        ordered.sort_by(|x, y| y.1.total_cmp(&x.1));

        let crossfade = Join::Crossfade(config.engineer.effective_crossfade_sec());
        let mut segments = Vec::new();
        for (pick, _) in ordered {
            let audio = self.pair.render(material, pick, MaterialLayer::Mix, &config.stretch)?;
            segments.push(Segment::new(audio, crossfade));
            if let Some(&filler) = selection.fillers.get(&pick) {
                let bed = self.pair.render(material, filler, MaterialLayer::Instrumental, &config.stretch)?;
                segments.push(Segment::new(bed, crossfade));
            }
        }
        Ok(Arrangement::Sequence(segments))
    }

    fn output_name(&self) -> String {
        let theme = format!("theme_{}", file_part(&self.theme));
        self.pair.output_name(&theme)
    }
}
