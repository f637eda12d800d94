//! Dialogue assembly: the two tracks answer each other
//!
//! Sections are paired across tracks by lyrical function, question with answer first
//! and narrative with reflection second. Each pair plays as call then response with a
//! silence between turns; under each vocal runs the instrumental of the track holding
//! the floor, at a reduced level. Without any pair the job concatenates the
//! theme-tagged sections of both tracks instead.

use super::{blend, plan_tempo, Pair, Pick, Side};
use crate::config::MixerConfig;
use crate::engineer::{
    Arrangement, DecisionLog, Join, Material, MaterialLayer, Segment, SourceRequest, StemNeed, Strategy,
    StrategyKind,
};
use crate::error::Result;
use mixer_common::{LyricalFunction, Section};
use std::collections::BTreeSet;

/// Complementary functions: `(call, response)`, in pairing priority
const PAIRINGS: [(LyricalFunction, LyricalFunction); 2] = [
    (LyricalFunction::Question, LyricalFunction::Answer),
    (LyricalFunction::Narrative, LyricalFunction::Reflection),
];

/// A call and its response, always from different tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub call: Pick,
    pub response: Pick,
}

impl Exchange {
    fn a_pick(&self) -> Pick {
        if self.call.side == Side::A {
            self.call
        } else {
            self.response
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialoguePlan {
    Exchanges(Vec<Exchange>),
    /// Degraded: plain concatenation in source order
    Concatenate(Vec<Pick>),
}

/// Pair sections of `a` and `b` by complementary lyrical function
///
/// Each section is used at most once. Exchanges are ordered by the position of their
/// A-side section.
pub fn pair_sections(a: &[Section], b: &[Section]) -> Vec<Exchange> {
    let mut used_a = BTreeSet::new();
    let mut used_b = BTreeSet::new();
    let mut exchanges = Vec::new();

    for (call_fn, response_fn) in PAIRINGS {
        for (i, section) in a.iter().enumerate() {
            if used_a.contains(&i) {
                continue;
            }
            let (wanted, a_calls) = if section.lyrical_function == call_fn {
                (response_fn, true)
            } else if section.lyrical_function == response_fn {
                (call_fn, false)
            } else {
                continue;
            };

            let partner = b
                .iter()
                .enumerate()
                .find(|(j, s)| !used_b.contains(j) && s.lyrical_function == wanted)
                .map(|(j, _)| j);

            if let Some(j) = partner {
                used_a.insert(i);
                used_b.insert(j);
                let exchange = if a_calls {
                    Exchange {
                        call: Pick::a(i),
                        response: Pick::b(j),
                    }
                } else {
                    Exchange {
                        call: Pick::b(j),
                        response: Pick::a(i),
                    }
                };
                exchanges.push(exchange);
            }
        }
    }

    exchanges.sort_by_key(|e| e.a_pick());
    exchanges
}

pub struct Dialogue {
    pair: Pair,
}

impl Dialogue {
    pub fn new(track_a: String, track_b: String) -> Self {
        Self {
            pair: Pair::new(track_a, track_b),
        }
    }

    fn turn(&self, config: &MixerConfig, material: &Material, pick: Pick) -> Result<mixer_common::AudioBuffer> {
        let vocal = self.pair.render(material, pick, MaterialLayer::Vocals, &config.stretch)?;
        let bed = self.pair.render(material, pick, MaterialLayer::Instrumental, &config.stretch)?;
        Ok(blend(&vocal, 1.0, &bed, config.engineer.dialogue_bed_gain))
    }
}

impl Strategy for Dialogue {
    type Selection = DialoguePlan;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Dialogue
    }

    fn validate(&self) -> Result<()> {
        self.pair.validate()
    }

    fn sources(&self) -> Vec<SourceRequest> {
        self.pair.sources(StemNeed::Required)
    }

    fn select_material(
        &self,
        config: &MixerConfig,
        material: &Material,
        log: &mut DecisionLog,
    ) -> Result<DialoguePlan> {
        let (a, b) = self.pair.sectioned(material, self.kind().as_str())?;
        plan_tempo(b, a, &config.stretch, log)?;

        let exchanges = pair_sections(a.sections(), b.sections());
        if exchanges.is_empty() {
            log.warning(format!(
                "no complementary lyrical functions between {} and {}; no dialogue pairs",
                a.id(),
                b.id()
            ));

            let tagged: Vec<Pick> = [(Side::A, a), (Side::B, b)]
                .into_iter()
                .flat_map(|(side, track)| {
                    track
                        .sections()
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.is_theme_tagged())
                        .map(move |(index, _)| Pick { side, index })
                })
                .collect();

            let (picks, reason) = if tagged.is_empty() {
                let all: Vec<Pick> = (0..a.sections().len())
                    .map(Pick::a)
                    .chain((0..b.sections().len()).map(Pick::b))
                    .collect();
                (all, "concatenating every section: none is theme-tagged")
            } else {
                (tagged, "concatenating theme-tagged sections in source order")
            };
            log.fallback("select", reason);

            let logged: Vec<_> = picks
                .iter()
                .map(|p| (*p, MaterialLayer::Mix, "sequential fallback".to_string()))
                .collect();
            self.pair.log_picks(material, &logged, log)?;
            return Ok(DialoguePlan::Concatenate(picks));
        }

        let mut logged = Vec::with_capacity(exchanges.len() * 2);
        for exchange in &exchanges {
            let call = self.pair.track(material, exchange.call.side)?.section(exchange.call.index)?;
            let response = self
                .pair
                .track(material, exchange.response.side)?
                .section(exchange.response.index)?;
            logged.push((
                exchange.call,
                MaterialLayer::Vocals,
                format!("call ({})", call.lyrical_function),
            ));
            logged.push((
                exchange.response,
                MaterialLayer::Vocals,
                format!("response ({}) to {}", response.lyrical_function, call.lyrical_function),
            ));
        }
        self.pair.log_picks(material, &logged, log)?;
        Ok(DialoguePlan::Exchanges(exchanges))
    }

    fn transform(
        &self,
        config: &MixerConfig,
        material: &Material,
        plan: DialoguePlan,
        _log: &mut DecisionLog,
    ) -> Result<Arrangement> {
        let mut segments = Vec::new();
        match plan {
            DialoguePlan::Exchanges(exchanges) => {
                let gap = Join::Gap(config.engineer.dialogue_gap_sec);
                for exchange in exchanges {
                    segments.push(Segment::new(self.turn(config, material, exchange.call)?, gap));
                    segments.push(Segment::new(self.turn(config, material, exchange.response)?, gap));
                }
            }
            DialoguePlan::Concatenate(picks) => {
                for pick in picks {
                    let audio = self.pair.render(material, pick, MaterialLayer::Mix, &config.stretch)?;
                    segments.push(Segment::new(audio, Join::Cut));
                }
            }
        }
        Ok(Arrangement::Sequence(segments))
    }

    fn output_name(&self) -> String {
        self.pair.output_name("dialogue")
    }
}
