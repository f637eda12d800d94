//! Role-aware recomposition
//!
//! Every section of both tracks gets a vocal role from its density and intensity.
//! Adjacent sections with the same lyrical function whose intensity alternates across
//! the call/response threshold become a call and its response, separated by a short
//! silence. A failed harmony transposition falls back to the untransposed vocal.

use super::{blend, plan_tempo, Pair, Pick, Side};
use crate::config::{MixerConfig, RoleThresholds};
use crate::dsp::pitch_shift;
use crate::engineer::{
    Arrangement, DecisionLog, Join, Material, MaterialLayer, Segment, SourceRequest, StemNeed, Strategy,
    StrategyKind,
};
use crate::error::Result;
use mixer_common::{db_to_gain, AudioBuffer, Section, VocalDensity};
use serde::Serialize;
use std::fmt;

// Bed levels under each role's vocal
const LEAD_BED_GAIN: f32 = 0.7;
const HARMONY_BED_GAIN: f32 = 0.8;
const CALL_RESPONSE_BED_GAIN: f32 = 0.6;
const TEXTURE_BED_GAIN: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VocalRole {
    Lead,
    Harmony,
    Call,
    Response,
    Texture,
}

impl fmt::Display for VocalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VocalRole::Lead => "lead",
            VocalRole::Harmony => "harmony",
            VocalRole::Call => "call",
            VocalRole::Response => "response",
            VocalRole::Texture => "texture",
        };
        f.write_str(s)
    }
}

fn density_role(section: &Section, thresholds: &RoleThresholds) -> VocalRole {
    let intensity = section.vocal_intensity;
    match section.vocal_density {
        VocalDensity::Dense if intensity >= thresholds.lead_intensity => VocalRole::Lead,
        VocalDensity::Dense => VocalRole::Harmony,
        VocalDensity::Sparse if intensity >= thresholds.harmony_intensity => VocalRole::Harmony,
        VocalDensity::Sparse => VocalRole::Texture,
        VocalDensity::Medium if intensity >= thresholds.lead_intensity => VocalRole::Lead,
        VocalDensity::Medium => VocalRole::Harmony,
    }
}

/// Role of each section of one track, in order
pub fn assign_roles(sections: &[Section], thresholds: &RoleThresholds) -> Vec<VocalRole> {
    let mut roles: Vec<Option<VocalRole>> = vec![None; sections.len()];
    let threshold = thresholds.call_response_intensity;

    let mut i = 0;
    while i + 1 < sections.len() {
        let (first, second) = (&sections[i], &sections[i + 1]);
        let alternates = (first.vocal_intensity >= threshold) != (second.vocal_intensity >= threshold);
        if first.lyrical_function == second.lyrical_function && alternates {
            roles[i] = Some(VocalRole::Call);
            roles[i + 1] = Some(VocalRole::Response);
            i += 2;
        } else {
            i += 1;
        }
    }

    roles
        .into_iter()
        .zip(sections)
        .map(|(role, section)| role.unwrap_or_else(|| density_role(section, thresholds)))
        .collect()
}

/// Played together: a single section, or a call and its response
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    Single(Pick, VocalRole),
    CallResponse(Pick, Pick),
}

fn units(side: Side, roles: &[VocalRole]) -> Vec<Unit> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < roles.len() {
        if roles[i] == VocalRole::Call && roles.get(i + 1) == Some(&VocalRole::Response) {
            out.push(Unit::CallResponse(Pick { side, index: i }, Pick { side, index: i + 1 }));
            i += 2;
        } else {
            out.push(Unit::Single(Pick { side, index: i }, roles[i]));
            i += 1;
        }
    }
    out
}

/// Alternate units of A and B, starting with A
pub fn interleave(a: Vec<Unit>, b: Vec<Unit>) -> Vec<Unit> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => break,
            (x, y) => out.extend(x.into_iter().chain(y)),
        }
    }
    out
}

pub struct RoleAware {
    pair: Pair,
}

impl RoleAware {
    pub fn new(track_a: String, track_b: String) -> Self {
        Self {
            pair: Pair::new(track_a, track_b),
        }
    }

    fn render_role(
        &self,
        config: &MixerConfig,
        material: &Material,
        pick: Pick,
        role: VocalRole,
        log: &mut DecisionLog,
    ) -> Result<AudioBuffer> {
        let vocal = self.pair.render(material, pick, MaterialLayer::Vocals, &config.stretch)?;
        let bed = self.pair.render(material, pick, MaterialLayer::Instrumental, &config.stretch)?;
        let engineer = &config.engineer;

        Ok(match role {
            VocalRole::Lead => blend(&vocal, 1.0, &bed, LEAD_BED_GAIN),
            VocalRole::Harmony => {
                let track_id = self.pair.id(pick.side);
                let voice = match pitch_shift(&vocal, engineer.harmony_semitones) {
                    Ok(shifted) => {
                        log.transposition(
                            track_id,
                            engineer.harmony_semitones,
                            format!("harmony voice for section {}", pick.index),
                        );
                        shifted
                    }
                    Err(e) => {
                        log.fallback(
                            "transform",
                            format!(
                                "harmony transposition of {} section {} failed ({}); untransposed harmony used",
                                track_id, pick.index, e
                            ),
                        );
                        vocal
                    }
                };
                blend(&voice, db_to_gain(engineer.harmony_gain_db), &bed, HARMONY_BED_GAIN)
            }
            VocalRole::Call | VocalRole::Response => blend(&vocal, 1.0, &bed, CALL_RESPONSE_BED_GAIN),
            VocalRole::Texture => blend(&vocal, engineer.texture_gain, &bed, TEXTURE_BED_GAIN),
        })
    }
}

impl Strategy for RoleAware {
    type Selection = Vec<Unit>;

    fn kind(&self) -> StrategyKind {
        StrategyKind::RoleAware
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
    ) -> Result<Vec<Unit>> {
        let (a, b) = self.pair.sectioned(material, self.kind().as_str())?;
        a.vocals()?;
        b.vocals()?;
        plan_tempo(b, a, &config.stretch, log)?;

        let thresholds = &config.engineer.roles;
        let roles_a = assign_roles(a.sections(), thresholds);
        let roles_b = assign_roles(b.sections(), thresholds);

        let mut logged = Vec::new();
        for (side, track, roles) in [(Side::A, a, &roles_a), (Side::B, b, &roles_b)] {
            for (index, (section, role)) in track.sections().iter().zip(roles.iter()).enumerate() {
                logged.push((
                    Pick { side, index },
                    MaterialLayer::Vocals,
                    format!(
                        "role {} ({} vocals, intensity {:.2})",
                        role, section.vocal_density, section.vocal_intensity
                    ),
                ));
            }
        }
        self.pair.log_picks(material, &logged, log)?;

        Ok(interleave(units(Side::A, &roles_a), units(Side::B, &roles_b)))
    }

    fn transform(
        &self,
        config: &MixerConfig,
        material: &Material,
        plan: Vec<Unit>,
        log: &mut DecisionLog,
    ) -> Result<Arrangement> {
        let crossfade = Join::Crossfade(config.engineer.effective_crossfade_sec());
        let gap = Join::Gap(config.engineer.call_response_gap_sec);
        let mut segments = Vec::new();

        for unit in plan {
            match unit {
                Unit::Single(pick, role) => {
                    let audio = self.render_role(config, material, pick, role, log)?;
                    segments.push(Segment::new(audio, crossfade));
                }
                Unit::CallResponse(call, response) => {
                    let call_audio = self.render_role(config, material, call, VocalRole::Call, log)?;
                    let response_audio = self.render_role(config, material, response, VocalRole::Response, log)?;
                    segments.push(Segment::new(call_audio, crossfade));
                    segments.push(Segment::new(response_audio, gap));
                }
            }
        }
        Ok(Arrangement::Sequence(segments))
    }

    fn output_name(&self) -> String {
        self.pair.output_name("role_aware")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(density: &str, intensity: f64, function: &str) -> Section {
        serde_json::from_value(serde_json::json!({
            "section_type": "verse", "start_sec": 0.0, "end_sec": 1.0,
            "vocal_density": density, "vocal_intensity": intensity, "lyrical_function": function
        }))
        .unwrap()
    }

    #[test]
    fn test_density_roles() {
        let t = RoleThresholds::default();
        let roles = assign_roles(
            &[
                section("dense", 0.9, "hook"),
                section("sparse", 0.8, "narrative"),
                section("sparse", 0.2, "reflection"),
            ],
            &t,
        );
        assert_eq!(roles, vec![VocalRole::Lead, VocalRole::Harmony, VocalRole::Texture]);
    }

    #[test]
    fn test_call_response_needs_same_function_and_alternation() {
        let t = RoleThresholds::default();
        let roles = assign_roles(
            &[
                section("dense", 0.9, "question"),
                section("sparse", 0.3, "question"),
                section("dense", 0.9, "narrative"),
                section("dense", 0.9, "narrative"),
            ],
            &t,
        );
        assert_eq!(
            roles,
            vec![VocalRole::Call, VocalRole::Response, VocalRole::Lead, VocalRole::Lead]
        );
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let strict = RoleThresholds {
            lead_intensity: 0.95,
            ..RoleThresholds::default()
        };
        assert_eq!(assign_roles(&[section("dense", 0.9, "hook")], &strict), vec![VocalRole::Harmony]);
    }

    #[test]
    fn test_units_interleave_and_keep_pairs_together() {
        let a = units(Side::A, &[VocalRole::Call, VocalRole::Response, VocalRole::Lead]);
        let b = units(Side::B, &[VocalRole::Texture]);
        let plan = interleave(a, b);
        assert_eq!(
            plan,
            vec![
                Unit::CallResponse(Pick::a(0), Pick::a(1)),
                Unit::Single(Pick::b(0), VocalRole::Texture),
                Unit::Single(Pick::a(2), VocalRole::Lead),
            ]
        );
    }
}
