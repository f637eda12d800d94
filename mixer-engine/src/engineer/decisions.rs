//! Decision log carried in every mashup result
//!
//! Each entry is also emitted as a tracing event when recorded: selections at debug,
//! tempo and key changes at info, fallbacks and warnings at warn.

use crate::alignment::AlignmentInfo;
use crate::harmony::TempoMatch;
use mixer_common::{Section, StemName};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which rendering of a section was used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialLayer {
    Mix,
    Vocals,
    Instrumental,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    SectionSelected {
        track_id: String,
        section_index: usize,
        section_type: String,
        start_sec: f64,
        end_sec: f64,
        layer: MaterialLayer,
        detail: String,
    },
    StemSelected {
        track_id: String,
        stem: StemName,
        role: String,
    },
    Stretch {
        track_id: String,
        source_bpm: f64,
        target_bpm: f64,
        ratio: f64,
        quality_risk: bool,
    },
    Transposition {
        track_id: String,
        semitones: i32,
        reason: String,
    },
    Alignment {
        track_id: String,
        reference_id: String,
        offset_samples: i64,
        aligned_len: usize,
        short_overlap: bool,
    },
    Fallback {
        stage: String,
        reason: String,
    },
    Warning {
        message: String,
    },
}

/// Ordered record of what a job decided
#[derive(Debug, Clone)]
pub struct DecisionLog {
    job_id: Uuid,
    entries: Vec<Decision>,
}

impl DecisionLog {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            entries: Vec::new(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn entries(&self) -> &[Decision] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Decision> {
        self.entries
    }

    pub fn record(&mut self, decision: Decision) {
        let job_id = self.job_id;
        match &decision {
            Decision::SectionSelected {
                track_id,
                section_index,
                section_type,
                layer,
                detail,
                ..
            } => debug!(
                job_id = %job_id,
                track_id = %track_id,
                section_index,
                section_type = %section_type,
                layer = ?layer,
                "Section selected: {}", detail
            ),
            Decision::StemSelected { track_id, stem, role } => debug!(
                job_id = %job_id,
                track_id = %track_id,
                stem = %stem,
                role = %role,
                "Stem selected"
            ),
            Decision::Stretch {
                track_id,
                ratio,
                quality_risk,
                ..
            } => info!(
                job_id = %job_id,
                track_id = %track_id,
                ratio,
                quality_risk,
                "Time-stretch planned"
            ),
            Decision::Transposition {
                track_id,
                semitones,
                reason,
            } => info!(
                job_id = %job_id,
                track_id = %track_id,
                semitones,
                "Transposition: {}", reason
            ),
            Decision::Alignment {
                track_id,
                offset_samples,
                short_overlap,
                ..
            } => debug!(
                job_id = %job_id,
                track_id = %track_id,
                offset_samples,
                short_overlap,
                "Downbeats aligned"
            ),
            Decision::Fallback { stage, reason } => warn!(
                job_id = %job_id,
                stage = %stage,
                "Fallback taken: {}", reason
            ),
            Decision::Warning { message } => warn!(job_id = %job_id, "{}", message),
        }
        self.entries.push(decision);
    }

    pub fn section(
        &mut self,
        track_id: &str,
        index: usize,
        section: &Section,
        layer: MaterialLayer,
        detail: impl Into<String>,
    ) {
        self.record(Decision::SectionSelected {
            track_id: track_id.to_string(),
            section_index: index,
            section_type: section.section_type.to_string(),
            start_sec: section.start_sec,
            end_sec: section.end_sec,
            layer,
            detail: detail.into(),
        });
    }

    pub fn stem(&mut self, track_id: &str, stem: StemName, role: impl Into<String>) {
        self.record(Decision::StemSelected {
            track_id: track_id.to_string(),
            stem,
            role: role.into(),
        });
    }

    pub fn stretch(&mut self, track_id: &str, source_bpm: f64, target_bpm: f64, tempo: &TempoMatch) {
        self.record(Decision::Stretch {
            track_id: track_id.to_string(),
            source_bpm,
            target_bpm,
            ratio: tempo.ratio,
            quality_risk: tempo.quality_risk,
        });
    }

    pub fn transposition(&mut self, track_id: &str, semitones: i32, reason: impl Into<String>) {
        self.record(Decision::Transposition {
            track_id: track_id.to_string(),
            semitones,
            reason: reason.into(),
        });
    }

    pub fn alignment(&mut self, track_id: &str, reference_id: &str, info: AlignmentInfo) {
        self.record(Decision::Alignment {
            track_id: track_id.to_string(),
            reference_id: reference_id.to_string(),
            offset_samples: info.offset_samples,
            aligned_len: info.aligned_len,
            short_overlap: info.short_overlap,
        });
    }

    pub fn fallback(&mut self, stage: &str, reason: impl Into<String>) {
        self.record(Decision::Fallback {
            stage: stage.to_string(),
            reason: reason.into(),
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.record(Decision::Warning {
            message: message.into(),
        });
    }

    pub fn count_sections(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d, Decision::SectionSelected { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order_and_serialize_tagged() {
        let mut log = DecisionLog::new(Uuid::new_v4());
        log.warning("no dialogue pairs");
        log.fallback("select", "concatenating tagged sections");
        log.transposition("b", -2, "instrumental onto vocal key");

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0], Decision::Warning { .. }));

        let json = serde_json::to_value(&entries[2]).unwrap();
        assert_eq!(json["kind"], "transposition");
        assert_eq!(json["semitones"], -2);
    }
}
