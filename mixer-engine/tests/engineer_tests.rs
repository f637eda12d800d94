//! End-to-end composition tests over fixture stores
//!
//! Every fixture track runs at 120 BPM unless a test is about tempo, so section
//! lengths are preserved and output durations can be checked exactly.

mod helpers;

use helpers::{profile, store_with, test_config, test_engineer, TrackFixture, TEST_SAMPLE_RATE};
use mixer_common::StemName;
use mixer_engine::engineer::{Decision, Engineer, MashupJob, MashupResult};
use mixer_engine::error::{ErrorCategory, MashupError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const TRACK_SECS: f64 = 8.0;

fn track(id: &str, extra: Value) -> TrackFixture {
    TrackFixture::new(profile(id, 120.0, "8B", extra), TRACK_SECS)
}

fn sections(spec: &[(&str, Value)]) -> Value {
    let list: Vec<Value> = spec
        .iter()
        .enumerate()
        .map(|(i, (kind, extra))| {
            let mut s = json!({
                "section_type": kind,
                "start_sec": i as f64 * 2.0,
                "end_sec": (i + 1) as f64 * 2.0,
            });
            if let (Some(obj), Some(extra)) = (s.as_object_mut(), extra.as_object()) {
                for (k, v) in extra {
                    obj.insert(k.clone(), v.clone());
                }
            }
            s
        })
        .collect();
    Value::Array(list)
}

fn selected(result: &MashupResult) -> Vec<(String, usize)> {
    result
        .decisions
        .iter()
        .filter_map(|d| match d {
            Decision::SectionSelected {
                track_id,
                section_index,
                ..
            } => Some((track_id.clone(), *section_index)),
            _ => None,
        })
        .collect()
}

fn has_warning(result: &MashupResult) -> bool {
    result.decisions.iter().any(|d| matches!(d, Decision::Warning { .. }))
}

fn assert_duration(result: &MashupResult, expected: f64) {
    assert!(
        (result.duration_sec - expected).abs() < 1e-6,
        "duration {} != {}",
        result.duration_sec,
        expected
    );
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

#[tokio::test]
async fn test_direct_swap_writes_aligned_mashup() {
    let dir = TempDir::new().unwrap();
    let store = store_with(vec![track("singer", json!({})), track("band", json!({}))]);
    let engineer = test_engineer(store, dir.path());

    let job = MashupJob::DirectSwap {
        vocal_id: "singer".into(),
        instrumental_id: "band".into(),
    };
    let result = engineer.compose(&job).await.unwrap();

    assert_eq!(result.output_path, dir.path().join("singer_x_band.wav"));
    assert_duration(&result, TRACK_SECS);
    assert!(result.decisions.iter().any(|d| matches!(
        d,
        Decision::StemSelected { track_id, stem: StemName::Vocals, .. } if track_id == "singer"
    )));
    assert!(result
        .decisions
        .iter()
        .any(|d| matches!(d, Decision::Alignment { short_overlap: false, .. })));

    let reader = hound::WavReader::open(&result.output_path).unwrap();
    assert_eq!(reader.spec().sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().bits_per_sample, 16);
    assert_eq!(reader.len() as usize, (TRACK_SECS * TEST_SAMPLE_RATE as f64) as usize);
}

#[tokio::test]
async fn test_stretch_out_of_bounds_rejects_pairing() {
    let dir = TempDir::new().unwrap();
    let store = store_with(vec![
        TrackFixture::new(profile("slow", 80.0, "8B", json!({})), TRACK_SECS),
        track("band", json!({})),
    ]);
    let engineer = test_engineer(store, dir.path());

    let err = engineer
        .compose(&MashupJob::DirectSwap {
            vocal_id: "slow".into(),
            instrumental_id: "band".into(),
        })
        .await
        .unwrap_err();

    match &err {
        MashupError::StretchRatioOutOfBounds {
            source_id: Some(source),
            target_id: Some(target),
            source_bpm,
            ..
        } => {
            assert_eq!(source, "slow");
            assert_eq!(target, "band");
            assert_eq!(*source_bpm, 80.0);
        }
        other => panic!("expected stretch bounds error, got {other:?}"),
    }
    assert!(err.to_string().contains("slow -> band"));
    assert_eq!(err.category(), ErrorCategory::Bounds);
    assert!(!dir.path().join("slow_x_band.wav").exists());
}

#[tokio::test]
async fn test_stems_unavailable_after_retries() {
    let dir = TempDir::new().unwrap();
    let store = store_with(vec![
        track("singer", json!({})).without_stems(),
        track("band", json!({})),
    ]);
    let engineer = test_engineer(store, dir.path());

    let err = engineer
        .compose(&MashupJob::DirectSwap {
            vocal_id: "singer".into(),
            instrumental_id: "band".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MashupError::StemsUnavailable { ref id } if id == "singer"));
}

#[tokio::test]
async fn test_key_corrected_transposes_instrumental() {
    let dir = TempDir::new().unwrap();
    let store = store_with(vec![
        TrackFixture::new(profile("singer", 120.0, "C major", json!({})), TRACK_SECS),
        TrackFixture::new(profile("band", 120.0, "Db major", json!({})), TRACK_SECS),
    ]);
    let engineer = test_engineer(store, dir.path());

    let job = MashupJob::KeyCorrected {
        vocal_id: "singer".into(),
        instrumental_id: "band".into(),
    };
    let result = engineer.compose(&job).await.unwrap();

    assert!(result.decisions.iter().any(|d| matches!(
        d,
        Decision::Transposition { track_id, semitones: -1, .. } if track_id == "band"
    )));
    assert_duration(&result, TRACK_SECS);
    assert!(result
        .output_path
        .ends_with("key_corrected_singer_x_band.wav"));
}

#[tokio::test]
async fn test_key_corrected_respects_transposition_limit() {
    let dir = TempDir::new().unwrap();
    let store = store_with(vec![
        TrackFixture::new(profile("singer", 120.0, "C major", json!({})), TRACK_SECS),
        TrackFixture::new(profile("band", 120.0, "Db major", json!({})), TRACK_SECS),
    ]);
    let mut config = test_config();
    config.engineer.max_transposition_semitones = 0;
    let engineer = Engineer::new(Arc::new(store), Arc::new(config), dir.path().to_path_buf());

    let err = engineer
        .compose(&MashupJob::KeyCorrected {
            vocal_id: "singer".into(),
            instrumental_id: "band".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MashupError::TranspositionTooLarge { semitones: -1, max: 0, ref source_id, ref target_id }
            if source_id.as_deref() == Some("band") && target_id.as_deref() == Some("singer")
    ));
}

#[tokio::test]
async fn test_stem_assembly_layers_every_role() {
    let dir = TempDir::new().unwrap();
    let store = store_with(vec![track("a", json!({})), track("b", json!({}))]);
    let engineer = test_engineer(store, dir.path());

    let mut roles = BTreeMap::new();
    roles.insert(StemName::Vocals, "a".to_string());
    roles.insert(StemName::Drums, "b".to_string());
    roles.insert(StemName::Bass, "b".to_string());
    roles.insert(StemName::Other, "a".to_string());
    let result = engineer.compose(&MashupJob::StemAssembly { roles }).await.unwrap();

    let stems = result
        .decisions
        .iter()
        .filter(|d| matches!(d, Decision::StemSelected { .. }))
        .count();
    assert_eq!(stems, 4);
    assert_duration(&result, TRACK_SECS);
}

#[tokio::test]
async fn test_stem_assembly_needs_drums() {
    let dir = TempDir::new().unwrap();
    let engineer = test_engineer(store_with(vec![]), dir.path());

    let mut roles = BTreeMap::new();
    roles.insert(StemName::Vocals, "a".to_string());
    roles.insert(StemName::Bass, "b".to_string());
    let err = engineer.compose(&MashupJob::StemAssembly { roles }).await.unwrap_err();
    assert!(matches!(err, MashupError::InvalidJob(_)));
}

#[tokio::test]
async fn test_energy_matched_alternates_sources() {
    let dir = TempDir::new().unwrap();
    let a = sections(&[
        ("intro", json!({"energy_level": 0.2})),
        ("verse", json!({"energy_level": 0.8})),
        ("chorus", json!({"energy_level": 0.5})),
        ("outro", json!({"energy_level": 0.9})),
    ]);
    let b = sections(&[
        ("verse", json!({"energy_level": 0.3})),
        ("chorus", json!({"energy_level": 0.85})),
    ]);
    let store = store_with(vec![track("a", json!({"sections": a})), track("b", json!({"sections": b}))]);
    let engineer = test_engineer(store, dir.path());

    let (track_a, track_b) = pair("a", "b");
    let result = engineer
        .compose(&MashupJob::EnergyMatched { track_a, track_b })
        .await
        .unwrap();

    assert_eq!(
        selected(&result),
        vec![pair_idx("a", 0), pair_idx("a", 2), pair_idx("b", 1), pair_idx("b", 1)]
    );
    // Four 2 s sections, three 0.2 s crossfades
    assert_duration(&result, 4.0 * 2.0 - 3.0 * 0.2);
}

fn pair_idx(id: &str, index: usize) -> (String, usize) {
    (id.to_string(), index)
}

#[tokio::test]
async fn test_section_strategies_require_sections() {
    let dir = TempDir::new().unwrap();
    let store = store_with(vec![
        track("a", json!({"sections": sections(&[("verse", json!({}))])})),
        track("b", json!({})),
    ]);
    let engineer = test_engineer(store, dir.path());

    let (track_a, track_b) = pair("a", "b");
    let err = engineer
        .compose(&MashupJob::EnergyMatched { track_a, track_b })
        .await
        .unwrap_err();
    assert!(matches!(err, MashupError::MissingSections { ref id, .. } if id == "b"));
}

#[tokio::test]
async fn test_theme_filter_keeps_only_tagged_sections() {
    let dir = TempDir::new().unwrap();
    let a = sections(&[
        ("verse", json!({"themes": ["heartbreak", "hope"], "energy_level": 0.4})),
        ("chorus", json!({"themes": ["party"], "energy_level": 0.9})),
    ]);
    let b = sections(&[("chorus", json!({"themes": ["heartbreak"], "energy_level": 0.8}))]);
    let store = store_with(vec![track("a", json!({"sections": a})), track("b", json!({"sections": b}))]);
    let engineer = test_engineer(store, dir.path());

    let job = MashupJob::ThemeFiltered {
        track_a: "a".into(),
        track_b: "b".into(),
        theme: "heartbreak".into(),
    };
    let result = engineer.compose(&job).await.unwrap();

    // Exactly one section from each track; the party chorus (a, 1) never appears
    assert_eq!(selected(&result), vec![pair_idx("a", 0), pair_idx("b", 0)]);
    assert!(!has_warning(&result));
    assert_duration(&result, 2.0 + 2.0 - 0.2);
    assert!(result.output_path.ends_with("theme_heartbreak_a_x_b.wav"));
}

#[tokio::test]
async fn test_theme_filter_without_matches_degrades() {
    let dir = TempDir::new().unwrap();
    let a = sections(&[("verse", json!({"themes": ["party"]})), ("chorus", json!({}))]);
    let b = sections(&[("verse", json!({}))]);
    let store = store_with(vec![track("a", json!({"sections": a})), track("b", json!({"sections": b}))]);
    let engineer = test_engineer(store, dir.path());

    let job = MashupJob::ThemeFiltered {
        track_a: "a".into(),
        track_b: "b".into(),
        theme: "heartbreak".into(),
    };
    let result = engineer.compose(&job).await.unwrap();

    assert!(has_warning(&result));
    assert!(result.warnings().any(|d| matches!(d, Decision::Fallback { .. })));
    assert_eq!(selected(&result).len(), 3);
}

#[tokio::test]
async fn test_dialogue_without_complementary_sections_concatenates() {
    let dir = TempDir::new().unwrap();
    let hooks = |n: usize| {
        let list: Vec<(&str, Value)> = (0..n).map(|_| ("verse", json!({"lyrical_function": "hook"}))).collect();
        sections(&list)
    };
    let store = store_with(vec![
        track("a", json!({"sections": hooks(3)})),
        track("b", json!({"sections": hooks(2)})),
    ]);
    let engineer = test_engineer(store, dir.path());

    let (track_a, track_b) = pair("a", "b");
    let result = engineer.compose(&MashupJob::Dialogue { track_a, track_b }).await.unwrap();

    assert!(has_warning(&result));
    assert_eq!(selected(&result).len(), 5);
    // Plain concatenation of every section: 5 x 2 s
    assert_duration(&result, 10.0);
}

#[tokio::test]
async fn test_dialogue_alternates_call_and_response() {
    let dir = TempDir::new().unwrap();
    let a = sections(&[
        ("verse", json!({"lyrical_function": "question"})),
        ("verse", json!({"lyrical_function": "narrative"})),
    ]);
    let b = sections(&[
        ("verse", json!({"lyrical_function": "answer"})),
        ("bridge", json!({"lyrical_function": "reflection"})),
    ]);
    let store = store_with(vec![track("a", json!({"sections": a})), track("b", json!({"sections": b}))]);
    let engineer = test_engineer(store, dir.path());

    let (track_a, track_b) = pair("a", "b");
    let result = engineer.compose(&MashupJob::Dialogue { track_a, track_b }).await.unwrap();

    assert!(!has_warning(&result));
    assert_eq!(selected(&result).len(), 4);
    // Four 2 s turns separated by three 0.4 s gaps
    assert_duration(&result, 4.0 * 2.0 + 3.0 * 0.4);
}

#[tokio::test]
async fn test_semantic_arc_follows_requested_tones() {
    let dir = TempDir::new().unwrap();
    let a = sections(&[
        ("verse", json!({"emotional_tone": "hopeful", "energy_level": 0.3})),
        ("chorus", json!({"emotional_tone": "doubtful", "energy_level": 0.5})),
    ]);
    let b = sections(&[("chorus", json!({"emotional_tone": "defiant", "energy_level": 0.9}))]);
    let store = store_with(vec![track("a", json!({"sections": a})), track("b", json!({"sections": b}))]);
    let engineer = test_engineer(store, dir.path());

    let job = MashupJob::SemanticArc {
        track_a: "a".into(),
        track_b: "b".into(),
        arc: Some(vec!["doubtful".into(), "defiant".into(), "hopeful".into()]),
    };
    let result = engineer.compose(&job).await.unwrap();

    let details: Vec<String> = result
        .decisions
        .iter()
        .filter_map(|d| match d {
            Decision::SectionSelected { detail, .. } => Some(detail.clone()),
            _ => None,
        })
        .collect();
    // Logged in source order: a0 was step 2, a1 step 0, b0 step 1
    assert!(details[0].starts_with("arc step 2"));
    assert!(details[1].starts_with("arc step 0"));
    assert!(details[2].starts_with("arc step 1"));
    assert_duration(&result, 3.0 * 2.0 - 2.0 * 0.2);
}

#[tokio::test]
async fn test_role_aware_assigns_and_renders_roles() {
    let dir = TempDir::new().unwrap();
    let a = sections(&[
        ("chorus", json!({"vocal_density": "dense", "vocal_intensity": 0.9, "lyrical_function": "hook"})),
        ("verse", json!({"vocal_density": "sparse", "vocal_intensity": 0.8, "lyrical_function": "narrative"})),
    ]);
    let b = sections(&[(
        "bridge",
        json!({"vocal_density": "sparse", "vocal_intensity": 0.2, "lyrical_function": "reflection"}),
    )]);
    let store = store_with(vec![track("a", json!({"sections": a})), track("b", json!({"sections": b}))]);
    let engineer = test_engineer(store, dir.path());

    let (track_a, track_b) = pair("a", "b");
    let result = engineer.compose(&MashupJob::RoleAware { track_a, track_b }).await.unwrap();

    let roles: Vec<String> = result
        .decisions
        .iter()
        .filter_map(|d| match d {
            Decision::SectionSelected { detail, .. } => Some(detail.clone()),
            _ => None,
        })
        .collect();
    assert!(roles[0].starts_with("role lead"));
    assert!(roles[1].starts_with("role harmony"));
    assert!(roles[2].starts_with("role texture"));
    assert!(result
        .decisions
        .iter()
        .any(|d| matches!(d, Decision::Transposition { semitones: 3, .. })));
    assert_duration(&result, 3.0 * 2.0 - 2.0 * 0.2);
}

#[tokio::test]
async fn test_cancelled_job_stops_before_loading() {
    let dir = TempDir::new().unwrap();
    let store = store_with(vec![track("singer", json!({})), track("band", json!({}))]);
    let engineer = test_engineer(store, dir.path());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let job = MashupJob::DirectSwap {
        vocal_id: "singer".into(),
        instrumental_id: "band".into(),
    };
    let err = engineer
        .compose_with_cancel(&job, Uuid::new_v4(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, MashupError::Cancelled { ref stage, .. } if stage == "load"));
    assert!(!dir.path().join("singer_x_band.wav").exists());
}

#[tokio::test]
async fn test_same_track_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engineer = test_engineer(store_with(vec![track("solo", json!({}))]), dir.path());

    let err = engineer
        .compose(&MashupJob::Dialogue {
            track_a: "solo".into(),
            track_b: "solo".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MashupError::InvalidJob(_)));
    assert_eq!(err.category(), ErrorCategory::Input);
}
