//! Profile database round trips

use mixer_common::db::{
    init_database_pool, list_profiles, load_audio_paths, load_profile, save_audio_path,
    save_profile, AudioRole,
};
use mixer_common::{StemName, TrackProfile};
use std::path::PathBuf;
use tempfile::TempDir;

fn profile(id: &str, bpm: f64) -> TrackProfile {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "artist": "Artist",
        "title": id,
        "bpm": bpm,
        "key": "8B",
        "sections": [
            {"section_type": "verse", "start_sec": 0.0, "end_sec": 8.0, "themes": ["hope"]},
            {"section_type": "chorus", "start_sec": 8.0, "end_sec": 16.0}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_profile_round_trip_and_overwrite() {
    let dir = TempDir::new().unwrap();
    let pool = init_database_pool(&dir.path().join("mixer.db")).await.unwrap();

    save_profile(&pool, &profile("b_track", 120.0)).await.unwrap();
    save_profile(&pool, &profile("a_track", 100.0)).await.unwrap();

    let loaded = load_profile(&pool, "b_track").await.unwrap().unwrap();
    assert_eq!(loaded.bpm, 120.0);
    assert_eq!(loaded.sections.len(), 2);
    assert!(load_profile(&pool, "nope").await.unwrap().is_none());

    // Re-analysis overwrites
    save_profile(&pool, &profile("b_track", 122.0)).await.unwrap();
    let loaded = load_profile(&pool, "b_track").await.unwrap().unwrap();
    assert_eq!(loaded.bpm, 122.0);

    let ids: Vec<String> = list_profiles(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec!["a_track".to_string(), "b_track".to_string()]);
}

#[tokio::test]
async fn test_invalid_profile_is_rejected() {
    let dir = TempDir::new().unwrap();
    let pool = init_database_pool(&dir.path().join("mixer.db")).await.unwrap();
    let bad = profile("bad", 0.0);
    assert!(save_profile(&pool, &bad).await.is_err());
}

#[tokio::test]
async fn test_audio_paths() {
    let dir = TempDir::new().unwrap();
    let pool = init_database_pool(&dir.path().join("mixer.db")).await.unwrap();
    save_profile(&pool, &profile("t", 120.0)).await.unwrap();

    save_audio_path(&pool, "t", AudioRole::Mix, &PathBuf::from("/audio/t.wav"))
        .await
        .unwrap();
    save_audio_path(
        &pool,
        "t",
        AudioRole::Stem(StemName::Vocals),
        &PathBuf::from("/audio/t_vocals.wav"),
    )
    .await
    .unwrap();

    let paths = load_audio_paths(&pool, "t").await.unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[&AudioRole::Mix], PathBuf::from("/audio/t.wav"));
    assert_eq!(
        paths[&AudioRole::Stem(StemName::Vocals)],
        PathBuf::from("/audio/t_vocals.wav")
    );
    assert!(load_audio_paths(&pool, "other").await.unwrap().is_empty());
}
