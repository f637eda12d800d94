//! Track profile fixtures and fixture stores

use super::audio_fixtures::stem_set;
use mixer_common::{Section, TrackProfile};
use mixer_engine::InMemoryProfileStore;
use serde_json::{json, Value};

/// Profile from the required fields plus any extra JSON fields
pub fn profile(id: &str, bpm: f64, key: &str, extra: Value) -> TrackProfile {
    let mut value = json!({ "id": id, "bpm": bpm, "key": key });
    if let (Some(obj), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(value).expect("valid profile fixture")
}

/// Section spanning `[start, end)` with any extra JSON fields
pub fn section(section_type: &str, start: f64, end: f64, extra: Value) -> Section {
    let mut value = json!({ "section_type": section_type, "start_sec": start, "end_sec": end });
    if let (Some(obj), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(value).expect("valid section fixture")
}

/// A profile plus whether its audio should be in the store
pub struct TrackFixture {
    pub profile: TrackProfile,
    pub duration_sec: f64,
    pub with_stems: bool,
}

impl TrackFixture {
    pub fn new(profile: TrackProfile, duration_sec: f64) -> Self {
        Self {
            profile,
            duration_sec,
            with_stems: true,
        }
    }

    pub fn without_stems(mut self) -> Self {
        self.with_stems = false;
        self
    }
}

/// Store holding each fixture's profile, full mix and (optionally) stems
pub fn store_with(fixtures: Vec<TrackFixture>) -> InMemoryProfileStore {
    let mut store = InMemoryProfileStore::new();
    for fixture in fixtures {
        let id = fixture.profile.id.clone();
        let stems = stem_set(fixture.duration_sec);
        store.insert_mix(&id, stems.full_mix());
        if fixture.with_stems {
            store.insert_stems(&id, stems);
        }
        store.insert_profile(fixture.profile).unwrap();
    }
    store
}
