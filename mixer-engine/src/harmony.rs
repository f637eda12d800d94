//! Key and tempo compatibility
//!
//! Keys live on the 24-position Camelot wheel: twelve numbered positions arranged by
//! fifths, with major keys on ring B and minor keys on ring A. A minor key shares its
//! number with its relative major (A minor = 8A, C major = 8B).

use crate::config::StretchConfig;
use crate::error::{MashupError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

/// A musical key: root pitch class (0 = C) plus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub root: u8,
    pub mode: Mode,
}

impl Key {
    pub fn new(root: u8, mode: Mode) -> Self {
        Self {
            root: root % 12,
            mode,
        }
    }

    /// Wheel number 1..=12
    pub fn camelot_number(&self) -> u8 {
        let major_root = match self.mode {
            Mode::Major => self.root,
            Mode::Minor => (self.root + 3) % 12,
        };
        ((major_root * 7) % 12 + 7) % 12 + 1
    }

    pub fn camelot_ring(&self) -> char {
        match self.mode {
            Mode::Major => 'B',
            Mode::Minor => 'A',
        }
    }

    pub fn camelot(&self) -> String {
        format!("{}{}", self.camelot_number(), self.camelot_ring())
    }

    fn from_camelot(number: u8, ring: char) -> Option<Self> {
        if !(1..=12).contains(&number) {
            return None;
        }
        // Inverse of the fifths mapping (7 is its own inverse mod 12)
        let major_root = (((number + 4) % 12) * 7) % 12;
        match ring {
            'B' => Some(Key::new(major_root, Mode::Major)),
            'A' => Some(Key::new((major_root + 9) % 12, Mode::Minor)),
            _ => None,
        }
    }

    /// Wheel distance
    ///
    /// 0 for the same key, 1 for the relative major/minor, the circular number distance
    /// on the same ring, and that distance plus one across rings.
    pub fn distance(&self, other: &Key) -> u32 {
        if self == other {
            return 0;
        }
        let a = self.camelot_number() as i32;
        let b = other.camelot_number() as i32;
        let diff = (a - b).abs();
        let wheel = diff.min(12 - diff) as u32;

        if a == b {
            return 1;
        }
        if self.mode == other.mode {
            wheel
        } else {
            wheel + 1
        }
    }

    /// Shortest signed semitone shift moving this key's root onto `target`'s root
    pub fn shift_to(&self, target: &Key) -> i32 {
        let mut shift = target.root as i32 - self.root as i32;
        if shift > 6 {
            shift -= 12;
        } else if shift < -6 {
            shift += 12;
        }
        shift
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {} ({})", PITCH_NAMES[self.root as usize], mode, self.camelot())
    }
}

impl FromStr for Key {
    type Err = MashupError;

    fn from_str(s: &str) -> Result<Self> {
        parse_key(s)
    }
}

/// Parse a key spelling
///
/// Accepts Camelot notation ("8B", "11a") and note names with optional accidentals and
/// mode suffix ("C", "C major", "Cmaj", "CM", "Am", "A minor", "F#min", "Bb", "Ebm").
pub fn parse_key(input: &str) -> Result<Key> {
    let err = || MashupError::KeyFormat {
        key: input.to_string(),
        track_id: None,
    };
    let s = input.trim();
    if s.is_empty() {
        return Err(err());
    }

    if s.starts_with(|c: char| c.is_ascii_digit()) {
        let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(err)?;
        let (digits, rest) = s.split_at(split);
        let number: u8 = digits.parse().map_err(|_| err())?;
        let mut ring_chars = rest.trim().chars();
        let ring = ring_chars.next().ok_or_else(err)?.to_ascii_uppercase();
        if ring_chars.next().is_some() {
            return Err(err());
        }
        return Key::from_camelot(number, ring).ok_or_else(err);
    }

    let mut chars = s.chars().peekable();
    let letter = chars.next().ok_or_else(err)?.to_ascii_uppercase();
    let mut root: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(err()),
    };

    while let Some(&c) = chars.peek() {
        match c {
            '#' | '♯' => root += 1,
            'b' | '♭' => root -= 1,
            _ => break,
        }
        chars.next();
    }

    let suffix: String = chars.collect();
    let suffix = suffix.trim().trim_start_matches(['-', '_']).trim();
    let mode = match suffix {
        "" | "M" => Mode::Major,
        "m" => Mode::Minor,
        other => match other.to_lowercase().as_str() {
            "maj" | "major" | "ma" => Mode::Major,
            "min" | "minor" | "mi" => Mode::Minor,
            _ => return Err(err()),
        },
    };

    Ok(Key::new(root.rem_euclid(12) as u8, mode))
}

/// Wheel distance between two key spellings; symmetric
pub fn key_distance(a: &str, b: &str) -> Result<u32> {
    Ok(parse_key(a)?.distance(&parse_key(b)?))
}

/// Shortest signed transposition in [-6, 6] moving key `a` onto key `b`
///
/// Antisymmetric: `chromatic_shift_path(a, b) == -chromatic_shift_path(b, a)`.
pub fn chromatic_shift_path(a: &str, b: &str) -> Result<i32> {
    Ok(parse_key(a)?.shift_to(&parse_key(b)?))
}

/// Playback rate needed to move `source_bpm` material to `target_bpm`
pub fn stretch_ratio(source_bpm: f64, target_bpm: f64) -> f64 {
    target_bpm / source_bpm
}

/// Validated tempo change
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoMatch {
    pub ratio: f64,
    /// Ratio accepted but in the band where artifacts become audible
    pub quality_risk: bool,
}

/// Compute and bound-check the stretch ratio for a pairing
pub fn validate_stretch(source_bpm: f64, target_bpm: f64, limits: &StretchConfig) -> Result<TempoMatch> {
    if !(source_bpm.is_finite() && source_bpm > 0.0 && target_bpm.is_finite() && target_bpm > 0.0) {
        return Err(MashupError::InvalidJob(format!(
            "tempo must be positive (source {}, target {})",
            source_bpm, target_bpm
        )));
    }

    let ratio = stretch_ratio(source_bpm, target_bpm);
    const EPS: f64 = 1e-9;
    if ratio < limits.min_ratio - EPS || ratio > limits.max_ratio + EPS {
        return Err(MashupError::StretchRatioOutOfBounds {
            source_id: None,
            target_id: None,
            ratio,
            source_bpm,
            target_bpm,
            min: limits.min_ratio,
            max: limits.max_ratio,
        });
    }

    Ok(TempoMatch {
        ratio,
        quality_risk: ratio > limits.risk_above + EPS || ratio < limits.risk_below - EPS,
    })
}
