//! Mix snapshot model

use crate::catalog::Category;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sound name to "selected" flag; an absent key means not selected
pub type ActiveSounds = BTreeMap<String, bool>;

/// Per-category volume in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryVolumes {
    #[serde(deserialize_with = "percent")]
    pub nature: u8,
    #[serde(deserialize_with = "percent")]
    pub noise: u8,
    #[serde(deserialize_with = "percent")]
    pub melody: u8,
}

impl CategoryVolumes {
    pub const MAX: u8 = 100;

    pub fn new(nature: u8, noise: u8, melody: u8) -> Self {
        Self {
            nature: nature.min(Self::MAX),
            noise: noise.min(Self::MAX),
            melody: melody.min(Self::MAX),
        }
    }

    pub fn get(&self, category: Category) -> u8 {
        match category {
            Category::Nature => self.nature,
            Category::Noise => self.noise,
            Category::Melody => self.melody,
        }
    }

    /// Store `percent` clamped to 0..=100, returning the stored value
    pub fn set(&mut self, category: Category, percent: i32) -> u8 {
        let value = percent.clamp(0, Self::MAX as i32) as u8;
        match category {
            Category::Nature => self.nature = value,
            Category::Noise => self.noise = value,
            Category::Melody => self.melody = value,
        }
        value
    }

    /// Copy with every entry forced into range
    pub fn clamped(&self) -> Self {
        Self::new(self.nature, self.noise, self.melody)
    }
}

impl Default for CategoryVolumes {
    fn default() -> Self {
        Self::new(50, 30, 20)
    }
}

/// Accept any JSON number and clamp it into 0..=100
fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_nan() {
        return Ok(0);
    }
    Ok(value.round().clamp(0.0, CategoryVolumes::MAX as f64) as u8)
}

/// Persisted snapshot of a session's selection and volumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundMix {
    pub id: String,
    pub name: String,
    pub active_sound: ActiveSounds,
    pub volumes: CategoryVolumes,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

impl SoundMix {
    /// Names flagged as selected
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.active_sound
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_volumes() {
        let volumes = CategoryVolumes::default();
        assert_eq!(volumes.get(Category::Nature), 50);
        assert_eq!(volumes.get(Category::Noise), 30);
        assert_eq!(volumes.get(Category::Melody), 20);
    }

    #[test]
    fn test_set_clamps() {
        let mut volumes = CategoryVolumes::default();
        assert_eq!(volumes.set(Category::Noise, 250), 100);
        assert_eq!(volumes.set(Category::Melody, -3), 0);
        assert_eq!(volumes.set(Category::Nature, 80), 80);
        assert_eq!(volumes, CategoryVolumes::new(80, 100, 0));
    }

    #[test]
    fn test_new_clamps() {
        assert_eq!(CategoryVolumes::new(200, 5, 101).nature, 100);
        assert_eq!(CategoryVolumes::new(200, 5, 101).melody, 100);
    }

    #[test]
    fn test_json_shape() {
        let mut active_sound = ActiveSounds::new();
        active_sound.insert("Rain".to_string(), true);
        let mix = SoundMix {
            id: "mix-1".to_string(),
            name: "Focus".to_string(),
            active_sound,
            volumes: CategoryVolumes::new(80, 0, 0),
            created_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&mix).unwrap();
        assert_eq!(json["activeSound"]["Rain"], true);
        assert_eq!(json["volumes"]["nature"], 80);
        assert_eq!(json["createdAt"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_fractional_and_out_of_range_volumes() {
        let json = r#"{"nature": 79.6, "noise": -10, "melody": 1000}"#;
        let volumes: CategoryVolumes = serde_json::from_str(json).unwrap();
        assert_eq!(volumes, CategoryVolumes::new(80, 0, 100));
    }

    #[test]
    fn test_selected_skips_false_flags() {
        let mut active_sound = ActiveSounds::new();
        active_sound.insert("Rain".to_string(), true);
        active_sound.insert("Piano".to_string(), false);
        let mix = SoundMix {
            id: "mix-2".to_string(),
            name: "x".to_string(),
            active_sound,
            volumes: CategoryVolumes::default(),
            created_at: 0,
        };
        assert_eq!(mix.selected().collect::<Vec<_>>(), vec!["Rain"]);
    }
}
