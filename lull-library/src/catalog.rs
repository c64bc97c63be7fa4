//! Built-in sounds and preset mixes
//!
//! Pure data, fixed at compile time. Each sound belongs to exactly one
//! [`Category`] and may carry a [`Voice`] describing how to synthesize it.

use crate::mix::{ActiveSounds, CategoryVolumes, SoundMix};
use lull_audio::{FilterType, NoiseColor, Waveform};
use serde::{Deserialize, Serialize};

/// Volume group a sound belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Nature,
    Noise,
    Melody,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Nature, Category::Noise, Category::Melody];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Nature => "nature",
            Category::Noise => "noise",
            Category::Melody => "melody",
        }
    }

    /// Case-insensitive lookup
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Slow periodic modulation of a filter cutoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swell {
    pub rate_hz: f32,
    /// Peak deviation of the cutoff
    pub depth_hz: f32,
}

/// Procedural synthesis parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Voice {
    /// Looping noise buffer of a given color
    Noise { color: NoiseColor },
    /// Continuous oscillator
    Tone { frequency: f32, waveform: Waveform },
    /// Filtered white noise, optionally swelling
    Texture {
        filter: FilterType,
        cutoff: f32,
        q: f32,
        swell: Option<Swell>,
    },
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct SoundDescriptor {
    /// Unique; also the display label and the key into per-sound maps
    pub name: &'static str,
    pub category: Category,
    pub icon: &'static str,
    /// UI color token
    pub color: &'static str,
    /// `None` falls back to the category's default voice
    pub voice: Option<Voice>,
}

static SOUNDS: [SoundDescriptor; 9] = [
    SoundDescriptor {
        name: "Rain",
        category: Category::Nature,
        icon: "🌧️",
        color: "bg-blue-500",
        voice: Some(Voice::Texture {
            filter: FilterType::BandPass,
            cutoff: 1000.0,
            q: 1.0,
            swell: None,
        }),
    },
    SoundDescriptor {
        name: "Forest",
        category: Category::Nature,
        icon: "🌲",
        color: "bg-green-600",
        voice: Some(Voice::Texture {
            filter: FilterType::BandPass,
            cutoff: 800.0,
            q: 0.5,
            swell: None,
        }),
    },
    SoundDescriptor {
        name: "Ocean",
        category: Category::Nature,
        icon: "🌊",
        color: "bg-blue-400",
        voice: Some(Voice::Texture {
            filter: FilterType::LowPass,
            cutoff: 400.0,
            q: 1.0,
            swell: Some(Swell {
                rate_hz: 0.2,
                depth_hz: 50.0,
            }),
        }),
    },
    SoundDescriptor {
        name: "White Noise",
        category: Category::Noise,
        icon: "⚪",
        color: "bg-gray-300",
        voice: Some(Voice::Noise {
            color: NoiseColor::White,
        }),
    },
    SoundDescriptor {
        name: "Pink Noise",
        category: Category::Noise,
        icon: "🔘",
        color: "bg-pink-300",
        voice: Some(Voice::Noise {
            color: NoiseColor::Pink,
        }),
    },
    SoundDescriptor {
        name: "Brown Noise",
        category: Category::Noise,
        icon: "🟤",
        color: "bg-amber-700",
        voice: Some(Voice::Noise {
            color: NoiseColor::Brown,
        }),
    },
    SoundDescriptor {
        name: "Piano",
        category: Category::Melody,
        icon: "🎹",
        color: "bg-indigo-500",
        voice: Some(Voice::Tone {
            frequency: 440.0,
            waveform: Waveform::Sine,
        }),
    },
    SoundDescriptor {
        name: "Ambient",
        category: Category::Melody,
        icon: "🎵",
        color: "bg-purple-500",
        voice: Some(Voice::Tone {
            frequency: 220.0,
            waveform: Waveform::Sine,
        }),
    },
    SoundDescriptor {
        name: "Lo-Fi",
        category: Category::Melody,
        icon: "🎧",
        color: "bg-teal-500",
        voice: Some(Voice::Tone {
            frequency: 330.0,
            waveform: Waveform::Triangle,
        }),
    },
];

/// All sounds, in display order
pub fn sounds() -> &'static [SoundDescriptor] {
    &SOUNDS
}

pub fn find_sound(name: &str) -> Option<&'static SoundDescriptor> {
    SOUNDS.iter().find(|s| s.name == name)
}

pub fn sounds_in(category: Category) -> impl Iterator<Item = &'static SoundDescriptor> {
    SOUNDS.iter().filter(move |s| s.category == category)
}

/// Built-in mixes offered alongside saved ones
pub fn presets() -> Vec<SoundMix> {
    fn preset(id: &str, name: &str, sounds: &[&str], volumes: CategoryVolumes) -> SoundMix {
        let active_sound: ActiveSounds = sounds.iter().map(|s| (s.to_string(), true)).collect();
        SoundMix {
            id: id.to_string(),
            name: name.to_string(),
            active_sound,
            volumes,
            created_at: 0,
        }
    }

    vec![
        preset(
            "preset-1",
            "Deep Focus",
            &["Brown Noise", "Piano"],
            CategoryVolumes::new(0, 70, 30),
        ),
        preset(
            "preset-2",
            "Nature Retreat",
            &["Forest", "Rain"],
            CategoryVolumes::new(80, 0, 0),
        ),
        preset(
            "preset-3",
            "Relaxation",
            &["Ocean", "Ambient"],
            CategoryVolumes::new(60, 0, 40),
        ),
        preset(
            "preset-4",
            "Productivity",
            &["White Noise", "Lo-Fi"],
            CategoryVolumes::new(0, 50, 50),
        ),
    ]
}

pub fn find_preset(id: &str) -> Option<SoundMix> {
    presets().into_iter().find(|p| p.id == id)
}

/// Media file name for a sound: lower-cased, whitespace runs as `-`
pub fn asset_file_name(name: &str, extension: &str) -> String {
    let stem = name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_unique() {
        let names: HashSet<_> = sounds().iter().map(|s| s.name).collect();
        assert_eq!(names.len(), sounds().len());
    }

    #[test]
    fn test_every_category_populated() {
        for category in Category::ALL {
            assert_eq!(sounds_in(category).count(), 3, "{}", category);
        }
    }

    #[test]
    fn test_find_sound() {
        let rain = find_sound("Rain").unwrap();
        assert_eq!(rain.category, Category::Nature);
        assert!(find_sound("rain").is_none());
        assert!(find_sound("Thunder").is_none());
    }

    #[test]
    fn test_melody_voices() {
        assert_eq!(
            find_sound("Lo-Fi").unwrap().voice,
            Some(Voice::Tone {
                frequency: 330.0,
                waveform: Waveform::Triangle
            })
        );
    }

    #[test]
    fn test_presets_reference_catalog_sounds() {
        let presets = presets();
        assert_eq!(presets.len(), 4);
        for preset in &presets {
            assert_eq!(preset.created_at, 0);
            for name in preset.active_sound.keys() {
                assert!(find_sound(name).is_some(), "{} in {}", name, preset.name);
            }
        }
    }

    #[test]
    fn test_find_preset() {
        let focus = find_preset("preset-1").unwrap();
        assert_eq!(focus.name, "Deep Focus");
        assert_eq!(focus.volumes, CategoryVolumes::new(0, 70, 30));
        assert!(find_preset("preset-9").is_none());
    }

    #[test]
    fn test_category_from_name() {
        assert_eq!(Category::from_name("Nature"), Some(Category::Nature));
        assert_eq!(Category::from_name(" melody "), Some(Category::Melody));
        assert_eq!(Category::from_name("drums"), None);
    }

    #[test]
    fn test_asset_file_name() {
        assert_eq!(asset_file_name("White Noise", "mp3"), "white-noise.mp3");
        assert_eq!(asset_file_name("Lo-Fi", ".ogg"), "lo-fi.ogg");
        assert_eq!(asset_file_name("Rain", ""), "rain");
        assert_eq!(
            asset_file_name("Brown Noise", "wav"),
            asset_file_name("Brown Noise", "wav")
        );
    }
}
