//! Simple configuration persistence for Lull
//!
//! Stores where sounds come from and where mixes are kept.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where sound sources come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Synthesized at startup
    #[default]
    Procedural,
    /// Media files named after each sound
    Assets,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Procedural => "procedural",
            SourceKind::Assets => "assets",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [SourceKind::Procedural, SourceKind::Assets]
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: SourceKind,
    /// Directory holding sound files (assets source only)
    pub asset_dir: Option<PathBuf>,
    /// Extension of sound files, without the dot
    pub asset_extension: String,
    /// Directory holding saved mixes
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            asset_dir: None,
            asset_extension: Self::DEFAULT_EXTENSION.to_string(),
            data_dir: Self::default_data_dir(),
        }
    }
}

impl Config {
    pub const DEFAULT_EXTENSION: &'static str = "mp3";

    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lull")
            .join("config.txt")
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lull")
    }

    /// Sound directory, defaulting to `sounds` under the data directory
    pub fn resolved_asset_dir(&self) -> PathBuf {
        self.asset_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("sounds"))
    }

    /// Parse `key=value` lines; `#` starts a comment, unknown keys are skipped
    fn parse(content: &str) -> Self {
        let mut config = Self::default();
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()));

        for (key, value) in entries {
            if value.is_empty() {
                continue;
            }
            match key {
                "source" => match SourceKind::from_name(value) {
                    Some(source) => config.source = source,
                    None => warn!("Unknown sound source '{}', using default", value),
                },
                "asset_dir" => config.asset_dir = Some(PathBuf::from(value)),
                "asset_extension" => {
                    let extension = value.trim_start_matches('.');
                    if !extension.is_empty() {
                        config.asset_extension = extension.to_string();
                    }
                }
                "data_dir" => config.data_dir = PathBuf::from(value),
                _ => {}
            }
        }

        config
    }

    fn serialize(&self) -> String {
        let mut out = String::from("# Lull configuration\n");
        out.push_str(&format!("source={}\n", self.source.name()));
        if let Some(dir) = &self.asset_dir {
            out.push_str(&format!("asset_dir={}\n", dir.display()));
        }
        out.push_str(&format!("asset_extension={}\n", self.asset_extension));
        out.push_str(&format!("data_dir={}\n", self.data_dir.display()));
        out
    }
}
