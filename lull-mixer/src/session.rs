//! Live session state

use lull_library::{ActiveSounds, CategoryVolumes};

/// Whether the audio system came up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Initializing,
    Ready,
    /// Audio unavailable; controls are refused
    Error,
}

/// Aggregate playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Stopped,
    Playing,
}

/// State owned by the mixer for one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub readiness: Readiness,
    pub playback: Playback,
    pub category_volume: CategoryVolumes,
    /// Keys are always catalog sound names
    pub active_sound: ActiveSounds,
    /// Most recent failure shown to the user
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            readiness: Readiness::Initializing,
            playback: Playback::Stopped,
            category_volume: CategoryVolumes::default(),
            active_sound: ActiveSounds::new(),
            last_error: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback == Playback::Playing
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active_sound.get(name).copied().unwrap_or(false)
    }

    /// Flip a sound's flag, returning the new value
    pub fn toggle(&mut self, name: &str) -> bool {
        let flag = self.active_sound.entry(name.to_string()).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn any_active(&self) -> bool {
        self.active_sound.values().any(|&on| on)
    }

    pub fn active_names(&self) -> impl Iterator<Item = &str> {
        self.active_sound
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_inactive() {
        let state = SessionState::new();
        assert!(!state.is_active("Rain"));
        assert!(!state.any_active());
    }

    #[test]
    fn test_toggle_flips() {
        let mut state = SessionState::new();
        assert!(state.toggle("Rain"));
        assert!(!state.toggle("Rain"));
        assert!(state.active_sound.contains_key("Rain"));
        assert!(!state.any_active());
    }

    #[test]
    fn test_active_names() {
        let mut state = SessionState::new();
        state.toggle("Rain");
        state.toggle("Piano");
        state.toggle("Piano");
        assert_eq!(state.active_names().collect::<Vec<_>>(), vec!["Rain"]);
    }
}
