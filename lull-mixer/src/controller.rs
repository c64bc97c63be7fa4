//! Mixer Controller
//!
//! Owns the session: which sounds are selected, per-category volume and
//! aggregate playback. Every change is pushed straight into the gain points
//! of the [`SoundGraph`]. Saved mixes go through the [`MixStore`].
//!
//! Live gain for an audible sound is `percent / 100 * HEADROOM`; everything
//! else sits at 0.

use crate::builder::{AssetOutcome, BuildFailure, SoundGraph, SourceStrategy};
use crate::notify::{Notice, Notifier};
use crate::session::{Playback, Readiness, SessionState};
use lull_audio::{AudioContext, AudioError, ContextState};
use lull_library::{
    find_preset, find_sound, now_millis, presets, sounds, Category, MixStore, SoundMix,
    StoreError,
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Scales every gain so several sounds can sum without clipping
pub const HEADROOM: f32 = 0.5;

/// Gain for a category volume
pub fn level(percent: u8) -> f32 {
    percent as f32 / 100.0 * HEADROOM
}

/// Errors returned by mixer operations
#[derive(Error, Debug)]
pub enum MixerError {
    #[error("Audio system unavailable")]
    AudioUnavailable,
    #[error("Unknown sound: {0}")]
    UnknownSound(String),
    #[error("Unknown mix: {0}")]
    UnknownMix(String),
    #[error("No sound selected")]
    NothingSelected,
    #[error("Mix name is empty")]
    EmptyMixName,
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A mix removed by [`MixerController::delete_mix`].
///
/// Consumed by [`MixerController::undo_delete`], so the undo can run once.
#[derive(Debug)]
pub struct DeletedMix {
    mix: SoundMix,
}

impl DeletedMix {
    pub fn mix(&self) -> &SoundMix {
        &self.mix
    }

    pub fn id(&self) -> &str {
        &self.mix.id
    }

    pub fn name(&self) -> &str {
        &self.mix.name
    }
}

/// Session controller over an audio context `C`
pub struct MixerController<C: AudioContext> {
    context: Option<C>,
    graph: SoundGraph,
    state: SessionState,
    store: MixStore,
    notifier: Box<dyn Notifier>,
    mix_name: String,
    shut_down: bool,
}

impl<C: AudioContext> MixerController<C> {
    /// Start a session.
    ///
    /// A failing `open_context` is fatal: the session stays in
    /// [`Readiness::Error`] and refuses every control.
    pub fn open<F>(
        open_context: F,
        strategy: SourceStrategy,
        store: MixStore,
        notifier: impl Notifier + 'static,
    ) -> Self
    where
        F: FnOnce() -> Result<C, AudioError>,
    {
        let mut controller = Self {
            context: None,
            graph: SoundGraph::empty(),
            state: SessionState::new(),
            store,
            notifier: Box::new(notifier),
            mix_name: String::new(),
            shut_down: false,
        };

        if controller.store.load_error().is_some() {
            controller.notify(Notice::error("Failed to load saved mixes"));
        }

        match open_context() {
            Ok(mut ctx) => {
                let (graph, failures) = SoundGraph::build_all(&mut ctx, sounds(), &strategy);
                controller.graph = graph;
                controller.context = Some(ctx);
                controller.state.readiness = Readiness::Ready;
                for failure in failures {
                    controller.report_build_failure(failure);
                }
                info!(
                    "Mixer ready ({} sounds, {} pending)",
                    controller.graph.len(),
                    controller.graph.pending_assets()
                );
            }
            Err(e) => {
                error!("Failed to initialize audio system: {}", e);
                controller.state.readiness = Readiness::Error;
                controller.fail(Notice::error("Failed to initialize audio system"));
            }
        }

        controller
    }

    /// Flip a sound's selection.
    ///
    /// While playing the sound's gain follows at once. A sound without a
    /// handle still flips but stays silent.
    pub fn toggle_sound(&mut self, name: &str) -> Result<bool, MixerError> {
        self.ensure_ready()?;
        let sound = find_sound(name).ok_or_else(|| MixerError::UnknownSound(name.to_string()))?;

        if let Err(e) = self.resume_if_suspended() {
            warn!("Failed to resume audio context: {}", e);
            self.fail(Notice::error("Failed to start audio playback"));
        }

        let active = self.state.toggle(sound.name);
        if self.state.is_playing() {
            let gain = if active {
                level(self.state.category_volume.get(sound.category))
            } else {
                0.0
            };
            self.apply_gain(sound.name, gain);
        }

        if active {
            self.notify(Notice::info(
                format!("{} activated", sound.name),
                format!("{} has been added to your mix", sound.name),
            ));
        } else {
            self.notify(Notice::info(
                format!("{} deactivated", sound.name),
                format!("{} has been removed from your mix", sound.name),
            ));
        }
        debug!("{} -> {}", sound.name, active);

        self.self_correct();
        Ok(active)
    }

    /// Set a category's volume, clamped to 0..=100; returns the stored value
    pub fn set_category_volume(
        &mut self,
        category: Category,
        percent: i32,
    ) -> Result<u8, MixerError> {
        self.ensure_ready()?;
        let stored = self.state.category_volume.set(category, percent);

        if self.state.is_playing() {
            let active: Vec<&'static str> = sounds()
                .iter()
                .filter(|s| s.category == category && self.state.is_active(s.name))
                .map(|s| s.name)
                .collect();
            for name in active {
                self.apply_gain(name, level(stored));
            }
        }
        debug!("{} volume -> {}", category, stored);

        self.self_correct();
        Ok(stored)
    }

    /// Start playback of the selected sounds
    pub fn play(&mut self) -> Result<(), MixerError> {
        self.ensure_ready()?;
        if !self.state.any_active() {
            self.notify(Notice::info(
                "Nothing selected",
                "Select at least one sound to start playback",
            ));
            return Err(MixerError::NothingSelected);
        }

        if let Err(e) = self.resume_if_suspended() {
            warn!("Failed to resume audio context: {}", e);
            self.fail(Notice::error("Failed to start audio playback"));
            return Err(e.into());
        }

        self.apply_levels();
        self.state.playback = Playback::Playing;
        info!("Playback started");
        self.notify(Notice::info("Playback started", "Your sound mix is now playing"));
        Ok(())
    }

    /// Mute everything. Always succeeds.
    pub fn pause(&mut self) -> Result<(), MixerError> {
        if !self.state.is_ready() || self.shut_down {
            return Ok(());
        }
        self.silence();
        info!("Playback paused");
        self.notify(Notice::info("Playback paused", "All sounds have been muted"));
        Ok(())
    }

    /// Play when stopped, pause when playing
    pub fn toggle_playback(&mut self) -> Result<(), MixerError> {
        if self.state.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Pause, restore default volumes and clear the selection
    pub fn reset(&mut self) -> Result<(), MixerError> {
        self.ensure_ready()?;
        self.silence();
        self.state.category_volume = Default::default();
        self.state.active_sound.clear();
        info!("Mixer reset");
        self.notify(Notice::info(
            "Mixer reset",
            "All settings have been reset to default",
        ));
        Ok(())
    }

    /// Text of the mix-name field
    pub fn mix_name(&self) -> &str {
        &self.mix_name
    }

    pub fn set_mix_name(&mut self, name: impl Into<String>) {
        self.mix_name = name.into();
    }

    /// Save the current selection under the mix-name field
    pub fn save_mix(&mut self) -> Result<SoundMix, MixerError> {
        let name = self.mix_name.clone();
        self.save_mix_as(&name)
    }

    /// Save the current selection and volumes as a new mix
    pub fn save_mix_as(&mut self, name: &str) -> Result<SoundMix, MixerError> {
        self.ensure_ready()?;
        let name = name.trim();
        if name.is_empty() {
            self.notify(Notice::error("Please enter a name for your mix"));
            return Err(MixerError::EmptyMixName);
        }
        if !self.state.any_active() {
            self.notify(Notice::error(
                "Please select at least one sound before saving",
            ));
            return Err(MixerError::NothingSelected);
        }

        let now = now_millis();
        let mix = SoundMix {
            id: self.store.next_id(now),
            name: name.to_string(),
            active_sound: self.state.active_sound.clone(),
            volumes: self.state.category_volume,
            created_at: now,
        };

        if let Err(e) = self.store.append(mix.clone()) {
            warn!("Failed to save mix: {}", e);
            self.fail(Notice::error("Failed to save mix"));
            return Err(e.into());
        }

        self.mix_name.clear();
        info!("Saved mix {} ({})", mix.name, mix.id);
        self.notify(Notice::info(
            "Mix saved",
            format!("\"{}\" has been saved successfully", mix.name),
        ));
        Ok(mix)
    }

    /// Replace selection and volumes with a mix's; pauses first if playing.
    ///
    /// Gains are not re-applied until the next [`play`](Self::play).
    pub fn load_mix(&mut self, mix: &SoundMix) -> Result<(), MixerError> {
        self.ensure_ready()?;
        if self.state.is_playing() {
            self.silence();
        }

        self.state.category_volume = mix.volumes.clamped();
        self.state.active_sound = mix
            .active_sound
            .iter()
            .filter(|(name, _)| {
                let known = find_sound(name).is_some();
                if !known {
                    warn!("Mix {} references unknown sound {}", mix.id, name);
                }
                known
            })
            .map(|(name, &on)| (name.clone(), on))
            .collect();

        info!("Loaded mix {} ({})", mix.name, mix.id);
        self.notify(Notice::info(
            "Mix loaded",
            format!("\"{}\" has been loaded successfully", mix.name),
        ));
        Ok(())
    }

    /// Load a saved mix or preset by id
    pub fn load_mix_by_id(&mut self, id: &str) -> Result<(), MixerError> {
        self.ensure_ready()?;
        let mix = self.store.get(id).cloned().or_else(|| find_preset(id));
        match mix {
            Some(mix) => self.load_mix(&mix),
            None => {
                self.notify(Notice::error("Failed to load mix"));
                Err(MixerError::UnknownMix(id.to_string()))
            }
        }
    }

    /// Remove a saved mix; the returned value can undo it once
    pub fn delete_mix(&mut self, id: &str) -> Result<DeletedMix, MixerError> {
        self.ensure_ready()?;
        match self.store.remove(id) {
            Ok(Some(mix)) => {
                info!("Deleted mix {} ({})", mix.name, mix.id);
                self.notify(Notice::info(
                    "Mix deleted",
                    format!("\"{}\" has been deleted", mix.name),
                ));
                Ok(DeletedMix { mix })
            }
            Ok(None) => Err(MixerError::UnknownMix(id.to_string())),
            Err(e) => {
                warn!("Failed to delete mix: {}", e);
                self.fail(Notice::error("Failed to delete mix"));
                Err(e.into())
            }
        }
    }

    /// Re-append a deleted mix at the end of the collection
    pub fn undo_delete(&mut self, deleted: DeletedMix) -> Result<(), MixerError> {
        self.ensure_ready()?;
        let name = deleted.mix.name.clone();
        if let Err(e) = self.store.restore(deleted.mix) {
            warn!("Failed to restore mix: {}", e);
            self.fail(Notice::error("Failed to restore mix"));
            return Err(e.into());
        }

        info!("Restored mix {}", name);
        self.notify(Notice::info(
            "Mix restored",
            format!("\"{}\" has been restored", name),
        ));
        Ok(())
    }

    /// Wire assets that have arrived; returns how many were resolved
    pub fn poll(&mut self) -> usize {
        let Some(ctx) = self.context.as_mut() else {
            return 0;
        };
        let outcomes = self.graph.poll_assets(ctx);
        let count = outcomes.len();
        for outcome in outcomes {
            self.handle_asset(outcome);
        }
        count
    }

    /// Block until every requested asset resolved or `timeout` passed.
    ///
    /// Returns true when nothing is pending.
    pub fn wait_for_assets(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.graph.pending_assets() > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let Some(ctx) = self.context.as_mut() else {
                break;
            };
            match self.graph.wait_asset(ctx, deadline - now) {
                Some(outcome) => self.handle_asset(outcome),
                None => break,
            }
        }
        self.graph.pending_assets() == 0
    }

    /// Tear the session down; later calls do nothing
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.state.playback = Playback::Stopped;
        if let Some(ctx) = self.context.as_mut() {
            self.graph.release_all(ctx);
        }
        info!("Mixer shut down");
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready() && !self.shut_down
    }

    pub fn saved_mixes(&self) -> &[SoundMix] {
        self.store.mixes()
    }

    pub fn presets(&self) -> Vec<SoundMix> {
        presets()
    }

    /// Live gain of a sound's gain point, `None` without a handle
    pub fn gain_of(&self, name: &str) -> Option<f32> {
        let ctx = self.context.as_ref()?;
        self.graph.gain(ctx, name)
    }

    /// Selected sounds that are audible right now
    pub fn now_playing(&self) -> Vec<&'static str> {
        if !self.state.is_playing() {
            return Vec::new();
        }
        sounds()
            .iter()
            .filter(|s| self.state.is_active(s.name) && self.graph.contains(s.name))
            .map(|s| s.name)
            .collect()
    }

    pub fn pending_assets(&self) -> usize {
        self.graph.pending_assets()
    }

    pub fn graph(&self) -> &SoundGraph {
        &self.graph
    }

    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    fn ensure_ready(&self) -> Result<(), MixerError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(MixerError::AudioUnavailable)
        }
    }

    fn notify(&mut self, notice: Notice) {
        self.notifier.notify(notice);
    }

    /// Notify an error and remember it
    fn fail(&mut self, notice: Notice) {
        self.state.last_error = Some(notice.message.clone());
        self.notify(notice);
    }

    fn report_build_failure(&mut self, failure: BuildFailure) {
        self.notify(Notice::error(format!(
            "Failed to create {} sound",
            failure.sound
        )));
    }

    fn handle_asset(&mut self, outcome: AssetOutcome) {
        match outcome {
            AssetOutcome::Attached(name) => {
                if self.state.is_playing() && self.state.is_active(&name) {
                    if let Some(sound) = find_sound(&name) {
                        let gain = level(self.state.category_volume.get(sound.category));
                        self.apply_gain(sound.name, gain);
                    }
                }
            }
            AssetOutcome::Discarded(name) => debug!("Discarded late asset for {}", name),
            AssetOutcome::Failed(failure) => self.report_build_failure(failure),
        }
    }

    fn resume_if_suspended(&mut self) -> Result<(), AudioError> {
        let ctx = self.context.as_mut().ok_or(AudioError::Closed)?;
        match ctx.state() {
            ContextState::Suspended => ctx.resume(),
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(AudioError::Closed),
        }
    }

    fn apply_gain(&mut self, name: &str, gain: f32) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        match self.graph.set_gain(ctx, name, gain) {
            Ok(true) => debug!("{} gain -> {:.3}", name, gain),
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to set {} gain: {}", name, e);
                self.state.last_error = Some(e.to_string());
            }
        }
    }

    /// Active sounds at their category level, everything else at 0
    fn apply_levels(&mut self) {
        for sound in sounds() {
            let gain = if self.state.is_active(sound.name) {
                level(self.state.category_volume.get(sound.category))
            } else {
                0.0
            };
            self.apply_gain(sound.name, gain);
        }
    }

    /// Mute every handle and stop, without a notice
    fn silence(&mut self) {
        for sound in sounds() {
            self.apply_gain(sound.name, 0.0);
        }
        self.state.playback = Playback::Stopped;
    }

    /// Pause when playing but no selected sound is controllable.
    ///
    /// A sound whose asset is still loading counts as controllable.
    fn self_correct(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        let controllable = self
            .state
            .active_names()
            .any(|name| self.graph.contains(name) || self.graph.is_pending(name));
        if !controllable {
            info!("No controllable sound left, pausing");
            self.silence();
            self.notify(Notice::info(
                "Nothing playing",
                "No selected sound can play, playback paused",
            ));
        }
    }
}

impl<C: AudioContext> Drop for MixerController<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
