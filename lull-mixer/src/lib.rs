//! Mixer core for Lull
//!
//! - Builder: catalog entries to running, silent sources with gain points
//! - Controller: session state machine driving those gain points
//! - Session: readiness, playback, volumes and selection
//! - Notify: user-visible notices

mod builder;
mod controller;
mod notify;
mod session;

pub use builder::{
    default_voice, AssetOutcome, BuildError, BuildFailure, SoundGraph, SoundHandle, SourceStrategy,
};
pub use controller::{level, DeletedMix, MixerController, MixerError, HEADROOM};
pub use notify::{LogNotifier, Notice, NoticeLevel, Notifier};
pub use session::{Playback, Readiness, SessionState};
