//! Audio layer for Lull - node graph capability and a software renderer
//!
//! This crate provides everything below the mixer:
//! - Context: the `AudioContext` trait the mixer drives
//! - Engine: `SoftwareContext`, an in-process graph renderer
//! - Effects: biquad filter and gain
//! - Sources: oscillators, colored noise, buffer playback
//! - Decode: media bytes to `AudioBuffer` at the context rate

mod context;
mod decode;
mod effects;
mod engine;
mod shared;
mod sources;

pub use context::{
    AudioBuffer, AudioContext, AudioError, ContextState, Destination, FilterSpec, NodeId, Param,
};
pub use decode::decode;
pub use effects::{Effect, Filter, FilterType, Gain};
pub use engine::{SoftwareContext, SourceState};
pub use shared::SharedContext;
pub use sources::{BufferPlayer, NoiseColor, NoiseGenerator, Oscillator, Waveform};
