//! Audio capability consumed by the mixer
//!
//! The mixer never touches samples. It creates, wires, starts and mutes
//! nodes through [`AudioContext`]; a platform backend or the bundled
//! software renderer does the rest.

use crate::effects::FilterType;
use crate::sources::Waveform;
use thiserror::Error;

/// Opaque handle to a node owned by a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// Created but not yet allowed to produce sound
    #[default]
    Suspended,
    Running,
    /// Released; every further mutation fails
    Closed,
}

/// Automatable node parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Gain node multiplier
    Gain,
    /// Filter cutoff or oscillator frequency (Hz)
    Frequency,
    /// Filter resonance
    Q,
}

/// Where a node's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Audio input of another node
    Node(NodeId),
    /// Added on top of a parameter's base value
    Param(NodeId, Param),
    /// The shared output sink
    Output,
}

/// Biquad filter settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub filter_type: FilterType,
    /// Cutoff or center frequency in Hz
    pub cutoff: f32,
    pub q: f32,
}

impl FilterSpec {
    /// Filter with unit Q
    pub fn new(filter_type: FilterType, cutoff: f32) -> Self {
        Self {
            filter_type,
            cutoff,
            q: 1.0,
        }
    }

    pub fn with_q(mut self, q: f32) -> Self {
        self.q = q;
        self
    }
}

/// Errors raised by audio contexts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("Audio is not supported: {0}")]
    Unsupported(String),
    #[error("Audio context is closed")]
    Closed,
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),
    #[error("Cannot connect {from} to {to:?}")]
    InvalidConnection { from: NodeId, to: Destination },
    #[error("Node {0} has no {1:?} parameter")]
    UnknownParam(NodeId, Param),
    #[error("Node {0} is not a source")]
    NotASource(NodeId),
    #[error("Source {0} was already started")]
    AlreadyStarted(NodeId),
    #[error("Source {0} is not playing")]
    NotStarted(NodeId),
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Device error: {0}")]
    Device(String),
}

/// Sample data backing a buffer source (interleaved)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Zero-filled buffer
    pub fn silent(channels: u16, frames: usize, sample_rate: u32) -> Result<Self, AudioError> {
        Self::from_samples(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Wrap interleaved samples
    pub fn from_samples(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        if channels == 0 {
            return Err(AudioError::InvalidBuffer("zero channels".into()));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidBuffer("zero sample rate".into()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AudioError::InvalidBuffer(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Average of all channels at `frame`
    #[inline]
    pub fn mono_frame(&self, frame: usize) -> f32 {
        let channels = self.channels as usize;
        let start = frame * channels;
        let sum: f32 = self.samples[start..start + channels].iter().sum();
        sum / channels as f32
    }
}

/// Node-graph audio capability.
///
/// Mirrors the small subset of a browser-style audio API the mixer needs:
/// gain points, biquad filters, oscillators, buffer sources, connections,
/// start/stop and context resume/close.
pub trait AudioContext {
    fn state(&self) -> ContextState;

    fn sample_rate(&self) -> u32;

    /// Leave the suspended state; a no-op while running
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Release the context; fails with [`AudioError::Closed`] if already closed
    fn close(&mut self) -> Result<(), AudioError>;

    fn create_gain(&mut self, gain: f32) -> Result<NodeId, AudioError>;

    fn create_filter(&mut self, spec: FilterSpec) -> Result<NodeId, AudioError>;

    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32)
        -> Result<NodeId, AudioError>;

    /// Silent buffer at the context's sample rate
    fn create_buffer(&self, channels: u16, frames: usize) -> Result<AudioBuffer, AudioError> {
        if self.state() == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        AudioBuffer::silent(channels, frames, self.sample_rate())
    }

    fn create_buffer_source(
        &mut self,
        buffer: AudioBuffer,
        looping: bool,
    ) -> Result<NodeId, AudioError>;

    fn connect(&mut self, node: NodeId, destination: Destination) -> Result<(), AudioError>;

    /// Remove every outgoing connection of `node`
    fn disconnect(&mut self, node: NodeId) -> Result<(), AudioError>;

    fn start(&mut self, node: NodeId) -> Result<(), AudioError>;

    fn stop(&mut self, node: NodeId) -> Result<(), AudioError>;

    fn set_param(&mut self, node: NodeId, param: Param, value: f32) -> Result<(), AudioError>;

    /// Base value of a parameter (modulation excluded)
    fn param(&self, node: NodeId, param: Param) -> Result<f32, AudioError>;

    /// Decode a media file held in memory into a buffer at the context rate
    fn decode_audio_data(&self, bytes: &[u8]) -> Result<AudioBuffer, AudioError>;

    fn set_gain(&mut self, node: NodeId, gain: f32) -> Result<(), AudioError> {
        self.set_param(node, Param::Gain, gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_rejects_zero_channels() {
        assert!(matches!(
            AudioBuffer::silent(0, 16, 48000),
            Err(AudioError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_buffer_rejects_ragged_samples() {
        let result = AudioBuffer::from_samples(vec![0.0; 5], 48000, 2);
        assert!(matches!(result, Err(AudioError::InvalidBuffer(_))));
    }

    #[test]
    fn test_buffer_frames_and_duration() {
        let buffer = AudioBuffer::silent(2, 48000, 48000).unwrap();
        assert_eq!(buffer.frames(), 48000);
        assert_eq!(buffer.samples().len(), 96000);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mono_frame_averages_channels() {
        let buffer = AudioBuffer::from_samples(vec![0.2, 0.4, -1.0, 1.0], 44100, 2).unwrap();
        assert!((buffer.mono_frame(0) - 0.3).abs() < 1e-6);
        assert_eq!(buffer.mono_frame(1), 0.0);
    }

    #[test]
    fn test_filter_spec_defaults_to_unit_q() {
        let spec = FilterSpec::new(FilterType::BandPass, 800.0).with_q(0.5);
        assert_eq!(spec.cutoff, 800.0);
        assert_eq!(spec.q, 0.5);
        assert_eq!(FilterSpec::new(FilterType::LowPass, 400.0).q, 1.0);
    }
}
