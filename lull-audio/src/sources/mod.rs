//! Sample generators: oscillators, noise and buffer playback

mod buffer;
mod noise;
mod oscillator;

pub use buffer::BufferPlayer;
pub use noise::{NoiseColor, NoiseGenerator};
pub use oscillator::{Oscillator, Waveform};
