//! Buffer playback source

use crate::context::AudioBuffer;

/// Plays an [`AudioBuffer`] downmixed to mono, optionally looping
pub struct BufferPlayer {
    buffer: AudioBuffer,
    looping: bool,
    position: usize,
    finished: bool,
}

impl BufferPlayer {
    pub fn new(buffer: AudioBuffer, looping: bool) -> Self {
        let finished = buffer.is_empty();
        Self {
            buffer,
            looping,
            position: 0,
            finished,
        }
    }

    /// True once a non-looping buffer has played to the end
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.finished {
            return 0.0;
        }
        let value = self.buffer.mono_frame(self.position);
        self.position += 1;
        if self.position >= self.buffer.frames() {
            if self.looping {
                self.position = 0;
            } else {
                self.finished = true;
            }
        }
        value
    }

    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> AudioBuffer {
        AudioBuffer::from_samples(vec![0.1, 0.2, 0.3], 48000, 1).unwrap()
    }

    #[test]
    fn test_looping_wraps() {
        let mut player = BufferPlayer::new(ramp(), true);
        let mut out = [0.0; 7];
        player.fill(&mut out);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1]);
        assert!(!player.is_finished());
    }

    #[test]
    fn test_one_shot_ends_in_silence() {
        let mut player = BufferPlayer::new(ramp(), false);
        let mut out = [1.0; 5];
        player.fill(&mut out);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.0, 0.0]);
        assert!(player.is_finished());
    }

    #[test]
    fn test_empty_buffer_is_silent() {
        let empty = AudioBuffer::from_samples(Vec::new(), 48000, 2).unwrap();
        let mut player = BufferPlayer::new(empty, true);
        assert_eq!(player.next_sample(), 0.0);
    }
}
