//! Noise generator
//!
//! Fills buffers with the three noise colors used by the procedural
//! sounds. Pink and brown are crude approximations: scaled white noise
//! that the graph later shapes with a low-pass filter.

/// Noise color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

impl NoiseColor {
    /// Amplitude applied to uniform noise in [-1, 1]
    pub fn scale(&self) -> f32 {
        match self {
            Self::White => 1.0,
            Self::Pink => 0.5,
            Self::Brown => 0.1,
        }
    }
}

/// Deterministic noise source
pub struct NoiseGenerator {
    state: u64,
}

impl NoiseGenerator {
    const DEFAULT_SEED: u64 = 0xDEADBEEF_CAFEBABE;

    pub fn new() -> Self {
        Self::with_seed(Self::DEFAULT_SEED)
    }

    /// xorshift state must be non-zero
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: if seed == 0 { Self::DEFAULT_SEED } else { seed },
        }
    }

    /// Uniform in [0, 1] from a xorshift64 step
    #[inline]
    pub fn next_random(&mut self) -> f32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x as f32 / u64::MAX as f32
    }

    /// Uniform white noise in [-1, 1]
    #[inline]
    pub fn white(&mut self) -> f32 {
        self.next_random() * 2.0 - 1.0
    }

    /// Next sample of the given color
    #[inline]
    pub fn sample(&mut self, color: NoiseColor) -> f32 {
        match color {
            // Brown draws from [0, 1] only
            NoiseColor::Brown => self.next_random() * color.scale(),
            _ => self.white() * color.scale(),
        }
    }

    pub fn fill(&mut self, out: &mut [f32], color: NoiseColor) {
        for sample in out.iter_mut() {
            *sample = self.sample(color);
        }
    }
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_noise_range_and_mean() {
        let mut noise = NoiseGenerator::new();
        let mut out = vec![0.0; 48000];
        noise.fill(&mut out, NoiseColor::White);
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
        let mean = out.iter().sum::<f32>() / out.len() as f32;
        assert!(mean.abs() < 0.05);
    }

    #[test]
    fn test_pink_noise_half_amplitude() {
        let mut noise = NoiseGenerator::new();
        let mut out = vec![0.0; 4800];
        noise.fill(&mut out, NoiseColor::Pink);
        assert!(out.iter().all(|s| s.abs() <= 0.5));
        assert!(out.iter().any(|s| s.abs() > 0.25));
    }

    #[test]
    fn test_brown_noise_is_small_and_positive() {
        let mut noise = NoiseGenerator::new();
        let mut out = vec![0.0; 4800];
        noise.fill(&mut out, NoiseColor::Brown);
        assert!(out.iter().all(|s| (0.0..=0.1).contains(s)));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = NoiseGenerator::with_seed(42);
        let mut b = NoiseGenerator::with_seed(42);
        for _ in 0..16 {
            assert_eq!(a.white(), b.white());
        }
    }

    #[test]
    fn test_zero_seed_is_replaced() {
        let mut noise = NoiseGenerator::with_seed(0);
        assert_ne!(noise.next_random(), 0.0);
    }
}
