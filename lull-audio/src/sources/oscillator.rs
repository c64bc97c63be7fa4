//! Periodic waveform oscillator

use std::f32::consts::PI;

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Parse a lowercase waveform name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sine" => Some(Self::Sine),
            "square" => Some(Self::Square),
            "sawtooth" => Some(Self::Sawtooth),
            "triangle" => Some(Self::Triangle),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
            Self::Triangle => "triangle",
        }
    }
}

/// Phase-accumulating oscillator
pub struct Oscillator {
    waveform: Waveform,
    frequency: f32,
    sample_rate: f32,
    phase: f32, // 0.0..1.0
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, sample_rate: f32) -> Self {
        Self {
            waveform,
            frequency,
            sample_rate,
            phase: 0.0,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        if frequency.is_finite() {
            self.frequency = frequency;
        }
    }

    /// Next sample with `offset` Hz added to the base frequency
    #[inline]
    pub fn next_sample(&mut self, offset: f32) -> f32 {
        let value = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * self.phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
        };

        let step = (self.frequency + offset) / self.sample_rate;
        self.phase = (self.phase + step).rem_euclid(1.0);
        value
    }

    /// Fill a block without modulation
    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_names_round_trip() {
        for waveform in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Sawtooth,
            Waveform::Triangle,
        ] {
            assert_eq!(Waveform::from_name(waveform.name()), Some(waveform));
        }
        assert_eq!(Waveform::from_name("noise"), None);
    }

    #[test]
    fn test_sine_period() {
        // 1 kHz at 8 kHz: eight samples per cycle
        let mut osc = Oscillator::new(Waveform::Sine, 1000.0, 8000.0);
        let mut out = [0.0; 8];
        osc.fill(&mut out);
        assert!(out[0].abs() < 1e-6);
        assert!((out[2] - 1.0).abs() < 1e-5);
        assert!((out[6] + 1.0).abs() < 1e-5);
        assert!(osc.next_sample(0.0).abs() < 1e-4);
    }

    #[test]
    fn test_outputs_stay_in_range() {
        for waveform in [Waveform::Square, Waveform::Sawtooth, Waveform::Triangle] {
            let mut osc = Oscillator::new(waveform, 330.0, 44100.0);
            let mut out = vec![0.0; 1024];
            osc.fill(&mut out);
            assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
        }
    }

    #[test]
    fn test_negative_offset_keeps_phase_valid() {
        let mut osc = Oscillator::new(Waveform::Sawtooth, 10.0, 1000.0);
        for _ in 0..100 {
            let s = osc.next_sample(-50.0);
            assert!((-1.0..=1.0).contains(&s));
        }
    }
}
