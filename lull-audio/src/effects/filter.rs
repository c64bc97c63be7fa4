//! Biquad filter (high-pass, low-pass, band-pass)

use super::Effect;
use std::f32::consts::PI;

/// Filter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
    BandPass,
}

/// Normalized biquad coefficients (`a0` divided out)
#[derive(Debug, Clone, Copy)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    /// RBJ cookbook formulas
    fn design(filter_type: FilterType, sample_rate: f32, cutoff: f32, q: f32) -> Self {
        let omega = 2.0 * PI * cutoff / sample_rate;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);

        let (b0, b1, b2) = match filter_type {
            FilterType::LowPass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
            FilterType::HighPass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
            FilterType::BandPass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Mono RBJ biquad, direct form I
pub struct Filter {
    filter_type: FilterType,
    sample_rate: f32,
    cutoff: f32,
    /// Q factor
    resonance: f32,
    coeffs: Coefficients,
    /// x[n-1], x[n-2], y[n-1], y[n-2]
    history: [f32; 4],
}

impl Filter {
    const MIN_CUTOFF: f32 = 10.0;
    const MIN_RESONANCE: f32 = 0.0001;
    const MAX_RESONANCE: f32 = 30.0;

    pub fn new(filter_type: FilterType, sample_rate: f32, cutoff: f32, resonance: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let cutoff = clamp_cutoff(cutoff, sample_rate);
        let resonance = resonance.clamp(Self::MIN_RESONANCE, Self::MAX_RESONANCE);
        Self {
            filter_type,
            sample_rate,
            cutoff,
            resonance,
            coeffs: Coefficients::design(filter_type, sample_rate, cutoff, resonance),
            history: [0.0; 4],
        }
    }

    /// Set cutoff frequency, kept between 10 Hz and just below Nyquist
    pub fn set_cutoff(&mut self, cutoff: f32) {
        let cutoff = clamp_cutoff(cutoff, self.sample_rate);
        if cutoff != self.cutoff {
            self.cutoff = cutoff;
            self.redesign();
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        let resonance = resonance.clamp(Self::MIN_RESONANCE, Self::MAX_RESONANCE);
        if resonance != self.resonance {
            self.resonance = resonance;
            self.redesign();
        }
    }

    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    fn redesign(&mut self) {
        self.coeffs =
            Coefficients::design(self.filter_type, self.sample_rate, self.cutoff, self.resonance);
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let Coefficients { b0, b1, b2, a1, a2 } = self.coeffs;
        let [x1, x2, y1, y2] = self.history;
        let output = b0 * input + b1 * x1 + b2 * x2 - a1 * y1 - a2 * y2;
        self.history = [input, x1, output, y1];
        output
    }
}

fn clamp_cutoff(cutoff: f32, sample_rate: f32) -> f32 {
    let ceiling = sample_rate * 0.49;
    if cutoff.is_finite() {
        cutoff.clamp(Filter::MIN_CUTOFF.min(ceiling), ceiling)
    } else {
        ceiling
    }
}

impl Effect for Filter {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    fn reset(&mut self) {
        self.history = [0.0; 4];
    }

    fn name(&self) -> &'static str {
        match self.filter_type {
            FilterType::LowPass => "Low-pass",
            FilterType::HighPass => "High-pass",
            FilterType::BandPass => "Band-pass",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_lowpass_attenuates_high_frequencies() {
        let mut filter = Filter::new(FilterType::LowPass, 48000.0, 500.0, 0.707);
        let mut samples = sine(8000.0, 48000.0, 4800);
        filter.process(&mut samples);
        assert!(rms(&samples[2400..]) < 0.05);
    }

    #[test]
    fn test_lowpass_passes_low_frequencies() {
        let mut filter = Filter::new(FilterType::LowPass, 48000.0, 2000.0, 0.707);
        let mut samples = sine(100.0, 48000.0, 4800);
        filter.process(&mut samples);
        assert!(rms(&samples[2400..]) > 0.6);
    }

    #[test]
    fn test_highpass_attenuates_low_frequencies() {
        let mut filter = Filter::new(FilterType::HighPass, 48000.0, 2000.0, 0.707);
        let mut samples = sine(50.0, 48000.0, 9600);
        filter.process(&mut samples);
        assert!(rms(&samples[4800..]) < 0.05);
    }

    #[test]
    fn test_bandpass_peaks_at_center() {
        let mut center = Filter::new(FilterType::BandPass, 48000.0, 1000.0, 1.0);
        let mut off = Filter::new(FilterType::BandPass, 48000.0, 1000.0, 1.0);
        let mut at_center = sine(1000.0, 48000.0, 4800);
        let mut far = sine(12000.0, 48000.0, 4800);
        center.process(&mut at_center);
        off.process(&mut far);
        assert!(rms(&at_center[2400..]) > rms(&far[2400..]) * 3.0);
    }

    #[test]
    fn test_cutoff_clamped_below_nyquist() {
        let mut filter = Filter::new(FilterType::LowPass, 8000.0, 1000.0, 1.0);
        filter.set_cutoff(100_000.0);
        assert!(filter.cutoff() < 4000.0);
        filter.set_cutoff(-50.0);
        assert_eq!(filter.cutoff(), 10.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut filter = Filter::new(FilterType::LowPass, 48000.0, 1000.0, 1.0);
        let mut samples = vec![1.0; 64];
        filter.process(&mut samples);
        filter.reset();
        assert_eq!(filter.process_sample(0.0), 0.0);
    }
}
