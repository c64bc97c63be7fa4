//! Linear gain stage

use super::Effect;

/// Multiplies its input by a single factor
pub struct Gain {
    value: f32,
}

impl Gain {
    pub fn new(value: f32) -> Self {
        Self {
            value: Self::sanitize(value),
        }
    }

    pub fn set(&mut self, value: f32) {
        self.value = Self::sanitize(value);
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    fn sanitize(value: f32) -> f32 {
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

impl Effect for Gain {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample *= self.value;
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "Gain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_scales_samples() {
        let mut gain = Gain::new(0.5);
        let mut samples = [1.0, -0.5, 0.25];
        gain.process(&mut samples);
        assert_eq!(samples, [0.5, -0.25, 0.125]);
    }

    #[test]
    fn test_non_finite_gain_is_silent() {
        let mut gain = Gain::new(1.0);
        gain.set(f32::NAN);
        assert_eq!(gain.value(), 0.0);
    }
}
