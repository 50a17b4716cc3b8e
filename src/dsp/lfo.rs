//! # Modulation LFO
//!
//! The "chorus" in a BBD chorus comes from wobbling the clock rate, which
//! moves the delay time back and forth a millisecond or so. Here the wobble
//! is a sine LFO added to the read position of the delay line.
//!
//! The phase is a number in `[0, 1)` that grows by `rate / sample_rate`
//! every sample and wraps at 1.0. It is stored as `f64` and folded back into
//! range on every step with `rem_euclid`, so even after hours of running the
//! phase carries no more than rounding error.

use std::f64::consts::TAU;

/// Sine LFO that produces a delay offset in samples.
pub struct ModulationLfo {
    phase: f64,
    sample_rate: f64,
}

impl ModulationLfo {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            sample_rate: f64::from(sample_rate),
        }
    }

    /// Current phase in `[0, 1)`.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Return `depth * sin(2π·phase)` and step the phase forward by one
    /// sample at `rate_hz`.
    ///
    /// Negative or non-finite rates hold the phase where it is.
    #[inline]
    pub fn advance(&mut self, rate_hz: f32, depth_samples: f32) -> f32 {
        let output = depth_samples * (TAU * self.phase).sin() as f32;

        let increment = if rate_hz.is_finite() && rate_hz > 0.0 {
            f64::from(rate_hz) / self.sample_rate
        } else {
            0.0
        };
        self.phase = (self.phase + increment).rem_euclid(1.0);
        if self.phase >= 1.0 {
            self.phase = 0.0;
        }

        output
    }
}
