//! # Reconstruction Filter
//!
//! A BBD is a sampled system: its output is a staircase that changes once
//! per clock tick. Every BBD circuit follows the chip with a lowpass that
//! smooths the staircase and removes the clock whine, and that filter is a
//! big part of why analog chorus and delay sound "dark". Because it sits
//! inside the feedback loop, each trip around the loop loses a little more
//! top end.
//!
//! The model is two identical one-pole sections in series (12 dB/octave):
//!
//! ```text
//! s1[n] = s1[n-1] + (1 - a) * (x[n]  - s1[n-1])
//! y[n]  = s2[n]   = s2[n-1] + (1 - a) * (s1[n] - s2[n-1])
//!
//! a = e^(-2π * cutoff / sample_rate)
//! ```
//!
//! Each section is a convex blend of its input and its previous output, so
//! the filter can never produce a value larger than the largest value it
//! was fed. The engine relies on that to keep the feedback loop bounded.

use std::f32::consts::PI;

use super::flush_denormal;

/// Cutoff of the reconstruction filter (Hz). Roughly where MN3207-based
/// chorus pedals start rolling off.
pub const RECONSTRUCTION_CUTOFF_HZ: f32 = 9000.0;

/// Two-pole lowpass applied to the signal coming out of the bucket chain.
pub struct ReconstructionFilter {
    /// Blend toward the previous output; shared by both sections.
    coefficient: f32,
    stage1: f32,
    stage2: f32,
}

impl ReconstructionFilter {
    /// Create a filter with the given cutoff. The cutoff is kept between
    /// 20 Hz and 45% of the sample rate, where the coefficient is stable.
    /// At sample rates too low for both, the Nyquist limit wins.
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let cutoff = cutoff_hz.max(20.0).min(sample_rate * 0.45);
        Self {
            coefficient: (-2.0 * PI * cutoff / sample_rate).exp(),
            stage1: 0.0,
            stage2: 0.0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let g = 1.0 - self.coefficient;
        self.stage1 = flush_denormal(self.stage1 + g * (input - self.stage1));
        self.stage2 = flush_denormal(self.stage2 + g * (self.stage1 - self.stage2));
        self.stage2
    }

    pub fn reset(&mut self) {
        self.stage1 = 0.0;
        self.stage2 = 0.0;
    }
}
