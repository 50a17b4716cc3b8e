//! # Parameter Smoothing
//!
//! Parameter values arrive once per block, but the engine consumes them once
//! per sample. Jumping straight to a new value makes an audible click (or,
//! for delay time, a pitch glitch), so every control passes through a
//! one-pole smoother:
//!
//! ```text
//! current = target + (current - target) * c
//! ```
//!
//! Every step closes the same fraction of the remaining gap, so the value
//! moves monotonically toward the target and never overshoots. `c` is
//! chosen so that after five time constants only 0.1% of the original jump
//! is left:
//!
//! ```text
//! c = 0.001 ^ (1 / (5 * tau * sample_rate))
//! ```

/// Residual fraction of a jump left after five time constants.
const SETTLE_RESIDUAL: f32 = 0.001;

/// Distance at which the smoother snaps onto its target.
const SNAP_EPSILON: f32 = 1e-6;

/// One-pole smoother for a single control value.
pub struct ParameterSmoother {
    current: f32,
    target: f32,
    coefficient: f32,
}

impl ParameterSmoother {
    /// Create a smoother resting at `initial`.
    pub fn new(initial: f32, tau_ms: f32, sample_rate: f32) -> Self {
        let settle_samples = (5.0 * tau_ms * 0.001 * sample_rate).max(1.0);
        Self {
            current: initial,
            target: initial,
            coefficient: SETTLE_RESIDUAL.powf(1.0 / settle_samples),
        }
    }

    pub fn set_target(&mut self, value: f32) {
        self.target = value;
    }

    /// Advance one sample and return the new value. Call exactly once per
    /// sample.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let distance = self.current - self.target;
        if distance.abs() <= SNAP_EPSILON * self.target.abs().max(1.0) {
            self.current = self.target;
        } else {
            // Rounding must not push the value back past where it was, or
            // past the target.
            let next = (self.target + distance * self.coefficient)
                .clamp(self.current.min(self.target), self.current.max(self.target));
            // Close to the target the step rounds away to nothing and the
            // value would stall a few ulps short.
            self.current = if next == self.current {
                self.target
            } else {
                next
            };
        }
        self.current
    }

    /// Jump straight to the target.
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }
}
