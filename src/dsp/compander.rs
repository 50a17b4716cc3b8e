//! # Compander (Compress on the Way In, Expand on the Way Out)
//!
//! A bucket-brigade chip has a poor signal-to-noise ratio: quiet passages
//! sink into the chip's hiss and loud ones clip. Classic BBD pedals wrap the
//! chip in an NE570/NE571 compander. The compressor halves the signal's
//! dynamic range (in dB) before the chip, the expander doubles it again
//! afterwards.
//!
//! ## 2:1 companding
//!
//! With an envelope `env` tracking the signal level, the compressor's gain
//! is `1 / sqrt(env)`, so a signal at level `L` leaves the compressor at
//! level `sqrt(L)`:
//!
//! ```text
//! y = x / sqrt(env_x)
//! ```
//!
//! ## Mirrored expansion
//!
//! The NE571 expander's rectifier watches the *reconstructed* signal, not
//! the compressed one. Written as a per-sample update:
//!
//! ```text
//! env' = c * env + (1 - c) * |x|        x = y * sqrt(env')
//! ```
//!
//! Substituting `s = sqrt(env')` gives a quadratic with one positive root:
//!
//! ```text
//! s² - (1 - c)·|y|·s - c·env = 0
//! s  = ((1 - c)·|y| + sqrt(((1 - c)·|y|)² + 4·c·env)) / 2
//! ```
//!
//! Solving it exactly means the expander's envelope follows the same
//! trajectory as the compressor's did, just later. With no noise in
//! between, `expand(compress(x))` returns `x` up to rounding.

use super::flush_denormal;

/// Envelope attack time (ms).
const ATTACK_MS: f32 = 1.0;
/// Envelope release time (ms).
const RELEASE_MS: f32 = 10.0;
/// Lowest envelope the gain computation will use. Caps the compressor's
/// gain at 40 dB so silence after a loud passage doesn't explode.
const ENV_FLOOR: f32 = 1e-4;

/// Per-sample smoothing coefficient for a given time constant.
fn time_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (time_ms * 0.001 * sample_rate)).exp()
}

/// Compressor/expander pair for one channel's BBD path.
pub struct CompanderStage {
    attack_coeff: f32,
    release_coeff: f32,
    /// Level of the signal entering the compressor.
    compress_env: f32,
    /// Level of the signal leaving the expander.
    expand_env: f32,
}

impl CompanderStage {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            attack_coeff: time_coeff(ATTACK_MS, sample_rate),
            release_coeff: time_coeff(RELEASE_MS, sample_rate),
            compress_env: 0.0,
            expand_env: 0.0,
        }
    }

    fn coeff(&self, rising: bool) -> f32 {
        if rising {
            self.attack_coeff
        } else {
            self.release_coeff
        }
    }

    /// Squeeze one sample into the BBD's reduced dynamic range.
    pub fn compress(&mut self, input: f32) -> f32 {
        let input = flush_denormal(input);
        let level = input.abs();
        let c = self.coeff(level > self.compress_env);

        self.compress_env = flush_denormal(c * self.compress_env + (1.0 - c) * level);
        flush_denormal(input / self.compress_env.max(ENV_FLOOR).sqrt())
    }

    /// Restore the dynamic range of one sample read back from the BBD.
    pub fn expand(&mut self, input: f32) -> f32 {
        let input = flush_denormal(input);
        let level = input.abs();
        let env = self.expand_env;

        // Which coefficient the compressor used depends on whether the
        // original level rose above the envelope. For the positive root
        // that happens exactly when |y|·sqrt(env) > env, with env == 0
        // counting as rising for any non-zero input.
        let rising = level > 0.0 && level * env.sqrt() >= env;
        let c = self.coeff(rising);
        let b = (1.0 - c) * level;
        let s = 0.5 * (b + (b * b + 4.0 * c * env).sqrt());

        let output = if s * s >= ENV_FLOOR {
            self.expand_env = s * s;
            input * s
        } else {
            // Below the floor the compressor used a fixed gain, so the
            // reconstructed level is known directly.
            let output = input * ENV_FLOOR.sqrt();
            let c = self.coeff(output.abs() > env);
            self.expand_env = c * env + (1.0 - c) * output.abs();
            output
        };
        self.expand_env = flush_denormal(self.expand_env);

        flush_denormal(output)
    }

    /// Current compressor-side envelope.
    pub fn compress_envelope(&self) -> f32 {
        self.compress_env
    }

    /// Current expander-side envelope.
    pub fn expand_envelope(&self) -> f32 {
        self.expand_env
    }

    pub fn reset(&mut self) {
        self.compress_env = 0.0;
        self.expand_env = 0.0;
    }
}
