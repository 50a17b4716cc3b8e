//! # Feedback Mixer
//!
//! Two gain decisions shape a BBD delay's sound:
//!
//! - **Regeneration** decides how much of the delayed signal is sent back
//!   into the bucket chain. Each trip around the loop multiplies the echo by
//!   the regen gain, so the repeats decay geometrically. The knob is in dB
//!   but the loop gain is capped at 0.98: at 1.0 the echoes would never die
//!   away, above it they would grow until they clip.
//!
//! - **Mix** crossfades between the dry input and the wet delayed signal.
//!   The dB knob maps linearly onto the crossfade: -24 dB is fully dry,
//!   0 dB is an even blend, +24 dB is fully wet.
//!
//! ```text
//!   dry ──┬─────────────────────────── × (1 - f) ──┐
//!         │                                         │
//!         └─►(+)──► compress ──► bucket chain       (+)──► out
//!             ▲                       │              │
//!             │                   expand, filter     │
//!             │                       │              │
//!             └──── × regen_gain ◄── wet ── × f ─────┘
//! ```

use super::db_to_gain;

/// Lowest and highest values of the mix and regen knobs (dB).
pub const MIN_LEVEL_DB: f32 = -24.0;
pub const MAX_LEVEL_DB: f32 = 24.0;

/// Largest loop gain the feedback path may use.
pub const MAX_REGEN_GAIN: f32 = 0.98;

/// Stateless gain staging for the feedback loop and the output crossfade.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedbackMixer;

impl FeedbackMixer {
    /// Linear feedback gain for a regen setting, capped for stability.
    pub fn regen_gain(regen_db: f32) -> f32 {
        if regen_db.is_nan() {
            return 0.0;
        }
        db_to_gain(regen_db.clamp(MIN_LEVEL_DB, MAX_LEVEL_DB)).min(MAX_REGEN_GAIN)
    }

    /// Share of the output taken from the wet signal, in `[0, 1]`.
    pub fn wet_fraction(mix_db: f32) -> f32 {
        if mix_db.is_nan() {
            return 0.0;
        }
        (mix_db.clamp(MIN_LEVEL_DB, MAX_LEVEL_DB) - MIN_LEVEL_DB) / (MAX_LEVEL_DB - MIN_LEVEL_DB)
    }

    /// Signal entering the bucket chain: the input plus the regenerated echo.
    #[inline]
    pub fn feedback_input(dry: f32, wet: f32, regen_gain: f32) -> f32 {
        dry + wet * regen_gain
    }

    /// Output crossfade between dry and wet.
    #[inline]
    pub fn output(dry: f32, wet: f32, wet_fraction: f32) -> f32 {
        dry * (1.0 - wet_fraction) + wet * wet_fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regen_gain_is_capped() {
        assert_eq!(FeedbackMixer::regen_gain(24.0), MAX_REGEN_GAIN);
        assert_eq!(FeedbackMixer::regen_gain(0.0), MAX_REGEN_GAIN);
        assert_eq!(FeedbackMixer::regen_gain(1000.0), MAX_REGEN_GAIN);
        assert_eq!(FeedbackMixer::regen_gain(f32::INFINITY), MAX_REGEN_GAIN);
        assert_eq!(FeedbackMixer::regen_gain(f32::NAN), 0.0);
    }

    #[test]
    fn test_regen_gain_follows_db() {
        let g = FeedbackMixer::regen_gain(-6.0);
        assert!((g - 0.501).abs() < 1e-3, "-6 dB gave {g}");

        let g = FeedbackMixer::regen_gain(-24.0);
        assert!((g - 0.0631).abs() < 1e-3, "-24 dB gave {g}");

        // Below the knob range the gain stops falling.
        assert_eq!(FeedbackMixer::regen_gain(-60.0), FeedbackMixer::regen_gain(-24.0));
    }

    #[test]
    fn test_wet_fraction_endpoints() {
        assert_eq!(FeedbackMixer::wet_fraction(-24.0), 0.0);
        assert_eq!(FeedbackMixer::wet_fraction(0.0), 0.5);
        assert_eq!(FeedbackMixer::wet_fraction(24.0), 1.0);
        assert_eq!(FeedbackMixer::wet_fraction(99.0), 1.0);
        assert_eq!(FeedbackMixer::wet_fraction(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_output_crossfade() {
        assert_eq!(FeedbackMixer::output(0.3, 0.9, 0.0), 0.3);
        assert_eq!(FeedbackMixer::output(0.3, 0.9, 1.0), 0.9);
        assert!((FeedbackMixer::output(1.0, 0.0, 0.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_feedback_input() {
        assert!((FeedbackMixer::feedback_input(0.5, 1.0, 0.5) - 1.0).abs() < 1e-6);
        assert_eq!(FeedbackMixer::feedback_input(0.0, 0.0, MAX_REGEN_GAIN), 0.0);
    }
}
