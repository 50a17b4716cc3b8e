//! # DSP Building Blocks
//!
//! The pieces the BBD engine is assembled from:
//!
//! - **`delay_line`**: the bucket chain, a ring buffer with fractional reads.
//! - **`compander`**: 2:1 compressor before the chain, mirrored expander after.
//! - **`filter`**: the reconstruction lowpass that follows the chain.
//! - **`lfo`**: the sine oscillator that wobbles the delay time for chorus.
//! - **`smoother`**: per-sample ramps for the control values.
//! - **`mixer`**: regeneration gain and the dry/wet crossfade.
//!
//! Small shared helpers live here.

pub mod compander;
pub mod delay_line;
pub mod filter;
pub mod lfo;
pub mod mixer;
pub mod smoother;

/// Linear level where the BBD headroom stage starts to bend.
pub const HEADROOM_KNEE: f32 = 4.0;
/// Largest magnitude the bucket chain can hold.
pub const HEADROOM_RAIL: f32 = 8.0;

/// Convert a delay in milliseconds to (fractional) samples.
#[inline]
pub fn delay_ms_to_samples(delay_ms: f32, sample_rate: f32) -> f32 {
    delay_ms * sample_rate / 1000.0
}

/// `10^(dB/20)`.
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Replace denormal-range values with zero.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 {
        0.0
    } else {
        x
    }
}

/// Soft-knee limit modeling the BBD's voltage swing.
///
/// Linear up to [`HEADROOM_KNEE`], then bends smoothly (continuous value
/// and slope) toward [`HEADROOM_RAIL`], which it never exceeds.
#[inline]
pub fn bbd_headroom(x: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude <= HEADROOM_KNEE {
        return x;
    }
    let span = HEADROOM_RAIL - HEADROOM_KNEE;
    let bent = HEADROOM_KNEE + span * ((magnitude - HEADROOM_KNEE) / span).tanh();
    bent.copysign(x)
}
