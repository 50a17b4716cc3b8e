//! # Plugin Parameters
//!
//! The knobs the DAW shows for the BBD delay. Each parameter has:
//!
//! - A **unique string ID** (`#[id = "..."]`) that the host uses to save and
//!   recall presets. These are the same keys the engine uses for its
//!   persisted state, so never change them once presets exist.
//! - A **human-readable name** shown in the DAW's UI.
//! - A **range** and a **default value**, both taken from
//!   [`ParameterId`] so the host and the engine can't disagree.
//!
//! ## No host-side smoothing
//!
//! nih-plug can smooth parameters itself, but the engine already ramps
//! every control per sample and per channel. The plugin hands the raw
//! values over once per block with [`BbdParams::publish()`].

use nih_plug::prelude::*;

use crate::shared::{ParameterId, SharedParameters};

/// All user-facing parameters of the BBD Delay plugin.
#[derive(Params)]
pub struct BbdParams {
    /// **Mix**: -24 dB is fully dry, 0 dB an even blend, +24 dB fully wet.
    #[id = "mix"]
    pub mix: FloatParam,

    /// **Regen**: how much of the echo goes back into the bucket chain.
    /// The loop gain tops out at 0.98 however far the knob is turned.
    #[id = "regen"]
    pub regen: FloatParam,

    /// **Delay**: bucket chain delay time, 1-30 ms. Short settings give
    /// chorus and flange, the long end slapback doubling.
    #[id = "delay"]
    pub delay: FloatParam,

    /// **Modulate**: chorus wobble on the delay time.
    #[id = "modulate"]
    pub modulate: BoolParam,
}

fn level_param(name: &str, id: ParameterId) -> FloatParam {
    let (min, max) = id.range();
    FloatParam::new(name, id.default_value(), FloatRange::Linear { min, max })
        .with_unit(" dB")
        .with_step_size(0.1)
        .with_value_to_string(formatters::v2s_f32_rounded(1))
}

impl Default for BbdParams {
    fn default() -> Self {
        let (delay_min, delay_max) = ParameterId::Delay.range();

        Self {
            mix: level_param("Mix", ParameterId::Mix),
            regen: level_param("Regen", ParameterId::Regen),

            delay: FloatParam::new(
                "Delay",
                ParameterId::Delay.default_value(),
                FloatRange::Skewed {
                    min: delay_min,
                    max: delay_max,
                    // More knob travel for the short chorus/flange times.
                    factor: FloatRange::skew_factor(-1.0),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.01)
            .with_value_to_string(formatters::v2s_f32_rounded(2)),

            modulate: BoolParam::new("Modulate", ParameterId::Modulate.default_value() >= 0.5),
        }
    }
}

impl BbdParams {
    /// Copy the host's current values into the engine's parameter store.
    pub fn publish(&self, shared: &SharedParameters) {
        shared.set(ParameterId::Mix, self.mix.value());
        shared.set(ParameterId::Regen, self.regen.value());
        shared.set(ParameterId::Delay, self.delay.value());
        shared.set(
            ParameterId::Modulate,
            if self.modulate.value() { 1.0 } else { 0.0 },
        );
    }
}
