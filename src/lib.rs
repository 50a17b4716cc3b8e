//! # BBD Delay: A Bucket-Brigade Delay/Chorus Plugin (VST3/CLAP)
//!
//! A digital model of an analog bucket-brigade delay, built with
//! [nih-plug](https://github.com/robbert-vdh/nih-plug). The sound comes from
//! the same parts a real BBD pedal has: a compander around a short delay
//! line, a reconstruction lowpass after it, a feedback ("regen") path, and
//! an LFO that wobbles the delay time for chorus.
//!
//! ## Layout
//!
//! - [`engine::BbdEngine`]: the complete signal path, usable without any
//!   plugin host.
//! - [`dsp`]: the building blocks the engine is made of.
//! - [`shared`]: lock-free parameter hand-off from control threads.
//! - [`state`]: validation of persisted parameter values.
//! - `params` and the `BbdDelay` plugin below: the thin nih-plug shell
//!   that connects the engine to a DAW.
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──┬──────────────────────────────────────────── × (1 - mix) ───┐
//!         │                                                            │
//!         │    ┌──────────────────────────────────────────────────┐    │
//!         │    │                  REGEN LOOP                      │    │
//!         │    │                                                  │    │
//!         └──►(+)──► compress ──► [Bucket Chain] ──► expand ──► [Lowpass]
//!              ▲                   ▲                               │    │
//!              │                LFO (modulate)                     │    │
//!              │                                                   ▼    │
//!              └─────────────────────── × regen ◄──────────── wet ─┤    │
//!                                                                  │    │
//!                                                                  └── × mix ──►(+)──► Output
//! ```

pub mod dsp;
pub mod engine;
mod params;
pub mod shared;
pub mod state;

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use nih_plug::prelude::*;
use nih_plug::wrapper::state::{ParamValue, PluginState};

use engine::BbdEngine;
use params::BbdParams;
use shared::{ParameterId, SharedParameters};
use state::PersistedState;

/// The plugin: host-facing parameters plus the engine that does the work.
///
/// `params` is shared with the host (any thread may read it). The engine
/// is owned by the audio thread. The two only meet through `shared`, the
/// atomic parameter store, which `process()` refreshes once per block.
struct BbdDelay {
    params: Arc<BbdParams>,
    shared: Arc<SharedParameters>,
    engine: BbdEngine,
}

impl Default for BbdDelay {
    fn default() -> Self {
        let shared = Arc::new(SharedParameters::default());
        Self {
            params: Arc::new(BbdParams::default()),
            // Stereo placeholder; rebuilt in initialize() once the host has
            // picked a layout.
            engine: BbdEngine::with_parameters(2, Arc::clone(&shared)),
            shared,
        }
    }
}

impl Plugin for BbdDelay {
    const NAME: &'static str = "BBD Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first, since most DAW tracks are stereo; mono as a fallback.
    // Every channel gets its own bucket chain.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // The engine reads parameters once per block and smooths per sample, so
    // splitting blocks at automation points buys nothing.
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Route loaded presets through the engine's validation so that a
    /// damaged or hand-edited preset is repaired field by field instead of
    /// being rejected or loaded with NaNs.
    fn filter_state(state: &mut PluginState) {
        let mut raw = BTreeMap::new();
        for (key, value) in &state.params {
            let value = match value {
                ParamValue::F32(v) => *v,
                ParamValue::Bool(b) => {
                    if *b {
                        1.0
                    } else {
                        0.0
                    }
                }
                _ => continue,
            };
            raw.insert(key.clone(), value);
        }

        for (id, value) in PersistedState::from_map(&raw).iter() {
            let value = match id {
                ParameterId::Modulate => ParamValue::Bool(value >= 0.5),
                _ => ParamValue::F32(value),
            };
            state.params.insert(id.key().to_string(), value);
        }
    }

    /// Allocate the engine for the host's channel count and sample rate.
    /// Returning `false` tells the host this configuration can't be used.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_input_channels
            .map(|c| c.get() as usize)
            .unwrap_or(2);

        // prepare() snaps the smoothers onto whatever is in the store, so
        // fill it with the host's values first.
        self.params.publish(&self.shared);

        let mut engine = BbdEngine::with_parameters(num_channels, Arc::clone(&self.shared));
        match engine.prepare(
            f64::from(buffer_config.sample_rate),
            buffer_config.max_buffer_size as usize,
        ) {
            Ok(()) => {
                self.engine = engine;
                true
            }
            Err(err) => {
                nih_error!("Cannot initialize BBD Delay: {err}");
                false
            }
        }
    }

    /// Playback stopped or the plugin was bypassed: drop any echoes still
    /// in the bucket chains.
    fn reset(&mut self) {
        self.params.publish(&self.shared);
        self.engine.reset();
    }

    /// Off the audio thread again, so this is where numeric trouble from
    /// `process()` gets reported.
    fn deactivate(&mut self) {
        let replaced = self.engine.take_nonfinite_count();
        if replaced > 0 {
            nih_warn!("Replaced {replaced} non-finite sample(s) with silence");
        }
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.params.publish(&self.shared);
        self.engine.process(buffer.as_slice());

        // Keep the host calling process() after the input stops until the
        // regen loop has died away.
        ProcessStatus::Tail(self.engine.tail_samples())
    }
}

impl ClapPlugin for BbdDelay {
    const CLAP_ID: &'static str = "com.loveless-audio.bbd-delay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A bucket-brigade delay and chorus with companding and regen");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
        ClapFeature::Chorus,
    ];
}

impl Vst3Plugin for BbdDelay {
    // 16 ASCII bytes; must never collide with another VST3 class ID.
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssBbdDelay001";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Delay,
        Vst3SubCategory::Modulation,
    ];
}

nih_export_clap!(BbdDelay);
nih_export_vst3!(BbdDelay);
