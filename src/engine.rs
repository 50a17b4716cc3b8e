//! # The BBD Engine
//!
//! Ties the DSP building blocks together into a bucket-brigade delay/chorus.
//! Each audio channel owns a complete, independent copy of the signal path:
//!
//! ```text
//!                     ┌──────── smoothers (mix, regen, delay, modulate) ────────┐
//!                     │                                                         │
//!  dry ──┬────────────│──────────────────────────────────────── × (1 - f) ──┐  │
//!        │            ▼                                                     │  │
//!        │     LFO ──► read offset                                          │  │
//!        │                 │                                                │  │
//!        │                 ▼                                                │  │
//!        │   ┌──► [bucket chain] ──► expand ──► reconstruction ──┬── × f ──(+)──► out
//!        │   │                                    filter         │
//!        └──(+)◄─────────────────────── × regen ◄────────────────┘
//!            │
//!         compress ──► headroom ──► (into the chain)
//! ```
//!
//! ## Real-time rules
//!
//! Everything that allocates happens in [`BbdEngine::prepare()`]. The
//! per-block [`BbdEngine::process()`] call only reads atomics, does
//! arithmetic, and writes into buffers that already exist. It never logs
//! either: numeric problems are counted and the count is collected later
//! with [`BbdEngine::take_nonfinite_count()`] from a thread that may log.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use nih_plug::nih_log;
use thiserror::Error;

use crate::dsp::compander::CompanderStage;
use crate::dsp::delay_line::DelayLine;
use crate::dsp::filter::{ReconstructionFilter, RECONSTRUCTION_CUTOFF_HZ};
use crate::dsp::lfo::ModulationLfo;
use crate::dsp::mixer::FeedbackMixer;
use crate::dsp::smoother::ParameterSmoother;
use crate::dsp::{bbd_headroom, delay_ms_to_samples};
use crate::shared::{
    ParameterId, ParameterSnapshot, SharedParameters, MAX_DELAY_MS, MIN_DELAY_MS,
};
use crate::state::PersistedState;

/// Chorus LFO rate (Hz).
pub const LFO_RATE_HZ: f32 = 0.8;
/// Peak chorus excursion of the delay time (ms).
pub const LFO_DEPTH_MS: f32 = 1.5;

/// Lowest sample rate `prepare()` accepts.
pub const MIN_SAMPLE_RATE: f64 = 8_000.0;
/// Highest sample rate `prepare()` accepts.
pub const MAX_SAMPLE_RATE: f64 = 768_000.0;

const DELAY_SMOOTHING_MS: f32 = 50.0;
const LEVEL_SMOOTHING_MS: f32 = 20.0;
const MODULATE_SMOOTHING_MS: f32 = 30.0;

/// Why `prepare()` refused a configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PrepareError {
    #[error("sample rate must be finite and in [8000, 768000] Hz, got {0}")]
    InvalidSampleRate(f64),
    #[error("maximum block size must be at least one sample, got {0}")]
    InvalidBlockSize(usize),
}

/// Complete signal path for one channel.
struct ChannelState {
    delay_line: DelayLine,
    compander: CompanderStage,
    filter: ReconstructionFilter,
    lfo: ModulationLfo,

    mix: ParameterSmoother,
    regen: ParameterSmoother,
    delay: ParameterSmoother,
    /// Modulation depth factor in `[0, 1]`, ramped from the on/off switch.
    modulate: ParameterSmoother,
}

impl ChannelState {
    fn new(sample_rate: f32, capacity: NonZeroUsize, snapshot: &ParameterSnapshot) -> Self {
        Self {
            delay_line: DelayLine::new(capacity),
            compander: CompanderStage::new(sample_rate),
            filter: ReconstructionFilter::new(RECONSTRUCTION_CUTOFF_HZ, sample_rate),
            lfo: ModulationLfo::new(sample_rate),
            mix: ParameterSmoother::new(snapshot.mix_db, LEVEL_SMOOTHING_MS, sample_rate),
            regen: ParameterSmoother::new(snapshot.regen_db, LEVEL_SMOOTHING_MS, sample_rate),
            delay: ParameterSmoother::new(snapshot.delay_ms, DELAY_SMOOTHING_MS, sample_rate),
            modulate: ParameterSmoother::new(
                modulation_depth(snapshot),
                MODULATE_SMOOTHING_MS,
                sample_rate,
            ),
        }
    }

    fn set_targets(&mut self, snapshot: &ParameterSnapshot) {
        self.mix.set_target(snapshot.mix_db);
        self.regen.set_target(snapshot.regen_db);
        self.delay.set_target(snapshot.delay_ms);
        self.modulate.set_target(modulation_depth(snapshot));
    }

    /// Run one sample through the channel. `dry` must be finite.
    #[inline]
    fn process_sample(&mut self, dry: f32, sample_rate: f32) -> f32 {
        let mix_db = self.mix.next();
        let regen_db = self.regen.next();
        let delay_ms = self.delay.next();
        let depth = self.modulate.next();

        // The LFO runs even when modulation is off; only its depth goes to
        // zero. Switching back on therefore picks up mid-cycle without a jump.
        let base = delay_ms_to_samples(delay_ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS), sample_rate);
        let excursion = depth * delay_ms_to_samples(LFO_DEPTH_MS, sample_rate);
        let wobble = self.lfo.advance(LFO_RATE_HZ, excursion);
        let read_offset = (base + wobble).clamp(1.0, self.delay_line.capacity() as f32);

        let from_chain = self.delay_line.read_interpolated(read_offset);
        let wet = self.filter.process(self.compander.expand(from_chain));

        let regen_gain = FeedbackMixer::regen_gain(regen_db);
        let into_chain = FeedbackMixer::feedback_input(dry, wet, regen_gain);
        self.delay_line
            .write(bbd_headroom(self.compander.compress(into_chain)));

        FeedbackMixer::output(dry, wet, FeedbackMixer::wet_fraction(mix_db))
    }

    /// Silence the signal path. Smoothers and LFO phase are left alone.
    fn reset(&mut self) {
        self.delay_line.clear();
        self.compander.reset();
        self.filter.reset();
    }

    fn snap_smoothers(&mut self) {
        self.mix.snap_to_target();
        self.regen.snap_to_target();
        self.delay.snap_to_target();
        self.modulate.snap_to_target();
    }
}

fn modulation_depth(snapshot: &ParameterSnapshot) -> f32 {
    if snapshot.modulate {
        1.0
    } else {
        0.0
    }
}

/// Bucket chain length needed for the longest modulated delay.
fn chain_capacity(sample_rate: f32) -> usize {
    // Two spare samples cover rounding in the ms → samples conversion.
    delay_ms_to_samples(MAX_DELAY_MS + LFO_DEPTH_MS, sample_rate).ceil() as usize + 2
}

/// Replace NaN/inf samples with silence, returning how many were replaced.
fn sanitize_in_place(samples: &mut [f32]) -> u64 {
    let mut replaced = 0;
    for sample in samples.iter_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
            replaced += 1;
        }
    }
    replaced
}

/// Everything that only exists once a valid configuration is known.
struct PreparedState {
    sample_rate: f32,
    max_block_size: usize,
    channels: Vec<ChannelState>,
}

/// The bucket-brigade delay/chorus engine.
///
/// Create it with the channel count, call [`prepare()`](Self::prepare) once
/// the sample rate is known, then [`process()`](Self::process) per block.
/// Until the first successful `prepare()` the engine passes audio through
/// untouched (apart from silencing non-finite samples).
pub struct BbdEngine {
    parameters: Arc<SharedParameters>,
    num_channels: usize,
    prepared: Option<PreparedState>,
    /// Non-finite samples replaced since the last
    /// [`take_nonfinite_count()`](Self::take_nonfinite_count).
    nonfinite_count: u64,
}

impl BbdEngine {
    pub fn new(num_channels: usize) -> Self {
        Self::with_parameters(num_channels, Arc::new(SharedParameters::default()))
    }

    /// Create an engine that reads its parameters from an existing store,
    /// so that a rebuilt engine keeps the values set on the old one.
    pub fn with_parameters(num_channels: usize, parameters: Arc<SharedParameters>) -> Self {
        Self {
            parameters,
            num_channels,
            prepared: None,
            nonfinite_count: 0,
        }
    }

    /// Handle for setting parameters from other threads.
    pub fn parameters(&self) -> Arc<SharedParameters> {
        Arc::clone(&self.parameters)
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Sample rate of the current configuration, if any.
    pub fn sample_rate(&self) -> Option<f32> {
        self.prepared.as_ref().map(|p| p.sample_rate)
    }

    pub fn max_block_size(&self) -> Option<usize> {
        self.prepared.as_ref().map(|p| p.max_block_size)
    }

    /// (Re)allocate every channel's signal path for a sample rate.
    ///
    /// On error nothing changes: a previously prepared engine keeps its
    /// old configuration, an unprepared one stays in pass-through.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> Result<(), PrepareError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(PrepareError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            return Err(PrepareError::InvalidBlockSize(max_block_size));
        }

        let sample_rate = sample_rate as f32;
        let capacity = NonZeroUsize::new(chain_capacity(sample_rate))
            .ok_or(PrepareError::InvalidSampleRate(f64::from(sample_rate)))?;

        // Smoothers start out resting on the current targets.
        let snapshot = self.parameters.snapshot();
        let channels = (0..self.num_channels)
            .map(|_| ChannelState::new(sample_rate, capacity, &snapshot))
            .collect();

        self.prepared = Some(PreparedState {
            sample_rate,
            max_block_size,
            channels,
        });

        nih_log!(
            "BBD engine prepared: {} channel(s) at {sample_rate} Hz, {} bucket chain",
            self.num_channels,
            capacity
        );
        Ok(())
    }

    /// Clear all delay lines, envelopes and filters, and snap the
    /// smoothers onto the current parameter values.
    pub fn reset(&mut self) {
        let snapshot = self.parameters.snapshot();
        if let Some(prepared) = self.prepared.as_mut() {
            for channel in &mut prepared.channels {
                channel.reset();
                channel.set_targets(&snapshot);
                channel.snap_smoothers();
            }
        }
    }

    /// Process one block in place. One slice per channel; every slice is
    /// processed up to its own length.
    ///
    /// Channels beyond the prepared channel count pass through.
    pub fn process(&mut self, block: &mut [&mut [f32]]) {
        let Some(prepared) = self.prepared.as_mut() else {
            for samples in block.iter_mut() {
                self.nonfinite_count += sanitize_in_place(samples);
            }
            return;
        };

        let snapshot = self.parameters.snapshot();
        let sample_rate = prepared.sample_rate;

        for (channel_idx, samples) in block.iter_mut().enumerate() {
            let Some(channel) = prepared.channels.get_mut(channel_idx) else {
                self.nonfinite_count += sanitize_in_place(samples);
                continue;
            };

            channel.set_targets(&snapshot);

            for sample in samples.iter_mut() {
                let dry = if sample.is_finite() {
                    *sample
                } else {
                    self.nonfinite_count += 1;
                    0.0
                };

                let output = channel.process_sample(dry, sample_rate);
                *sample = if output.is_finite() {
                    output
                } else {
                    // Whatever produced this is still in the loop; flush it.
                    self.nonfinite_count += 1;
                    channel.reset();
                    0.0
                };
            }
        }
    }

    /// Thread-safe parameter update. Returns `false` if the value was
    /// rejected (NaN or infinite).
    pub fn set_parameter(&self, id: ParameterId, value: f32) -> bool {
        self.parameters.set(id, value)
    }

    /// Current parameter values, keyed for persistence.
    pub fn get_state(&self) -> BTreeMap<String, f32> {
        let mut map = BTreeMap::new();
        for id in ParameterId::ALL {
            map.insert(id.key().to_string(), self.parameters.get(id));
        }
        map
    }

    /// Restore parameter values from persisted data, repairing it per field.
    pub fn set_state(&self, map: &BTreeMap<String, f32>) {
        let state = PersistedState::from_map(map);
        for (id, value) in state.iter() {
            self.parameters.set(id, value);
        }
    }

    /// How many samples of echo tail remain after the input goes silent,
    /// estimated from the current targets.
    ///
    /// Each trip around the loop scales the echo by the regen gain, so
    /// after `N` trips it is at `gain^N`. Reaching -60 dB takes
    /// `N = log10(0.001) / log10(gain)` trips.
    pub fn tail_samples(&self) -> u32 {
        let Some(prepared) = self.prepared.as_ref() else {
            return 0;
        };
        let snapshot = self.parameters.snapshot();

        let longest_ms = snapshot.delay_ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS)
            + if snapshot.modulate { LFO_DEPTH_MS } else { 0.0 };
        let trip = delay_ms_to_samples(longest_ms, prepared.sample_rate);

        let gain = FeedbackMixer::regen_gain(snapshot.regen_db);
        let trips = if gain > 0.001 {
            -3.0 / gain.log10()
        } else {
            1.0
        };

        (trips.max(1.0) * trip).ceil() as u32
    }

    /// Number of non-finite samples replaced since the last call.
    pub fn take_nonfinite_count(&mut self) -> u64 {
        std::mem::take(&mut self.nonfinite_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 44100.0;

    /// Paul Kellett's economy pink noise filter over an xorshift source.
    struct PinkNoise {
        state: u32,
        b: [f32; 3],
    }

    impl PinkNoise {
        fn new(seed: u32) -> Self {
            Self {
                state: seed.max(1),
                b: [0.0; 3],
            }
        }

        fn next(&mut self) -> f32 {
            self.state ^= self.state << 13;
            self.state ^= self.state >> 17;
            self.state ^= self.state << 5;
            let white = (self.state as f32 / u32::MAX as f32) * 2.0 - 1.0;

            self.b[0] = 0.99765 * self.b[0] + white * 0.0990460;
            self.b[1] = 0.96300 * self.b[1] + white * 0.2965164;
            self.b[2] = 0.57000 * self.b[2] + white * 1.0526913;
            (self.b[0] + self.b[1] + self.b[2] + white * 0.1848) * 0.25
        }
    }

    fn prepared_engine(num_channels: usize, settings: &[(ParameterId, f32)]) -> BbdEngine {
        let mut engine = BbdEngine::new(num_channels);
        for &(id, value) in settings {
            assert!(engine.set_parameter(id, value));
        }
        engine.prepare(SAMPLE_RATE, 512).unwrap();
        engine
    }

    fn process_mono(engine: &mut BbdEngine, samples: &mut [f32]) {
        let mut block = [samples];
        engine.process(&mut block);
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_impulse_echo_scenario() {
        let mut engine = prepared_engine(
            2,
            &[
                (ParameterId::Delay, 10.0),
                (ParameterId::Regen, -24.0),
                (ParameterId::Mix, 24.0),
            ],
        );

        let mut left = vec![0.0_f32; 2000];
        let mut right = vec![0.0_f32; 2000];
        left[0] = 1.0;
        {
            let mut block = [left.as_mut_slice(), right.as_mut_slice()];
            engine.process(&mut block);
        }

        // Nothing before the echo arrives.
        let early = left[..440].iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(early < 1e-6, "output before the echo: {early}");

        // The echo peaks right at 10 ms.
        let (peak_idx, peak) = left[430..480]
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |(bi, bv), (i, &v)| {
                if v.abs() > bv {
                    (i + 430, v.abs())
                } else {
                    (bi, bv)
                }
            });
        assert!((441..=443).contains(&peak_idx), "echo peaked at {peak_idx}");
        assert!(peak > 0.1, "echo too quiet: {peak}");

        // Near-zero regen: nothing sustained at the end of the block.
        let late = left[1900..].iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(late < 0.01, "tail still ringing at {late}");

        // The other channel never saw the impulse.
        assert!(right.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_silence_in_silence_out() {
        for modulate in [0.0, 1.0] {
            let mut engine = prepared_engine(
                1,
                &[(ParameterId::Regen, -24.0), (ParameterId::Modulate, modulate)],
            );

            for _ in 0..20 {
                let mut samples = vec![0.0_f32; 512];
                process_mono(&mut engine, &mut samples);
                assert!(samples.iter().all(|&s| s == 0.0));
            }
        }
    }

    #[test]
    fn test_max_regen_stays_bounded() {
        for modulate in [0.0, 1.0] {
            let mut engine = prepared_engine(
                1,
                &[
                    (ParameterId::Regen, 24.0),
                    (ParameterId::Mix, 24.0),
                    (ParameterId::Modulate, modulate),
                ],
            );
            let mut noise = PinkNoise::new(0xBBD0_0001);

            let total = 10 * SAMPLE_RATE as usize;
            let mut output = Vec::with_capacity(total);
            let mut block = vec![0.0_f32; 512];
            while output.len() < total {
                for s in block.iter_mut() {
                    *s = noise.next();
                }
                process_mono(&mut engine, &mut block);
                output.extend_from_slice(&block);
            }

            let peak = output.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
            assert!(peak.is_finite() && peak <= 64.0, "peak {peak}");

            let sr = SAMPLE_RATE as usize;
            let early = rms(&output[4 * sr..6 * sr]);
            let late = rms(&output[8 * sr..10 * sr]);
            assert!(late < early * 2.0, "level kept growing: {early} -> {late}");
        }
    }

    #[test]
    fn test_dry_mix_passes_input() {
        let mut engine = prepared_engine(1, &[(ParameterId::Mix, -24.0)]);
        let input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let mut samples = input.clone();
        process_mono(&mut engine, &mut samples);

        for (a, b) in input.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_parameter_change_is_smoothed() {
        let mut engine = prepared_engine(1, &[(ParameterId::Mix, -24.0)]);
        engine.set_parameter(ParameterId::Mix, 24.0);

        // Constant input, empty delay line: the output is the dry share,
        // falling smoothly from 1 toward 0 as the mix ramps to fully wet.
        let mut samples = vec![0.5_f32; 400];
        process_mono(&mut engine, &mut samples);

        assert!(samples[0] > 0.49, "first sample jumped to {}", samples[0]);
        for pair in samples.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-7);
            assert!((pair[1] - pair[0]).abs() < 0.01);
        }

        // Fully wet by now, so silence in leaves only the decaying echoes
        // of the first block.
        let mut samples = vec![0.0_f32; 4410];
        process_mono(&mut engine, &mut samples);
        let residue = samples[4000..].iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(residue < 0.05, "echoes did not decay: {residue}");
    }

    #[test]
    fn test_non_finite_input_is_silenced_and_counted() {
        let mut engine = prepared_engine(1, &[(ParameterId::Mix, 24.0)]);
        let mut samples = vec![0.1_f32; 256];
        samples[10] = f32::NAN;
        samples[20] = f32::INFINITY;
        samples[30] = f32::NEG_INFINITY;

        process_mono(&mut engine, &mut samples);

        assert!(samples.iter().all(|s| s.is_finite()));
        assert_eq!(engine.take_nonfinite_count(), 3);
        assert_eq!(engine.take_nonfinite_count(), 0);
    }

    #[test]
    fn test_unprepared_engine_passes_through() {
        let mut engine = BbdEngine::new(2);
        let mut left = vec![0.25_f32, -0.5, f32::NAN, 1.0];
        let mut right = vec![0.75_f32; 4];
        {
            let mut block = [left.as_mut_slice(), right.as_mut_slice()];
            engine.process(&mut block);
        }

        assert_eq!(left, vec![0.25, -0.5, 0.0, 1.0]);
        assert_eq!(right, vec![0.75; 4]);
        assert_eq!(engine.take_nonfinite_count(), 1);
        assert_eq!(engine.tail_samples(), 0);
    }

    #[test]
    fn test_extra_channels_pass_through() {
        let mut engine = prepared_engine(1, &[(ParameterId::Mix, 24.0)]);
        let mut first = vec![1.0_f32; 64];
        let mut second = vec![1.0_f32; 64];
        {
            let mut block = [first.as_mut_slice(), second.as_mut_slice()];
            engine.process(&mut block);
        }

        assert!(first.iter().all(|&s| s == 0.0));
        assert!(second.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_invalid_prepare_is_rejected() {
        let mut engine = BbdEngine::new(1);

        assert_eq!(
            engine.prepare(0.0, 512),
            Err(PrepareError::InvalidSampleRate(0.0))
        );
        assert!(matches!(
            engine.prepare(f64::NAN, 512),
            Err(PrepareError::InvalidSampleRate(_))
        ));
        assert_eq!(
            engine.prepare(1e9, 512),
            Err(PrepareError::InvalidSampleRate(1e9))
        );
        assert_eq!(
            engine.prepare(SAMPLE_RATE, 0),
            Err(PrepareError::InvalidBlockSize(0))
        );
        assert_eq!(
            engine.prepare(40.0, 64),
            Err(PrepareError::InvalidSampleRate(40.0))
        );
        assert!(!engine.is_prepared());
    }

    #[test]
    fn test_failed_prepare_keeps_previous_configuration() {
        let mut engine = prepared_engine(1, &[(ParameterId::Mix, 24.0)]);
        assert!(engine.prepare(-48000.0, 256).is_err());
        assert!(engine.prepare(40.0, 64).is_err());
        assert!(engine.prepare(MIN_SAMPLE_RATE - 1.0, 64).is_err());

        assert_eq!(engine.sample_rate(), Some(44100.0));
        assert_eq!(engine.max_block_size(), Some(512));

        // Still running at 44.1 kHz: a 10 ms echo lands at sample 441.
        let mut samples = vec![0.0_f32; 600];
        samples[0] = 1.0;
        process_mono(&mut engine, &mut samples);
        let peak_idx = (0..samples.len())
            .max_by(|&a, &b| samples[a].abs().total_cmp(&samples[b].abs()))
            .unwrap_or(0);
        assert!((441..=443).contains(&peak_idx), "echo peaked at {peak_idx}");
    }

    #[test]
    fn test_lowest_sample_rate_prepares() {
        let mut engine = BbdEngine::new(1);
        engine.prepare(MIN_SAMPLE_RATE, 64).unwrap();

        let mut samples = vec![0.5_f32; 256];
        process_mono(&mut engine, &mut samples);
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_reprepare_changes_sample_rate() {
        let mut engine = prepared_engine(2, &[]);
        engine.prepare(96000.0, 1024).unwrap();

        assert_eq!(engine.sample_rate(), Some(96000.0));
        assert_eq!(engine.max_block_size(), Some(1024));
    }

    #[test]
    fn test_reset_clears_echoes() {
        let mut engine = prepared_engine(1, &[(ParameterId::Mix, 24.0), (ParameterId::Regen, 0.0)]);
        let mut samples = vec![0.8_f32; 1000];
        process_mono(&mut engine, &mut samples);

        engine.reset();

        let mut samples = vec![0.0_f32; 2000];
        process_mono(&mut engine, &mut samples);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_state_round_trip() {
        let engine = BbdEngine::new(2);
        engine.set_parameter(ParameterId::Mix, 3.0);
        engine.set_parameter(ParameterId::Delay, 17.5);
        engine.set_parameter(ParameterId::Modulate, 1.0);

        let saved = engine.get_state();
        assert_eq!(saved.len(), 4);

        let restored = BbdEngine::new(2);
        restored.set_state(&saved);
        assert_eq!(restored.get_state(), saved);
    }

    #[test]
    fn test_set_state_repairs_bad_fields() {
        let engine = BbdEngine::new(1);
        let mut map = BTreeMap::new();
        map.insert("mix".to_string(), f32::NAN);
        map.insert("delay".to_string(), 1000.0);
        map.insert("bogus".to_string(), 1.0);
        engine.set_state(&map);

        let state = engine.get_state();
        assert_eq!(state["mix"], ParameterId::Mix.default_value());
        assert_eq!(state["delay"], MAX_DELAY_MS);
        assert_eq!(state["regen"], ParameterId::Regen.default_value());
        assert!(!state.contains_key("bogus"));
    }

    #[test]
    fn test_tail_grows_with_regen() {
        let engine = prepared_engine(1, &[(ParameterId::Regen, -24.0)]);
        let short = engine.tail_samples();
        engine.set_parameter(ParameterId::Regen, 24.0);
        let long = engine.tail_samples();

        assert!(short >= 441, "tail shorter than one echo: {short}");
        assert!(long > short * 10, "{short} vs {long}");
    }

    #[test]
    fn test_parameters_survive_engine_rebuild() {
        let engine = BbdEngine::new(2);
        let handle = engine.parameters();
        handle.set(ParameterId::Regen, -6.0);

        let rebuilt = BbdEngine::with_parameters(1, handle);
        assert_eq!(rebuilt.get_state()["regen"], -6.0);
    }
}
