//! # Parameter Hand-off Between Threads
//!
//! Parameter changes come from the UI or the host's automation thread, but
//! the engine lives on the audio thread, which must never wait on a lock.
//! The hand-off is a set of atomics: each parameter is an `f32` stored as
//! its bit pattern in an `AtomicU32`. Writers store whenever they like; the
//! engine loads all four once at the start of each block into a
//! [`ParameterSnapshot`] and ramps toward it with its smoothers.
//!
//! Stores are `Relaxed`. Each parameter is independent, and a block that
//! sees a new mix value one block before the matching regen value is
//! inaudible.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::dsp::mixer::{MAX_LEVEL_DB, MIN_LEVEL_DB};

/// Shortest delay the bucket chain is driven to (ms).
pub const MIN_DELAY_MS: f32 = 1.0;
/// Longest delay the bucket chain is driven to (ms).
pub const MAX_DELAY_MS: f32 = 30.0;

/// The four controls of the BBD engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterId {
    /// Dry/wet balance, dB.
    Mix,
    /// Feedback amount, dB.
    Regen,
    /// Delay time, ms.
    Delay,
    /// Chorus modulation on/off (0 or 1).
    Modulate,
}

impl ParameterId {
    pub const ALL: [ParameterId; 4] = [
        ParameterId::Mix,
        ParameterId::Regen,
        ParameterId::Delay,
        ParameterId::Modulate,
    ];

    /// Stable key used for persisted state and host parameter ids.
    /// Never change these once presets exist.
    pub const fn key(self) -> &'static str {
        match self {
            ParameterId::Mix => "mix",
            ParameterId::Regen => "regen",
            ParameterId::Delay => "delay",
            ParameterId::Modulate => "modulate",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key)
    }

    /// Inclusive value range.
    pub const fn range(self) -> (f32, f32) {
        match self {
            ParameterId::Mix | ParameterId::Regen => (MIN_LEVEL_DB, MAX_LEVEL_DB),
            ParameterId::Delay => (MIN_DELAY_MS, MAX_DELAY_MS),
            ParameterId::Modulate => (0.0, 1.0),
        }
    }

    pub const fn default_value(self) -> f32 {
        match self {
            ParameterId::Mix => 0.0,
            ParameterId::Regen => -12.0,
            ParameterId::Delay => 10.0,
            ParameterId::Modulate => 0.0,
        }
    }

    /// Bring a finite value into range. `modulate` snaps to 0 or 1.
    ///
    /// Returns `None` for NaN and infinities; callers decide whether that
    /// means "ignore" or "use the default".
    pub fn sanitize(self, value: f32) -> Option<f32> {
        if !value.is_finite() {
            return None;
        }
        let (min, max) = self.range();
        Some(match self {
            ParameterId::Modulate => {
                if value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            _ => value.clamp(min, max),
        })
    }

    /// Position in [`ParameterId::ALL`].
    pub(crate) const fn index(self) -> usize {
        match self {
            ParameterId::Mix => 0,
            ParameterId::Regen => 1,
            ParameterId::Delay => 2,
            ParameterId::Modulate => 3,
        }
    }
}

/// Parameter values as seen at the start of one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub mix_db: f32,
    pub regen_db: f32,
    pub delay_ms: f32,
    pub modulate: bool,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            mix_db: ParameterId::Mix.default_value(),
            regen_db: ParameterId::Regen.default_value(),
            delay_ms: ParameterId::Delay.default_value(),
            modulate: ParameterId::Modulate.default_value() >= 0.5,
        }
    }
}

/// Lock-free parameter store shared between control threads and the
/// audio thread.
pub struct SharedParameters {
    values: [AtomicU32; 4],
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self {
            values: ParameterId::ALL.map(|id| AtomicU32::new(id.default_value().to_bits())),
        }
    }
}

impl SharedParameters {
    /// Store a new target value. Non-finite values are dropped; finite
    /// values are clamped into the parameter's range. Returns whether the
    /// value was accepted.
    pub fn set(&self, id: ParameterId, value: f32) -> bool {
        match id.sanitize(value) {
            Some(value) => {
                self.values[id.index()].store(value.to_bits(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ParameterId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            mix_db: self.get(ParameterId::Mix),
            regen_db: self.get(ParameterId::Regen),
            delay_ms: self.get(ParameterId::Delay),
            modulate: self.get(ParameterId::Modulate) >= 0.5,
        }
    }
}
