//! # Persisted Parameter State
//!
//! The host stores and recalls presets as opaque data. The engine's part is
//! the content: a flat map from parameter key to raw value. Loading is
//! forgiving, field by field:
//!
//! | Input                  | Result                 |
//! |------------------------|------------------------|
//! | unknown key            | ignored                |
//! | missing key            | default value          |
//! | NaN / infinite value   | default value (logged) |
//! | finite, out of range   | clamped                |
//!
//! A damaged preset never fails the whole load.

use std::collections::BTreeMap;

use nih_plug::nih_warn;

use crate::shared::ParameterId;

/// The four raw parameter values, already validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistedState {
    values: [f32; 4],
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            values: ParameterId::ALL.map(ParameterId::default_value),
        }
    }
}

impl PersistedState {
    /// Validate a loaded key-value map.
    pub fn from_map(map: &BTreeMap<String, f32>) -> Self {
        let mut state = Self::default();
        for id in ParameterId::ALL {
            let Some(&raw) = map.get(id.key()) else {
                continue;
            };
            match id.sanitize(raw) {
                Some(value) => state.values[id.index()] = value,
                None => nih_warn!(
                    "Persisted value {raw} for '{}' is not a number, using the default",
                    id.key()
                ),
            }
        }
        state
    }

    pub fn to_map(&self) -> BTreeMap<String, f32> {
        ParameterId::ALL
            .into_iter()
            .zip(self.values)
            .map(|(id, value)| (id.key().to_string(), value))
            .collect()
    }

    pub fn get(&self, id: ParameterId) -> f32 {
        self.values[id.index()]
    }

    /// Iterate over `(id, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ParameterId, f32)> + '_ {
        ParameterId::ALL.into_iter().zip(self.values)
    }
}
