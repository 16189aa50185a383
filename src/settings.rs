use std::collections::HashMap;

use serde_json::Value;

use crate::objects::SettingDef;
use crate::surface::SURFACE_TOLERANCE;

/// Default nudge distance applied after a surface crossing.
pub const NUDGE: f64 = 1e-8;

/// Problem settings staged as key/value definitions.
///
/// Unknown keys are kept verbatim so collaborating modules can define their
/// own; the typed getters below fall back to documented defaults.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    values: HashMap<String, Value>,
}

impl Settings {
    pub fn from_definitions(definitions: &[SettingDef]) -> Self {
        let mut values = HashMap::new();
        for def in definitions {
            // Last definition of a key wins, matching input file order.
            values.insert(def.key.clone(), def.value.clone());
        }
        Settings { values }
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.values
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.values
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.get_u64(key, default as u64) as usize
    }

    /// Tolerance below which a particle counts as sitting on a surface.
    pub fn surface_tolerance(&self) -> f64 {
        self.get_f64("surface_tolerance", SURFACE_TOLERANCE)
    }

    /// Post-crossing nudge distance.
    pub fn nudge(&self) -> f64 {
        self.get_f64("nudge", NUDGE)
    }

    /// Global RNG seed; per-history streams derive from it.
    pub fn seed(&self) -> u64 {
        self.get_u64("seed", 1)
    }

    pub fn particles(&self) -> usize {
        self.get_usize("particles", 1000)
    }

    pub fn batches(&self) -> usize {
        self.get_usize("batches", 1)
    }

    /// Histories are terminated below this energy (eV).
    pub fn energy_cutoff(&self) -> f64 {
        self.get_f64("energy_cutoff", 0.0)
    }

    /// Guard against histories that never terminate.
    pub fn max_steps(&self) -> usize {
        self.get_usize("max_steps", 100_000)
    }
}
