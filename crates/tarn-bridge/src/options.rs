//! Compiler options crossing the boundary as encoded bytes
//!
//! The host assembles an option map and ships it to the compiler runtime
//! inside `InitializeCompiler`; the compiler runtime fetches the host's
//! defaults back through `GetInitialOptions`. Either way the map crosses
//! as `WireValue::Bytes`, serde_json-encoded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fault::{BridgeResult, RuntimeFault};

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean flag
    Bool(bool),
    /// Integer option
    I64(i64),
    /// Floating-point option
    F64(f64),
    /// String option
    Str(String),
}

/// Ordered option map, encodable for the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerOptionsMap(BTreeMap<String, OptionValue>);

impl CompilerOptionsMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: OptionValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Read an option.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Read a boolean option.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(OptionValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Read an integer option.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(OptionValue::I64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Read a string option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(OptionValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Fill in any key absent here from `defaults`, keeping local values.
    pub fn merge_defaults(&mut self, defaults: &CompilerOptionsMap) {
        for (key, value) in &defaults.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode for the boundary.
    pub fn encode(&self) -> BridgeResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            RuntimeFault::Wrapped {
                message: format!("options encode failed: {e}"),
                source: Box::new(e),
            }
            .into()
        })
    }

    /// Decode from boundary bytes.
    pub fn decode(bytes: &[u8]) -> BridgeResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            RuntimeFault::Wrapped {
                message: format!("options decode failed: {e}"),
                source: Box::new(e),
            }
            .into()
        })
    }
}

impl FromIterator<(String, OptionValue)> for CompilerOptionsMap {
    fn from_iter<T: IntoIterator<Item = (String, OptionValue)>>(iter: T) -> Self {
        CompilerOptionsMap(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_bytes() {
        let mut options = CompilerOptionsMap::new();
        options
            .set("tier.codegen", OptionValue::Bool(true))
            .set("inline.budget", OptionValue::I64(250))
            .set("config", OptionValue::Str("balanced".into()));

        let bytes = options.encode().unwrap();
        let decoded = CompilerOptionsMap::decode(&bytes).unwrap();
        assert_eq!(decoded, options);
        assert_eq!(decoded.get_bool("tier.codegen"), Some(true));
        assert_eq!(decoded.get_i64("inline.budget"), Some(250));
        assert_eq!(decoded.get_str("config"), Some("balanced"));
    }

    #[test]
    fn test_typed_getters_reject_wrong_type() {
        let mut options = CompilerOptionsMap::new();
        options.set("flag", OptionValue::Bool(false));
        assert_eq!(options.get_i64("flag"), None);
        assert_eq!(options.get_bool("flag"), Some(false));
    }

    #[test]
    fn test_decode_garbage_faults() {
        assert!(CompilerOptionsMap::decode(b"not json").is_err());
    }

    #[test]
    fn test_merge_keeps_local_values() {
        let mut local = CompilerOptionsMap::new();
        local.set("a", OptionValue::I64(1));

        let mut defaults = CompilerOptionsMap::new();
        defaults
            .set("a", OptionValue::I64(99))
            .set("b", OptionValue::Bool(true));

        local.merge_defaults(&defaults);
        assert_eq!(local.get_i64("a"), Some(1));
        assert_eq!(local.get_bool("b"), Some(true));
    }
}
