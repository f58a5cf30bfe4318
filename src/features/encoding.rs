//! Integer encoding for categorical identifiers
//!
//! Encoders are fit once on training data and reused unchanged at
//! evaluation and inference time. Unseen categories map to a reserved
//! unknown code instead of failing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Code reserved for categories never seen during fitting
pub const UNKNOWN_CODE: usize = 0;

/// Maps categorical string values to small integer codes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoder {
    /// Known categories start at code 1; 0 is the unknown code
    codes: BTreeMap<String, usize>,
}

impl CategoryEncoder {
    /// Fit an encoder over the given values. Codes are assigned in sorted
    /// order so fitting is independent of input order.
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut unique: Vec<&str> = values.into_iter().collect();
        unique.sort_unstable();
        unique.dedup();

        let codes = unique
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v.to_string(), i + 1))
            .collect();

        CategoryEncoder { codes }
    }

    /// Encode a value, mapping unseen categories to [`UNKNOWN_CODE`]
    pub fn encode(&self, value: &str) -> usize {
        self.codes.get(value).copied().unwrap_or(UNKNOWN_CODE)
    }

    /// Whether the value was seen during fitting
    pub fn is_known(&self, value: &str) -> bool {
        self.codes.contains_key(value)
    }

    /// Number of known categories (excluding the unknown code)
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_encode() {
        let enc = CategoryEncoder::fit(["VER", "HAM", "NOR", "HAM"]);
        assert_eq!(enc.len(), 3);
        // Sorted assignment: HAM < NOR < VER
        assert_eq!(enc.encode("HAM"), 1);
        assert_eq!(enc.encode("NOR"), 2);
        assert_eq!(enc.encode("VER"), 3);
    }

    #[test]
    fn test_unknown_maps_to_reserved_code() {
        let enc = CategoryEncoder::fit(["VER", "HAM"]);
        assert_eq!(enc.encode("PIA"), UNKNOWN_CODE);
        assert!(!enc.is_known("PIA"));
        assert!(enc.is_known("VER"));
    }

    #[test]
    fn test_fit_order_independent() {
        let a = CategoryEncoder::fit(["VER", "HAM", "NOR"]);
        let b = CategoryEncoder::fit(["NOR", "VER", "HAM"]);
        for code in ["VER", "HAM", "NOR"] {
            assert_eq!(a.encode(code), b.encode(code));
        }
    }
}
