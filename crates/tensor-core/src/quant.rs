// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Quantisation bookkeeping.

/// Per-channel (or per-tensor) quantisation parameters.
///
/// The scheduler does not interpret these; it carries them through copies
/// and casts so kernels can.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuantParam {
    pub scale: f64,
    pub zero_point: i32,
    #[serde(default = "default_bit_num")]
    pub bit_num: u8,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
}

fn default_bit_num() -> u8 {
    8
}

impl QuantParam {
    pub fn new(scale: f64, zero_point: i32) -> Self {
        Self {
            scale,
            zero_point,
            bit_num: default_bit_num(),
            min: 0.0,
            max: 0.0,
        }
    }

    /// Maps a quantised integer back to a real value.
    pub fn dequantize(&self, q: i64) -> f64 {
        (q - i64::from(self.zero_point)) as f64 * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dequantize() {
        let q = QuantParam::new(0.5, 10);
        assert_eq!(q.dequantize(14), 2.0);
        assert_eq!(q.bit_num, 8);
    }

    #[test]
    fn test_defaults_from_json() {
        let q: QuantParam = serde_json::from_str(r#"{"scale": 0.1, "zero_point": -3}"#).unwrap();
        assert_eq!(q.bit_num, 8);
        assert_eq!(q.zero_point, -3);
    }
}
