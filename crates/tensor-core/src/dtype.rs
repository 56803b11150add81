// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

use std::fmt;

/// Enumerates the element types a [`crate::Tensor`] can hold.
///
/// The runtime uses `DType` to size buffers and to decide whether data
/// moving between two actors must be cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit signed integer (quantised data).
    I8,
    /// 8-bit unsigned integer.
    U8,
    /// One byte per element, zero is false.
    Bool,
}

impl DType {
    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F16 => 2,
            DType::I64 => 8,
            DType::I8 | DType::U8 | DType::Bool => 1,
        }
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::I8 => "i8",
            DType::U8 => "u8",
            DType::Bool => "bool",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F16)
    }

    /// Decodes the little-endian element at the start of `bytes` as `f64`.
    pub fn read_f64(self, bytes: &[u8]) -> f64 {
        match self {
            DType::F32 => f32::read_le(bytes).to_f64(),
            DType::F16 => half::f16::read_le(bytes).to_f64(),
            DType::I32 => i32::read_le(bytes).to_f64(),
            DType::I64 => i64::read_le(bytes).to_f64(),
            DType::I8 => i8::read_le(bytes).to_f64(),
            DType::U8 => u8::read_le(bytes).to_f64(),
            DType::Bool => bool::read_le(bytes).to_f64(),
        }
    }

    /// Encodes `value` as this dtype into the start of `out`.
    pub fn write_f64(self, value: f64, out: &mut [u8]) {
        match self {
            DType::F32 => f32::from_f64(value).write_le(out),
            DType::F16 => half::f16::from_f64(value).write_le(out),
            DType::I32 => i32::from_f64(value).write_le(out),
            DType::I64 => i64::from_f64(value).write_le(out),
            DType::I8 => i8::from_f64(value).write_le(out),
            DType::U8 => u8::from_f64(value).write_le(out),
            DType::Bool => bool::from_f64(value).write_le(out),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Element ────────────────────────────────────────────────────────────────

/// Rust types that can be stored in a tensor.
///
/// Values are read and written as little-endian bytes, so typed access works
/// on any buffer regardless of its alignment.
pub trait Element: Copy + Send + Sync + 'static + fmt::Debug {
    /// The corresponding [`DType`] variant.
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    /// Converts from `f64`, saturating for integer types.
    fn from_f64(v: f64) -> Self;

    fn read_le(bytes: &[u8]) -> Self;

    fn write_le(self, out: &mut [u8]);
}

macro_rules! numeric_element {
    ($ty:ty, $dtype:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                <$ty>::from_le_bytes(raw)
            }

            fn write_le(self, out: &mut [u8]) {
                out[..std::mem::size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
            }
        }
    };
}

numeric_element!(f32, F32);
numeric_element!(i32, I32);
numeric_element!(i64, I64);
numeric_element!(i8, I8);
numeric_element!(u8, U8);

impl Element for half::f16 {
    const DTYPE: DType = DType::F16;

    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }

    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }

    fn read_le(bytes: &[u8]) -> Self {
        half::f16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn write_le(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_le_bytes());
    }
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(v: f64) -> Self {
        v != 0.0
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }
}
