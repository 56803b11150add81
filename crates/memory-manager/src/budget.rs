// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocator capacity: the hard ceiling a [`MemoryPool`](crate::MemoryPool)
//! enforces on live tensor buffers.

use crate::MemoryError;
use std::fmt;
use std::str::FromStr;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// Recognised suffixes, longest first so `"MB"` wins over `"B"`.
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// Capacity of an allocator in bytes.
///
/// Parses human-readable strings (`"64M"`, `"1G"`, `"512KB"`, `"4096"`),
/// case-insensitively, so it can be written directly in a TOML config.
///
/// ```
/// use memory_manager::MemoryBudget;
///
/// let b: MemoryBudget = "64M".parse().unwrap();
/// assert_eq!(b.as_mb(), 64);
/// assert!(b.fits(0, 1024));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    /// A budget of exactly `bytes`.
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// A budget of `kb` kibibytes.
    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KIB }
    }

    /// A budget of `mb` mebibytes.
    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    /// A budget of `gb` gibibytes.
    pub fn from_gb(gb: usize) -> Self {
        Self { bytes: gb * GIB }
    }

    /// Returns the budget in bytes.
    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the budget in whole mebibytes.
    pub fn as_mb(&self) -> usize {
        self.bytes / MIB
    }

    /// Returns `true` when `requested` more bytes fit on top of `in_use`.
    pub fn fits(&self, in_use: usize, requested: usize) -> bool {
        in_use
            .checked_add(requested)
            .map_or(false, |total| total <= self.bytes)
    }

    /// Parses a budget string such as `"64M"` or `"1048576"`.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        let (digits, multiplier) = SUFFIXES
            .iter()
            .find_map(|&(suffix, mult)| {
                upper
                    .strip_suffix(suffix)
                    .map(|rest| (rest.trim().to_string(), mult))
            })
            .unwrap_or((upper.clone(), 1));

        let value: usize = digits.parse().map_err(|_| MemoryError::InvalidBudget {
            input: s.to_string(),
            reason: "expected a number with an optional K/M/G suffix".into(),
        })?;

        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| MemoryError::InvalidBudget {
                input: s.to_string(),
                reason: "value overflows usize".into(),
            })?;

        if bytes == 0 {
            return Err(MemoryError::InvalidBudget {
                input: s.to_string(),
                reason: "budget must be non-zero".into(),
            });
        }
        Ok(Self { bytes })
    }
}

impl FromStr for MemoryBudget {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes {
            b if b >= GIB && b % GIB == 0 => write!(f, "{} GB", b / GIB),
            b if b >= MIB && b % MIB == 0 => write!(f, "{} MB", b / MIB),
            b if b >= KIB && b % KIB == 0 => write!(f, "{} KB", b / KIB),
            b => write!(f, "{b} B"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(MemoryBudget::from_kb(4).as_bytes(), 4096);
        assert_eq!(MemoryBudget::from_mb(3).as_mb(), 3);
        assert_eq!(MemoryBudget::from_gb(1).as_mb(), 1024);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(MemoryBudget::parse("64M").unwrap().as_mb(), 64);
        assert_eq!(MemoryBudget::parse("64mb").unwrap().as_mb(), 64);
        assert_eq!(MemoryBudget::parse("2G").unwrap().as_mb(), 2048);
        assert_eq!(MemoryBudget::parse("8KB").unwrap().as_bytes(), 8192);
        assert_eq!(MemoryBudget::parse("100B").unwrap().as_bytes(), 100);
        assert_eq!(MemoryBudget::parse(" 4096 ").unwrap().as_bytes(), 4096);
    }

    #[test]
    fn test_from_str() {
        let b: MemoryBudget = "16K".parse().unwrap();
        assert_eq!(b, MemoryBudget::from_kb(16));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "M", "abc", "0", "0M", "-5M"] {
            assert!(
                matches!(MemoryBudget::parse(bad), Err(MemoryError::InvalidBudget { .. })),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn test_fits() {
        let b = MemoryBudget::from_bytes(100);
        assert!(b.fits(60, 40));
        assert!(!b.fits(60, 41));
        assert!(!b.fits(usize::MAX, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryBudget::from_gb(1).to_string(), "1 GB");
        assert_eq!(MemoryBudget::from_mb(64).to_string(), "64 MB");
        assert_eq!(MemoryBudget::from_bytes(3072).to_string(), "3 KB");
        assert_eq!(MemoryBudget::from_bytes(10).to_string(), "10 B");
    }

    #[test]
    fn test_serde_roundtrip() {
        let b = MemoryBudget::from_mb(8);
        let json = serde_json::to_string(&b).unwrap();
        let back: MemoryBudget = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
