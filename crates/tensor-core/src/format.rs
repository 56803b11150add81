// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory layout tags.

use std::fmt;

/// Memory layout of a tensor's data.
///
/// Only rank-4 tensors carry a meaningful layout; for other ranks the tag is
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    #[default]
    Nhwc,
    Nchw,
    /// Kernel weights: out-channels, in-channels, height, width.
    Kchw,
    /// Rank-2 batch × channels.
    Nc,
}

impl Format {
    /// Permutation taking a rank-4 `self` layout to `to`, if supported.
    ///
    /// The result is used as `out_dim[i] = in_dim[perm[i]]`.
    pub fn permutation_to(self, to: Format) -> Option<[usize; 4]> {
        match (self, to) {
            (a, b) if a == b => Some([0, 1, 2, 3]),
            (Format::Nhwc, Format::Nchw) => Some([0, 3, 1, 2]),
            (Format::Nchw, Format::Nhwc) => Some([0, 2, 3, 1]),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Nhwc => "NHWC",
            Format::Nchw => "NCHW",
            Format::Kchw => "KCHW",
            Format::Nc => "NC",
        })
    }
}
