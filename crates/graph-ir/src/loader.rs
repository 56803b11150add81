// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph loading from a JSON manifest plus an optional SafeTensors file.
//!
//! Constants named in the manifest without inline `data` are read from the
//! manifest's `weights_file`. Only the requested tensors are copied out of
//! the memory-mapped file.

use crate::graph::{Loaded, Validated};
use crate::{GraphError, GraphManifest, KernelGraph};
use std::path::Path;
use tensor_core::DType;

/// Loads graphs from disk into a validated [`KernelGraph`].
///
/// # Example
/// ```no_run
/// use graph_ir::GraphLoader;
/// use std::path::Path;
///
/// let graph = GraphLoader::load(Path::new("./graphs/call.json")).unwrap();
/// println!("{} nodes", graph.num_nodes());
/// ```
pub struct GraphLoader;

impl GraphLoader {
    /// Loads and validates the graph described by the manifest at `path`.
    ///
    /// Steps:
    /// 1. Parse the manifest and resolve names.
    /// 2. Fill constant data from the weight file, if one is named.
    /// 3. Validate the graph.
    pub fn load(path: &Path) -> Result<KernelGraph<Validated>, GraphError> {
        let manifest = GraphManifest::from_file(path)?;
        let weights_file = manifest.weights_file.clone();
        let mut graph = manifest.into_graph()?;

        if let Some(file) = weights_file {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            Self::fill_weights(&mut graph, &base.join(file))?;
        }

        let graph = graph.validate()?;
        tracing::info!("{}", graph.summary());
        Ok(graph)
    }

    /// Parses and validates a manifest held in memory. Constants must be
    /// inline.
    pub fn from_json(json: &str) -> Result<KernelGraph<Validated>, GraphError> {
        GraphManifest::from_json(json)?.into_graph()?.validate()
    }

    /// Copies constant data for every empty constant from `weights_path`.
    pub fn fill_weights(
        graph: &mut KernelGraph<Loaded>,
        weights_path: &Path,
    ) -> Result<(), GraphError> {
        let file = std::fs::File::open(weights_path).map_err(|e| {
            GraphError::SafeTensorsError(format!(
                "cannot open '{}': {e}",
                weights_path.display()
            ))
        })?;

        // Safety: the map is read-only and dropped before this function returns.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| GraphError::SafeTensorsError(format!("mmap failed: {e}")))?;

        let tensors = safetensors::SafeTensors::deserialize(&mmap).map_err(|e| {
            GraphError::SafeTensorsError(format!("SafeTensors parse error: {e}"))
        })?;

        let mut filled = 0usize;
        for def in graph.tensors.iter_mut().filter(|d| d.is_const() && d.data.is_none()) {
            let view = tensors
                .tensor(&def.name)
                .map_err(|_| GraphError::WeightNotFound {
                    name: def.name.clone(),
                })?;
            let dtype = convert_safetensor_dtype(view.dtype())?;
            if dtype != def.dtype {
                return Err(GraphError::InvalidTensor {
                    tensor: def.name.clone(),
                    detail: format!("declared {}, weight file holds {dtype}", def.dtype),
                });
            }
            def.data = Some(view.data().to_vec());
            filled += 1;
        }

        tracing::debug!(
            "filled {filled} constants from '{}'",
            weights_path.display()
        );
        Ok(())
    }
}

/// Converts a SafeTensors `Dtype` to our [`DType`].
fn convert_safetensor_dtype(st_dtype: safetensors::Dtype) -> Result<DType, GraphError> {
    match st_dtype {
        safetensors::Dtype::F32 => Ok(DType::F32),
        safetensors::Dtype::F16 => Ok(DType::F16),
        safetensors::Dtype::I32 => Ok(DType::I32),
        safetensors::Dtype::I64 => Ok(DType::I64),
        safetensors::Dtype::I8 => Ok(DType::I8),
        safetensors::Dtype::U8 => Ok(DType::U8),
        safetensors::Dtype::BOOL => Ok(DType::Bool),
        other => Err(GraphError::SafeTensorsError(format!(
            "unsupported SafeTensors dtype: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetensors::tensor::TensorView;
    use std::io::Write;

    const WEIGHTED: &str = r#"{
        "name": "weighted-add",
        "weights_file": "weights.safetensors",
        "tensors": [
            { "name": "x", "dtype": "f32", "shape": [2], "category": "graph_input" },
            { "name": "w", "dtype": "f32", "shape": [2], "category": "const" },
            { "name": "y", "dtype": "f32", "shape": [2], "category": "graph_output" }
        ],
        "subgraphs": [
            { "name": "main", "inputs": ["x"], "outputs": ["y"], "nodes": [
                { "name": "add", "op": "add", "inputs": ["x", "w"], "outputs": ["y"] }
            ] }
        ]
    }"#;

    fn write_dir(weights: &[(&str, safetensors::Dtype, Vec<u8>)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let views: Vec<(String, TensorView<'_>)> = weights
            .iter()
            .map(|(name, dtype, bytes)| {
                let n = bytes.len() / 4;
                (name.to_string(), TensorView::new(*dtype, vec![n], bytes).unwrap())
            })
            .collect();
        let blob = safetensors::serialize(views, &None).unwrap();
        std::fs::write(dir.path().join("weights.safetensors"), blob).unwrap();
        let mut f = std::fs::File::create(dir.path().join("graph.json")).unwrap();
        f.write_all(WEIGHTED.as_bytes()).unwrap();
        dir
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_load_with_weights() {
        let dir = write_dir(&[("w", safetensors::Dtype::F32, f32_bytes(&[0.5, 1.5]))]);
        let graph = GraphLoader::load(&dir.path().join("graph.json")).unwrap();
        let w = graph.tensor(graph.tensor_id("w").unwrap()).unwrap();
        assert_eq!(w.data.as_deref(), Some(&f32_bytes(&[0.5, 1.5])[..]));
    }

    #[test]
    fn test_missing_weight() {
        let dir = write_dir(&[("other", safetensors::Dtype::F32, f32_bytes(&[0.0, 0.0]))]);
        let result = GraphLoader::load(&dir.path().join("graph.json"));
        assert!(matches!(result, Err(GraphError::WeightNotFound { .. })));
    }

    #[test]
    fn test_weight_dtype_mismatch() {
        let bytes: Vec<u8> = [1i32, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
        let dir = write_dir(&[("w", safetensors::Dtype::I32, bytes)]);
        let result = GraphLoader::load(&dir.path().join("graph.json"));
        assert!(matches!(result, Err(GraphError::InvalidTensor { .. })));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let result = GraphLoader::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(GraphError::ManifestReadError(_))));
    }

    #[test]
    fn test_from_json_requires_inline_constants() {
        // Without the weight file the constant stays empty and validation fails.
        let result = GraphLoader::from_json(WEIGHTED);
        assert!(matches!(result, Err(GraphError::InvalidTensor { .. })));
    }
}
