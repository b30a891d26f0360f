//! Keras model to Rust layer-configuration compiler.
//!
//! Walks a Keras architecture, derives the fixed shape of every supported
//! layer, loads its raw weights and emits a Rust module holding one
//! [`Conv1dConfig`](crate::kernels::conv1d::Conv1dConfig) implementation per
//! Conv1D layer together with the weight and bias arrays.
mod generate;

use crate::config::{Conv1dParams, IoType, Padding, Precision, ToolConfig};
use crate::model::{read_layer_array, KerasLayer, KerasModel, ModelError, WeightStats};
use serde_json::Value;
use std::path::Path;

/// Layer classes the compiler understands.
pub const SUPPORTED_LAYERS: &[&str] = &["InputLayer", "Dropout", "Flatten", "Dense", "Conv1D"];
/// Layer classes that only affect shape bookkeeping.
pub const SKIP_LAYERS: &[&str] = &["InputLayer", "Dropout", "Flatten"];

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Dense { n_in: usize, n_out: usize },
    Conv1D { params: Conv1dParams, padding: Padding },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    /// 1-based position among the emitted layers.
    pub index: usize,
    pub name: String,
    pub class_name: String,
    pub activation: Option<String>,
    pub kind: LayerKind,
}

impl LayerInfo {
    pub fn weight_shape(&self) -> Vec<usize> {
        match &self.kind {
            LayerKind::Dense { n_in, n_out } => vec![*n_in, *n_out],
            LayerKind::Conv1D { params, .. } => params.weight_shape().to_vec(),
        }
    }

    pub fn bias_shape(&self) -> Vec<usize> {
        match &self.kind {
            LayerKind::Dense { n_out, .. } => vec![*n_out],
            LayerKind::Conv1D { params, .. } => vec![params.n_filt],
        }
    }

    /// Output shape without the batch dimension.
    pub fn output_shape(&self) -> Vec<usize> {
        match &self.kind {
            LayerKind::Dense { n_out, .. } => vec![*n_out],
            LayerKind::Conv1D { params, .. } => params.output_shape().to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledLayer {
    pub info: LayerInfo,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
    pub weight_stats: WeightStats,
    pub bias_stats: WeightStats,
}

impl CompiledLayer {
    pub fn new(info: LayerInfo, weights: Vec<f32>, biases: Vec<f32>) -> Result<Self, ModelError> {
        for (what, data, shape) in [
            ("kernel", &weights, info.weight_shape()),
            ("bias", &biases, info.bias_shape()),
        ] {
            let expected: usize = shape.iter().product();
            if data.len() != expected {
                return Err(ModelError::WeightLength {
                    name: format!("{}/{}", info.name, what),
                    expected,
                    actual: data.len(),
                });
            }
        }
        let weight_stats = WeightStats::compute(&weights, &info.weight_shape());
        let bias_stats = WeightStats::compute(&biases, &info.bias_shape());
        Ok(Self {
            info,
            weights,
            biases,
            weight_stats,
            bias_stats,
        })
    }

    pub fn weights_n_zeros(&self) -> usize {
        self.weight_stats.n_zeros
    }
}

#[derive(Debug)]
pub struct CompilationResult {
    pub code: String,
    pub layers: Vec<CompiledLayer>,
}

pub struct Compiler {
    pub(crate) model_name: String,
    pub(crate) reuse_factor: usize,
    pub(crate) io_type: IoType,
    pub(crate) precision: Precision,
    pub(crate) store_weights_in_bram: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            model_name: "Model".to_string(),
            reuse_factor: 1,
            io_type: IoType::Parallel,
            precision: Precision::F32,
            store_weights_in_bram: false,
        }
    }
    /// Compiler settings taken from a project file.
    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new()
            .with_name(&config.project_name)
            .with_reuse_factor(config.reuse_factor)
            .with_io_type(config.io_type)
            .with_precision(config.default_precision)
            .with_weights_in_bram(config.store_weights_in_bram)
    }
    pub fn with_name(mut self, name: &str) -> Self {
        self.model_name = name.to_string();
        self
    }
    pub fn with_reuse_factor(mut self, reuse_factor: usize) -> Self {
        self.reuse_factor = reuse_factor;
        self
    }
    pub fn with_io_type(mut self, io_type: IoType) -> Self {
        self.io_type = io_type;
        self
    }
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
    pub fn with_weights_in_bram(mut self, enabled: bool) -> Self {
        self.store_weights_in_bram = enabled;
        self
    }

    /// Derives the shape of every non-skipped layer.
    pub fn import(&self, model: &KerasModel) -> Result<Vec<LayerInfo>, ModelError> {
        let layers = model.layers()?;
        let mut current = None;
        for layer in &layers {
            if !SUPPORTED_LAYERS.contains(&layer.class_name.as_str()) {
                return Err(ModelError::UnsupportedLayer(layer.class_name.clone()));
            }
            if let Some(shape) = input_shape(layer) {
                current = Some(shape);
            }
        }
        let mut current = current.ok_or(ModelError::MissingInputShape)?;
        log::info!("Input shape: {}", format_shape(&current));

        let mut infos = Vec::new();
        for layer in &layers {
            if layer.class_name == "Flatten" {
                let flat = current
                    .get(1..)
                    .unwrap_or(&[])
                    .iter()
                    .try_fold(1usize, |acc, d| d.map(|d| acc * d));
                current = vec![current.first().copied().flatten(), flat];
            }
            if SKIP_LAYERS.contains(&layer.class_name.as_str()) {
                log::debug!("Skipping {} layer", layer.class_name);
                continue;
            }
            let name = layer
                .name()
                .ok_or_else(|| invalid(&layer.class_name, "name"))?
                .to_string();
            let batch = current.first().copied().flatten();
            let kind = match layer.class_name.as_str() {
                "Dense" => {
                    let n_in = dim(&current, current.len().saturating_sub(1), &name)?;
                    let n_out = usize_field(layer, "units", &name)?;
                    current = vec![batch, Some(n_out)];
                    LayerKind::Dense { n_in, n_out }
                }
                "Conv1D" => {
                    let y_in = dim(&current, 1, &name)?;
                    let n_chan = dim(&current, 2, &name)?;
                    let y_filt = usize_field(layer, "kernel_size", &name)?;
                    let n_filt = usize_field(layer, "filters", &name)?;
                    let stride = match layer.config.get("strides") {
                        Some(_) => usize_field(layer, "strides", &name)?,
                        None => 1,
                    };
                    let padding: Padding = layer
                        .config
                        .get("padding")
                        .and_then(Value::as_str)
                        .unwrap_or("valid")
                        .parse()?;
                    let mut params =
                        Conv1dParams::from_padding(padding, y_in, n_chan, y_filt, n_filt, stride)?
                            .with_reuse_factor(self.reuse_factor);
                    params.store_weights_in_bram = self.store_weights_in_bram;
                    params.validate()?;
                    current = vec![batch, Some(params.y_out), Some(params.n_filt)];
                    LayerKind::Conv1D { params, padding }
                }
                other => return Err(ModelError::UnsupportedLayer(other.to_string())),
            };
            let info = LayerInfo {
                index: infos.len() + 1,
                name,
                class_name: layer.class_name.clone(),
                activation: layer
                    .config
                    .get("activation")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                kind,
            };
            log::info!(
                "Layer name: {}, layer type: {}, current shape: {}",
                info.name,
                info.class_name,
                format_shape(&current)
            );
            infos.push(info);
        }
        Ok(infos)
    }

    /// Loads the kernel and bias of every layer from `source`: a Keras `.h5`
    /// file or a directory of `<name>_kernel.bin` / `<name>_bias.bin`.
    pub fn load_weights(
        &self,
        layers: Vec<LayerInfo>,
        source: &Path,
    ) -> Result<Vec<CompiledLayer>, ModelError> {
        layers
            .into_iter()
            .map(|info| {
                let n_weights: usize = info.weight_shape().iter().product();
                let n_biases: usize = info.bias_shape().iter().product();
                let weights = read_layer_array(source, &info.name, "kernel", n_weights)?;
                let biases = read_layer_array(source, &info.name, "bias", n_biases)?;
                let layer = CompiledLayer::new(info, weights, biases)?;
                log::info!(
                    "Layer {}: {} weights, number of zeros: {}",
                    layer.info.name,
                    layer.weights.len(),
                    layer.weights_n_zeros()
                );
                if layer.weights_n_zeros() == layer.weights.len() {
                    log::warn!("Layer {}: all weights are zero", layer.info.name);
                }
                Ok(layer)
            })
            .collect()
    }

    pub fn generate(&self, layers: &[CompiledLayer]) -> Result<String, ModelError> {
        let mut code = Vec::new();
        generate::generate_module(&mut code, self, layers)?;
        String::from_utf8(code).map_err(|e| {
            ModelError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    pub fn compile(
        &self,
        model: &KerasModel,
        weights_dir: &Path,
    ) -> Result<CompilationResult, ModelError> {
        let infos = self.import(model)?;
        let layers = self.load_weights(infos, weights_dir)?;
        let code = self.generate(&layers)?;
        Ok(CompilationResult { code, layers })
    }
}

fn invalid(layer: &str, field: &'static str) -> ModelError {
    ModelError::InvalidField {
        layer: layer.to_string(),
        field,
    }
}

/// `batch_input_shape` (or `batch_shape`), with `null` as `None`.
fn input_shape(layer: &KerasLayer) -> Option<Vec<Option<usize>>> {
    let shape = layer
        .config
        .get("batch_input_shape")
        .or_else(|| layer.config.get("batch_shape"))?
        .as_array()?;
    Some(
        shape
            .iter()
            .map(|d| d.as_u64().map(|d| d as usize))
            .collect(),
    )
}

fn dim(shape: &[Option<usize>], axis: usize, layer: &str) -> Result<usize, ModelError> {
    shape
        .get(axis)
        .copied()
        .flatten()
        .ok_or_else(|| invalid(layer, "input shape"))
}

/// Integer field, taking the first element of list-valued fields such as
/// `kernel_size: [3]`.
fn usize_field(layer: &KerasLayer, field: &'static str, name: &str) -> Result<usize, ModelError> {
    let value = layer.config.get(field).ok_or_else(|| invalid(name, field))?;
    let value = match value.as_array() {
        Some(list) => list.first().ok_or_else(|| invalid(name, field))?,
        None => value,
    };
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| invalid(name, field))
}

fn format_shape(shape: &[Option<usize>]) -> String {
    let dims: Vec<String> = shape
        .iter()
        .map(|d| d.map_or("None".to_string(), |d| d.to_string()))
        .collect();
    format!("[{}]", dims.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{
        "class_name": "Sequential",
        "config": [
            {"class_name": "Conv1D", "config": {
                "name": "conv1d_1", "batch_input_shape": [null, 100, 7],
                "filters": 8, "kernel_size": [4], "strides": [1],
                "padding": "same", "activation": "relu"}},
            {"class_name": "Dropout", "config": {"name": "dropout_1", "rate": 0.2}},
            {"class_name": "Conv1D", "config": {
                "name": "conv1d_2", "filters": 4, "kernel_size": [3],
                "strides": [2], "padding": "valid", "activation": "relu"}},
            {"class_name": "Flatten", "config": {"name": "flatten_1"}},
            {"class_name": "Dense", "config": {"name": "dense_1", "units": 5, "activation": "softmax"}}
        ]
    }"#;

    #[test]
    fn test_import_shapes() {
        let model = KerasModel::from_json(MODEL).unwrap();
        let layers = Compiler::new().with_reuse_factor(4).import(&model).unwrap();
        assert_eq!(layers.len(), 3);

        let LayerKind::Conv1D { params, padding } = &layers[0].kind else {
            panic!("expected Conv1D");
        };
        assert_eq!(*padding, Padding::Same);
        assert_eq!((params.y_in, params.n_chan, params.y_filt, params.n_filt), (100, 7, 4, 8));
        assert_eq!((params.pad_left, params.pad_right, params.y_out), (1, 2, 100));
        assert_eq!(params.reuse_factor, 4);
        assert_eq!(layers[0].activation.as_deref(), Some("relu"));

        let LayerKind::Conv1D { params, .. } = &layers[1].kind else {
            panic!("expected Conv1D");
        };
        assert_eq!(layers[1].index, 2);
        assert_eq!((params.y_in, params.n_chan, params.stride), (100, 8, 2));
        assert_eq!(params.y_out, 49);

        assert_eq!(layers[2].kind, LayerKind::Dense { n_in: 49 * 4, n_out: 5 });
        assert_eq!(layers[2].output_shape(), vec![5]);
    }

    #[test]
    fn test_unsupported_layer() {
        let json = r#"{"class_name": "Sequential", "config": [
            {"class_name": "LSTM", "config": {"name": "lstm", "batch_input_shape": [null, 4, 2]}}
        ]}"#;
        let model = KerasModel::from_json(json).unwrap();
        let err = Compiler::new().import(&model).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedLayer(name) if name == "LSTM"));
    }

    #[test]
    fn test_missing_input_shape() {
        let json = r#"{"class_name": "Sequential", "config": [
            {"class_name": "Dense", "config": {"name": "d", "units": 3}}
        ]}"#;
        let model = KerasModel::from_json(json).unwrap();
        assert!(matches!(
            Compiler::new().import(&model),
            Err(ModelError::MissingInputShape)
        ));
    }

    #[test]
    fn test_compiled_layer_length_check() {
        let info = LayerInfo {
            index: 1,
            name: "dense".to_string(),
            class_name: "Dense".to_string(),
            activation: None,
            kind: LayerKind::Dense { n_in: 2, n_out: 3 },
        };
        let err = CompiledLayer::new(info, vec![0.0; 5], vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, ModelError::WeightLength { expected: 6, actual: 5, .. }));
    }
}
