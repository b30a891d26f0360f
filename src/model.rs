//! Keras model architecture (JSON) and raw weight files.
use crate::config::ConfigError;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("JSON decode error")]
    Decode(#[from] serde_json::Error),
    #[error("Unsupported model class: {0}")]
    UnsupportedModel(String),
    #[error("Unsupported layer type: {0}")]
    UnsupportedLayer(String),
    #[error("Missing input shape")]
    MissingInputShape,
    #[error("Layer {layer}: missing or invalid field `{field}`")]
    InvalidField { layer: String, field: &'static str },
    #[error("{name}: expected {expected} values, found {actual}")]
    WeightLength {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid layer configuration")]
    Config(#[from] ConfigError),
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error")]
    Hdf5(#[from] hdf5::Error),
    #[error("{0}: reading .h5 weights needs the `hdf5` feature")]
    Hdf5Unavailable(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct KerasLayer {
    pub class_name: String,
    #[serde(default)]
    pub config: Value,
}

impl KerasLayer {
    pub fn name(&self) -> Option<&str> {
        self.config.get("name").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KerasModel {
    pub class_name: String,
    pub config: Value,
}

impl KerasModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let mut file = File::open(path)?;
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;
        Self::from_json(&buffer)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Layer list of a `Sequential` or functional `Model` architecture.
    pub fn layers(&self) -> Result<Vec<KerasLayer>, ModelError> {
        let list = match self.class_name.as_str() {
            // Older Sequential exports store the list directly.
            "Sequential" if self.config.is_array() => &self.config,
            "Sequential" | "Model" | "Functional" => self
                .config
                .get("layers")
                .ok_or_else(|| ModelError::UnsupportedModel(self.class_name.clone()))?,
            other => return Err(ModelError::UnsupportedModel(other.to_string())),
        };
        Ok(Vec::<KerasLayer>::deserialize(list)?)
    }
}

/// Reads `count` little-endian `f32` values from a raw weight file.
pub fn read_floats<P: AsRef<Path>>(path: P, count: usize) -> Result<Vec<f32>, ModelError> {
    let path = path.as_ref();
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    if buf.len() != count * 4 {
        return Err(ModelError::WeightLength {
            name: path.display().to_string(),
            expected: count,
            actual: buf.len() / 4,
        });
    }
    Ok(buf
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Reads array `array` (`kernel` or `bias`) of `layer` from `source`, which
/// is either a Keras `.h5` weight file or a directory of raw
/// `<layer>_<array>.bin` files.
pub fn read_layer_array(
    source: &Path,
    layer: &str,
    array: &str,
    count: usize,
) -> Result<Vec<f32>, ModelError> {
    if is_h5(source) {
        return read_h5_array(source, layer, array, count);
    }
    read_floats(source.join(format!("{}_{}.bin", layer, array)), count)
}

fn is_h5(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "h5" || e == "hdf5")
}

/// Reads dataset `/<layer>/<layer>/<array>:0` of a Keras weight file.
#[cfg(feature = "hdf5")]
pub fn read_h5_array(
    path: &Path,
    layer: &str,
    array: &str,
    count: usize,
) -> Result<Vec<f32>, ModelError> {
    let file = hdf5::File::open(path)?;
    let name = format!("/{0}/{0}/{1}:0", layer, array);
    let data = file.dataset(&name)?.read_raw::<f32>()?;
    if data.len() != count {
        return Err(ModelError::WeightLength {
            name,
            expected: count,
            actual: data.len(),
        });
    }
    Ok(data)
}

#[cfg(not(feature = "hdf5"))]
pub fn read_h5_array(
    path: &Path,
    _layer: &str,
    _array: &str,
    _count: usize,
) -> Result<Vec<f32>, ModelError> {
    Err(ModelError::Hdf5Unavailable(path.display().to_string()))
}

/// Summary written next to every exported array.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightStats {
    pub shape: Vec<usize>,
    pub min: f32,
    pub max: f32,
    pub n_zeros: usize,
}

impl WeightStats {
    pub fn compute(data: &[f32], shape: &[usize]) -> Self {
        let (min, max) = data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        Self {
            shape: shape.to_vec(),
            min,
            max,
            n_zeros: data.iter().filter(|&&x| x == 0.0).count(),
        }
    }
}
