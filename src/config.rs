//! Runtime view of a layer's convolution parameters.
//!
//! Kernels are configured at compile time through
//! [`Conv1dConfig`](crate::kernels::conv1d::Conv1dConfig); this module holds
//! the value-level mirror used when importing models and generating configs.
use crate::kernels::conv1d::Conv1dConfig;
use crate::kernels::fixed;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be non-zero")]
    ZeroDimension(&'static str),
    #[error("filter length {y_filt} exceeds padded input length {padded}")]
    FilterTooLong { y_filt: usize, padded: usize },
    #[error("y_out is {actual} but padding/stride/filter length imply {expected}")]
    OutputLengthMismatch { expected: usize, actual: usize },
    #[error("unknown padding mode: {0}")]
    UnknownPadding(String),
    #[error("invalid IO type: {0}")]
    InvalidIoType(String),
    #[error("unknown precision: {0}")]
    UnknownPrecision(String),
}

/// Keras-style padding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Valid,
    Same,
}

impl FromStr for Padding {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(Padding::Valid),
            "same" => Ok(Padding::Same),
            other => Err(ConfigError::UnknownPadding(other.to_string())),
        }
    }
}

/// How a generated design moves data in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoType {
    #[serde(rename = "io_parallel")]
    Parallel,
    #[serde(rename = "io_serial")]
    Serial,
}

impl IoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IoType::Parallel => "io_parallel",
            IoType::Serial => "io_serial",
        }
    }
}

impl FromStr for IoType {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "io_parallel" => Ok(IoType::Parallel),
            "io_serial" => Ok(IoType::Serial),
            other => Err(ConfigError::InvalidIoType(other.to_string())),
        }
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric type used for generated weights, biases and accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Precision {
    F32,
    F64,
    /// `ap_fixed<width, int_bits>`
    Fixed { width: u32, int_bits: u32 },
}

impl Precision {
    /// Rust type expression naming this precision.
    pub fn rust_type(&self) -> String {
        match self {
            Precision::F32 => "f32".to_string(),
            Precision::F64 => "f64".to_string(),
            Precision::Fixed { width, int_bits } => {
                format!("nnet::kernels::fixed::ApFixed<{}, {}>", width, int_bits)
            }
        }
    }

    /// Rust expression for `value` quantized to this precision.
    pub fn literal(&self, value: f32) -> String {
        match self {
            Precision::F32 => float_literal("f32", value as f64),
            Precision::F64 => float_literal("f64", value as f64),
            Precision::Fixed { width, int_bits } => format!(
                "ModelT::from_raw({})",
                fixed::quantize(value as f64, *width, width - int_bits)
            ),
        }
    }
}

fn float_literal(ty: &str, value: f64) -> String {
    if value.is_nan() {
        format!("{}::NAN", ty)
    } else if value == f64::INFINITY {
        format!("{}::INFINITY", ty)
    } else if value == f64::NEG_INFINITY {
        format!("{}::NEG_INFINITY", ty)
    } else if ty == "f32" {
        format!("{:?}", value as f32)
    } else {
        format!("{:?}", value)
    }
}

impl FromStr for Precision {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "f32" | "float" => return Ok(Precision::F32),
            "f64" | "double" => return Ok(Precision::F64),
            _ => {}
        }
        let unknown = || ConfigError::UnknownPrecision(s.to_string());
        let args = compact
            .strip_prefix("ap_fixed<")
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(unknown)?;
        let (width, int_bits) = args.split_once(',').ok_or_else(unknown)?;
        let width: u32 = width.parse().map_err(|_| unknown())?;
        let int_bits: u32 = int_bits.parse().map_err(|_| unknown())?;
        if width == 0 || width > 64 || int_bits > width {
            return Err(unknown());
        }
        Ok(Precision::Fixed { width, int_bits })
    }
}

impl TryFrom<String> for Precision {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Precision> for String {
    fn from(p: Precision) -> Self {
        p.to_string()
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::F32 => f.write_str("f32"),
            Precision::F64 => f.write_str("f64"),
            Precision::Fixed { width, int_bits } => write!(f, "ap_fixed<{},{}>", width, int_bits),
        }
    }
}

#[derive(Error, Debug)]
pub enum ToolConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML config {path}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config value")]
    Invalid(#[from] ConfigError),
}

/// Project file driving `nnet-gen`, in the YAML layout of the Keras
/// toolflow:
///
/// ```yaml
/// KerasJson: model.json
/// KerasH5: weights/
/// OutputDir: out
/// ProjectName: myproject
/// IOType: io_parallel
/// ReuseFactor: 1
/// DefaultPrecision: ap_fixed<18,8>
/// ```
///
/// Relative paths are resolved against the directory holding the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ToolConfig {
    pub keras_json: PathBuf,
    /// Weight source: a directory of raw `.bin` files or an `.h5` file.
    #[serde(rename = "KerasH5", alias = "KerasWeights")]
    pub keras_weights: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(rename = "IOType")]
    pub io_type: IoType,
    #[serde(default = "default_reuse_factor")]
    pub reuse_factor: usize,
    #[serde(default = "default_precision")]
    pub default_precision: Precision,
    #[serde(default)]
    pub store_weights_in_bram: bool,
}

fn default_project_name() -> String {
    "Model".to_string()
}

fn default_reuse_factor() -> usize {
    1
}

fn default_precision() -> Precision {
    Precision::F32
}

impl ToolConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ToolConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ToolConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_yaml::from_str(&text).map_err(|source| ToolConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        config.validate()?;
        log::debug!("Loaded {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Makes relative paths relative to `base` instead of the working directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.keras_json,
            &mut self.keras_weights,
            &mut self.output_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reuse_factor == 0 {
            return Err(ConfigError::ZeroDimension("ReuseFactor"));
        }
        Ok(())
    }

    /// Generated module, `<OutputDir>/<ProjectName>.rs`.
    pub fn output_file(&self) -> PathBuf {
        self.output_dir.join(format!("{}.rs", self.project_name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv1dParams {
    pub pad_left: usize,
    pub pad_right: usize,
    pub y_in: usize,
    pub n_chan: usize,
    pub y_filt: usize,
    pub n_filt: usize,
    pub stride: usize,
    pub y_out: usize,
    pub reuse_factor: usize,
    pub store_weights_in_bram: bool,
}

impl Conv1dParams {
    pub fn of<C: Conv1dConfig>() -> Self {
        Self {
            pad_left: C::PAD_LEFT,
            pad_right: C::PAD_RIGHT,
            y_in: C::Y_IN,
            n_chan: C::N_CHAN,
            y_filt: C::Y_FILT,
            n_filt: C::N_FILT,
            stride: C::STRIDE,
            y_out: C::Y_OUT,
            reuse_factor: C::REUSE_FACTOR,
            store_weights_in_bram: C::STORE_WEIGHTS_IN_BRAM,
        }
    }

    /// Derives padding and output length the way Keras does for `padding`.
    pub fn from_padding(
        padding: Padding,
        y_in: usize,
        n_chan: usize,
        y_filt: usize,
        n_filt: usize,
        stride: usize,
    ) -> Result<Self, ConfigError> {
        if stride == 0 {
            return Err(ConfigError::ZeroDimension("stride"));
        }
        let (y_out, pad_left, pad_right) = match padding {
            Padding::Same => {
                let y_out = y_in.div_ceil(stride);
                let pad_along = if y_in % stride == 0 {
                    y_filt.saturating_sub(stride)
                } else {
                    y_filt.saturating_sub(y_in % stride)
                };
                let pad_left = pad_along / 2;
                (y_out, pad_left, pad_along - pad_left)
            }
            Padding::Valid => {
                if y_filt > y_in {
                    return Err(ConfigError::FilterTooLong {
                        y_filt,
                        padded: y_in,
                    });
                }
                ((y_in - y_filt + 1).div_ceil(stride), 0, 0)
            }
        };
        let params = Self {
            pad_left,
            pad_right,
            y_in,
            n_chan,
            y_filt,
            n_filt,
            stride,
            y_out,
            reuse_factor: 1,
            store_weights_in_bram: false,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_reuse_factor(mut self, reuse_factor: usize) -> Self {
        self.reuse_factor = reuse_factor;
        self
    }

    pub fn padded_len(&self) -> usize {
        self.pad_left + self.y_in + self.pad_right
    }

    /// `floor((padded_len - y_filt) / stride) + 1`, or `None` when the
    /// filter does not fit or the stride is zero.
    pub fn expected_y_out(&self) -> Option<usize> {
        expected_y_out(self.pad_left, self.y_in, self.pad_right, self.y_filt, self.stride)
    }

    /// Number of multiplications in one invocation.
    pub fn n_mult(&self) -> usize {
        self.y_out * self.n_filt * self.n_chan * self.y_filt
    }

    /// Multipliers a hardware realization may allocate for this layer.
    pub fn multiplier_limit(&self) -> usize {
        multiplier_limit(self.n_mult(), self.reuse_factor)
    }

    pub fn input_shape(&self) -> [usize; 2] {
        [self.y_in, self.n_chan]
    }

    pub fn weight_shape(&self) -> [usize; 3] {
        [self.y_filt, self.n_chan, self.n_filt]
    }

    pub fn output_shape(&self) -> [usize; 2] {
        [self.y_out, self.n_filt]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("y_in", self.y_in),
            ("n_chan", self.n_chan),
            ("y_filt", self.y_filt),
            ("n_filt", self.n_filt),
            ("stride", self.stride),
            ("reuse_factor", self.reuse_factor),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDimension(name));
            }
        }
        let padded = self.padded_len();
        match self.expected_y_out() {
            None => Err(ConfigError::FilterTooLong {
                y_filt: self.y_filt,
                padded,
            }),
            Some(expected) if expected != self.y_out => Err(ConfigError::OutputLengthMismatch {
                expected,
                actual: self.y_out,
            }),
            Some(_) => Ok(()),
        }
    }
}

pub const fn expected_y_out(
    pad_left: usize,
    y_in: usize,
    pad_right: usize,
    y_filt: usize,
    stride: usize,
) -> Option<usize> {
    let padded = pad_left + y_in + pad_right;
    if stride == 0 || y_filt > padded {
        return None;
    }
    Some((padded - y_filt) / stride + 1)
}

pub const fn multiplier_limit(n_mult: usize, reuse_factor: usize) -> usize {
    if reuse_factor == 0 {
        return n_mult;
    }
    n_mult.div_ceil(reuse_factor)
}
