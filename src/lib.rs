//! Fixed-shape neural-network layers in the style of hardware-synthesis
//! building blocks.
//!
//! Every layer is configured entirely at compile time through a config type
//! (see [`kernels::conv1d::Conv1dConfig`]); activation, weight, bias,
//! accumulator and output types are independent type parameters. The
//! [`compiler`] module derives such configurations from Keras models.
pub mod compiler;
pub mod config;
pub mod kernels;
pub mod model;
pub mod tensor;
