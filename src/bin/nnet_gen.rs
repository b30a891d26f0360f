//! Generates Rust layer configurations and weight arrays from a Keras model.
//!
//! Usage:
//!   nnet-gen --config project.yml
//!   nnet-gen --model model.json --weights weights/ --output src/layers.rs
//!
//! Weights are either a Keras `.h5` file (with the `hdf5` feature) or raw
//! little-endian f32 files named `<layer>_kernel.bin` and `<layer>_bias.bin`
//! in Keras layout. Paths in a project file are relative to that file.

use anyhow::{Context, Result};
use clap::Parser;
use nnet::compiler::{Compiler, LayerKind};
use nnet::config::{IoType, Precision, ToolConfig};
use nnet::model::KerasModel;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nnet-gen", about = "Compile a Keras model into fixed-shape layer configs")]
struct Args {
    /// YAML project file; replaces every other option
    #[arg(short, long, conflicts_with_all = ["model", "weights", "output"])]
    config: Option<PathBuf>,

    /// Keras model architecture (JSON)
    #[arg(short, long, required_unless_present = "config")]
    model: Option<PathBuf>,

    /// `.h5` file, or directory holding `<layer>_kernel.bin` / `<layer>_bias.bin`
    #[arg(short, long, required_unless_present = "config")]
    weights: Option<PathBuf>,

    /// Generated Rust file
    #[arg(short, long, required_unless_present = "config")]
    output: Option<PathBuf>,

    /// Model name used in the generated header
    #[arg(long, default_value = "Model")]
    name: String,

    #[arg(long, default_value_t = 1)]
    reuse_factor: usize,

    /// io_parallel or io_serial
    #[arg(long, default_value = "io_parallel")]
    io_type: IoType,

    /// f32, f64 or ap_fixed<W,I>
    #[arg(long, default_value = "f32")]
    precision: Precision,

    /// Keep weights in block RAM instead of registers
    #[arg(long)]
    weights_in_bram: bool,
}

/// Model, weight source, output file and compiler settings for one run.
fn plan(args: Args) -> Result<(PathBuf, PathBuf, PathBuf, Compiler)> {
    if let Some(path) = &args.config {
        let config = ToolConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Failed to create {}", config.output_dir.display())
        })?;
        let compiler = Compiler::from_config(&config);
        let output = config.output_file();
        return Ok((config.keras_json, config.keras_weights, output, compiler));
    }
    let compiler = Compiler::new()
        .with_name(&args.name)
        .with_reuse_factor(args.reuse_factor)
        .with_io_type(args.io_type)
        .with_precision(args.precision)
        .with_weights_in_bram(args.weights_in_bram);
    match (args.model, args.weights, args.output) {
        (Some(model), Some(weights), Some(output)) => Ok((model, weights, output, compiler)),
        _ => anyhow::bail!("--model, --weights and --output are required without --config"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let (model_path, weights, output, compiler) = plan(Args::parse())?;

    let model = KerasModel::load(&model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;
    let result = compiler
        .compile(&model, &weights)
        .context("Failed to compile model")?;

    for layer in &result.layers {
        let detail = match &layer.info.kind {
            LayerKind::Conv1D { params, .. } => format!(
                "y_out {}, multiplier limit {}",
                params.y_out,
                params.multiplier_limit()
            ),
            LayerKind::Dense { n_in, n_out } => format!("{} -> {}", n_in, n_out),
        };
        println!(
            "{:>3} {:<20} {:<8} {:?} zeros {}  ({})",
            layer.info.index,
            layer.info.name,
            layer.info.class_name,
            layer.info.output_shape(),
            layer.weights_n_zeros(),
            detail
        );
    }

    fs::write(&output, &result.code)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote {}", output.display());
    Ok(())
}
