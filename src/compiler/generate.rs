use super::{CompiledLayer, Compiler, LayerKind};
use crate::config::Conv1dParams;
use crate::model::WeightStats;
use std::io::Write;

const VALUES_PER_LINE: usize = 8;

pub(crate) fn generate_module<W: Write>(
    w: &mut W,
    compiler: &Compiler,
    layers: &[CompiledLayer],
) -> std::io::Result<()> {
    writeln!(w, "// {} layer configuration, generated by nnet-gen.", compiler.model_name)?;
    writeln!(
        w,
        "// IO type: {}, reuse factor: {}, precision: {}",
        compiler.io_type, compiler.reuse_factor, compiler.precision
    )?;
    writeln!(w)?;
    writeln!(w, "pub type ModelT = {};", compiler.precision.rust_type())?;
    writeln!(w, "pub const IO_TYPE: &str = \"{}\";", compiler.io_type)?;
    writeln!(w, "pub const N_LAYERS: usize = {};", layers.len())?;
    for layer in layers {
        writeln!(w)?;
        let info = &layer.info;
        match &info.activation {
            Some(act) => writeln!(w, "// {} ({}, activation {})", info.name, info.class_name, act)?,
            None => writeln!(w, "// {} ({})", info.name, info.class_name)?,
        }
        match &info.kind {
            LayerKind::Conv1D { params, .. } => generate_conv1d_config(w, info.index, params)?,
            LayerKind::Dense { n_in, n_out } => {
                writeln!(w, "pub const LAYER{}_N_IN: usize = {};", info.index, n_in)?;
                writeln!(w, "pub const LAYER{}_N_OUT: usize = {};", info.index, n_out)?;
            }
        }
        writeln!(w)?;
        generate_array(w, compiler, &format!("W{}", info.index), &layer.weights, &layer.weight_stats)?;
        writeln!(w)?;
        generate_array(w, compiler, &format!("B{}", info.index), &layer.biases, &layer.bias_stats)?;
    }
    Ok(())
}

fn generate_conv1d_config<W: Write>(
    w: &mut W,
    index: usize,
    params: &Conv1dParams,
) -> std::io::Result<()> {
    writeln!(w, "pub struct Layer{}Config;", index)?;
    writeln!(
        w,
        "impl nnet::kernels::conv1d::Conv1dConfig for Layer{}Config {{",
        index
    )?;
    writeln!(w, "    type Bias = ModelT;")?;
    writeln!(w, "    type Weight = ModelT;")?;
    writeln!(w, "    type Accum = ModelT;")?;
    for (name, value) in [
        ("PAD_LEFT", params.pad_left),
        ("PAD_RIGHT", params.pad_right),
        ("Y_IN", params.y_in),
        ("N_CHAN", params.n_chan),
        ("Y_FILT", params.y_filt),
        ("N_FILT", params.n_filt),
        ("STRIDE", params.stride),
        ("Y_OUT", params.y_out),
        ("REUSE_FACTOR", params.reuse_factor),
    ] {
        writeln!(w, "    const {}: usize = {};", name, value)?;
    }
    writeln!(
        w,
        "    const STORE_WEIGHTS_IN_BRAM: bool = {};",
        params.store_weights_in_bram
    )?;
    writeln!(w, "}}")?;
    Ok(())
}

/// Flat row-major array preceded by its shape, range and zero count.
fn generate_array<W: Write>(
    w: &mut W,
    compiler: &Compiler,
    name: &str,
    data: &[f32],
    stats: &WeightStats,
) -> std::io::Result<()> {
    writeln!(w, "// Array shape {:?}", stats.shape)?;
    writeln!(w, "// Min {:?}", stats.min)?;
    writeln!(w, "// Max {:?}", stats.max)?;
    writeln!(w, "// Number of zeros {}", stats.n_zeros)?;
    writeln!(w, "pub static {}: [ModelT; {}] = [", name, data.len())?;
    for chunk in data.chunks(VALUES_PER_LINE) {
        let values: Vec<String> = chunk.iter().map(|&v| compiler.precision.literal(v)).collect();
        writeln!(w, "    {},", values.join(", "))?;
    }
    writeln!(w, "];")?;
    Ok(())
}
