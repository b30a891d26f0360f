// Tiny layer configuration, generated by nnet-gen.
// IO type: io_parallel, reuse factor: 1, precision: f32

pub type ModelT = f32;
pub const IO_TYPE: &str = "io_parallel";
pub const N_LAYERS: usize = 1;

// conv1d_1 (Conv1D, activation linear)
pub struct Layer1Config;
impl nnet::kernels::conv1d::Conv1dConfig for Layer1Config {
    type Bias = ModelT;
    type Weight = ModelT;
    type Accum = ModelT;
    const PAD_LEFT: usize = 0;
    const PAD_RIGHT: usize = 0;
    const Y_IN: usize = 3;
    const N_CHAN: usize = 1;
    const Y_FILT: usize = 2;
    const N_FILT: usize = 1;
    const STRIDE: usize = 1;
    const Y_OUT: usize = 2;
    const REUSE_FACTOR: usize = 1;
    const STORE_WEIGHTS_IN_BRAM: bool = false;
}

// Array shape [2, 1, 1]
// Min 1.0
// Max 1.0
// Number of zeros 0
pub static W1: [ModelT; 2] = [
    1.0, 1.0,
];

// Array shape [1]
// Min 0.0
// Max 0.0
// Number of zeros 1
pub static B1: [ModelT; 1] = [
    0.0,
];
