//! Kernel-level benchmarks
//!
//! Run with: cargo bench --bench kernels

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use nnet::kernels::conv1d::{Conv1d, Conv1dConfig, DefaultConv1dConfig};
use nnet::kernels::fixed::ApFixed;
use nnet::tensor::TensorView;

type Q = ApFixed<18, 8>;

struct FixedDefault;
impl Conv1dConfig for FixedDefault {
    type Bias = Q;
    type Weight = Q;
    type Accum = Q;
    const PAD_LEFT: usize = DefaultConv1dConfig::PAD_LEFT;
    const PAD_RIGHT: usize = DefaultConv1dConfig::PAD_RIGHT;
    const Y_IN: usize = DefaultConv1dConfig::Y_IN;
    const N_CHAN: usize = DefaultConv1dConfig::N_CHAN;
    const Y_FILT: usize = DefaultConv1dConfig::Y_FILT;
    const N_FILT: usize = DefaultConv1dConfig::N_FILT;
    const STRIDE: usize = DefaultConv1dConfig::STRIDE;
    const Y_OUT: usize = DefaultConv1dConfig::Y_OUT;
    const REUSE_FACTOR: usize = 1;
    const STORE_WEIGHTS_IN_BRAM: bool = false;
}

fn gen_data(n: usize) -> Vec<f32> {
    (0..n).map(|i| ((i as f32 * 0.013) % 2.0) - 1.0).collect()
}

fn bench_conv1d(c: &mut Criterion) {
    type C = DefaultConv1dConfig;
    let mut group = c.benchmark_group("conv1d");
    group.throughput(Throughput::Elements(C::N_MULT as u64));

    let input_data = gen_data(C::Y_IN * C::N_CHAN);
    let weight_data = gen_data(C::Y_FILT * C::N_CHAN * C::N_FILT);
    let bias_data = gen_data(C::N_FILT);
    let input = TensorView::from_slice(&input_data, vec![C::Y_IN, C::N_CHAN]);
    let weights = TensorView::from_slice(&weight_data, vec![C::Y_FILT, C::N_CHAN, C::N_FILT]);
    let biases = TensorView::from_slice(&bias_data, vec![C::N_FILT]);
    let mut layer = Conv1d::<C, f32>::new();
    let mut out: Vec<f32> = Vec::new();
    group.bench_function("f32_default", |b| {
        b.iter(|| {
            layer.forward(
                black_box(&input),
                black_box(&weights),
                black_box(&biases),
                &mut out,
            );
        });
    });

    let to_q = |v: &[f32]| -> Vec<Q> { v.iter().map(|&x| Q::from_f64(x as f64)).collect() };
    let input_q = to_q(&input_data);
    let weight_q = to_q(&weight_data);
    let bias_q = to_q(&bias_data);
    let input = TensorView::from_slice(&input_q, vec![C::Y_IN, C::N_CHAN]);
    let weights = TensorView::from_slice(&weight_q, vec![C::Y_FILT, C::N_CHAN, C::N_FILT]);
    let biases = TensorView::from_slice(&bias_q, vec![C::N_FILT]);
    let mut layer = Conv1d::<FixedDefault, Q>::new();
    let mut out: Vec<Q> = Vec::new();
    group.bench_function("ap_fixed_18_8_default", |b| {
        b.iter(|| {
            layer.forward(
                black_box(&input),
                black_box(&weights),
                black_box(&biases),
                &mut out,
            );
        });
    });

    group.finish();
}

criterion_group!(benches, bench_conv1d);
criterion_main!(benches);
