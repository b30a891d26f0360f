use crate::config::{expected_y_out, multiplier_limit};
use crate::kernels::numeric::{Accumulate, CastFrom, Zero};
use crate::kernels::utils;
use crate::tensor::TensorView;
use std::marker::PhantomData;

/// Compile-time shape and numeric configuration of one Conv1D layer.
///
/// Layouts are row-major: input `[Y_IN][N_CHAN]`, weights
/// `[Y_FILT][N_CHAN][N_FILT]`, biases `[N_FILT]`, output `[Y_OUT][N_FILT]`.
/// `Y_OUT` must equal `(PAD_LEFT + Y_IN + PAD_RIGHT - Y_FILT) / STRIDE + 1`;
/// a configuration that breaks this does not compile once it is used.
///
/// `REUSE_FACTOR` and `STORE_WEIGHTS_IN_BRAM` only describe how a hardware
/// realization should share multipliers and place weights. They never change
/// the numeric result.
pub trait Conv1dConfig {
    type Bias: Copy;
    type Weight: Copy;
    type Accum: Accumulate;

    const PAD_LEFT: usize;
    const PAD_RIGHT: usize;
    const Y_IN: usize;
    const N_CHAN: usize;
    const Y_FILT: usize;
    const N_FILT: usize;
    const STRIDE: usize;
    const Y_OUT: usize;

    const REUSE_FACTOR: usize;
    const STORE_WEIGHTS_IN_BRAM: bool;

    const PADDED_LEN: usize = Self::PAD_LEFT + Self::Y_IN + Self::PAD_RIGHT;
    const N_MULT: usize = Self::Y_OUT * Self::N_FILT * Self::N_CHAN * Self::Y_FILT;
    const MULTIPLIER_LIMIT: usize = multiplier_limit(Self::N_MULT, Self::REUSE_FACTOR);
}

/// Stock layer: 128 positions of 9 channels, 10-tap filters, 4 filters,
/// "same" padding.
pub struct DefaultConv1dConfig;

impl Conv1dConfig for DefaultConv1dConfig {
    type Bias = f32;
    type Weight = f32;
    type Accum = f32;

    const PAD_LEFT: usize = 4;
    const PAD_RIGHT: usize = 5;
    const Y_IN: usize = 128;
    const N_CHAN: usize = 9;
    const Y_FILT: usize = 10;
    const N_FILT: usize = 4;
    const STRIDE: usize = 1;
    const Y_OUT: usize = 128;

    const REUSE_FACTOR: usize = 1;
    const STORE_WEIGHTS_IN_BRAM: bool = false;
}

struct ShapeCheck<C>(PhantomData<C>);

impl<C: Conv1dConfig> ShapeCheck<C> {
    const OK: () = {
        assert!(C::STRIDE > 0, "Conv1d: stride must be non-zero");
        assert!(C::Y_FILT > 0 && C::N_CHAN > 0, "Conv1d: empty filter");
        assert!(C::REUSE_FACTOR > 0, "Conv1d: reuse factor must be non-zero");
        match expected_y_out(C::PAD_LEFT, C::Y_IN, C::PAD_RIGHT, C::Y_FILT, C::STRIDE) {
            Some(y_out) => assert!(
                y_out == C::Y_OUT,
                "Conv1d: Y_OUT disagrees with padding, stride and filter length"
            ),
            None => panic!("Conv1d: filter is longer than the padded input"),
        }
    };
}

/// Zero-extends `data` by `PAD_LEFT` positions before and `PAD_RIGHT` after.
///
/// Every pass checks the configuration at compile time, so a `Y_OUT` that
/// disagrees with the padding, stride and filter length is rejected:
///
/// ```compile_fail
/// use nnet::kernels::conv1d::{pad_input, Conv1dConfig};
///
/// struct Mismatched;
/// impl Conv1dConfig for Mismatched {
///     type Bias = f32;
///     type Weight = f32;
///     type Accum = f32;
///     const PAD_LEFT: usize = 0;
///     const PAD_RIGHT: usize = 0;
///     const Y_IN: usize = 3;
///     const N_CHAN: usize = 1;
///     const Y_FILT: usize = 2;
///     const N_FILT: usize = 1;
///     const STRIDE: usize = 1;
///     const Y_OUT: usize = 5;
///     const REUSE_FACTOR: usize = 1;
///     const STORE_WEIGHTS_IN_BRAM: bool = false;
/// }
///
/// let mut padded = [0.0f32; 3];
/// pad_input::<Mismatched, f32>(&[1.0, 2.0, 3.0], &mut padded);
/// ```
pub fn pad_input<C: Conv1dConfig, D: Zero>(data: &[D], padded: &mut [D]) {
    let () = ShapeCheck::<C>::OK;
    assert_eq!(data.len(), C::Y_IN * C::N_CHAN);
    assert_eq!(padded.len(), C::PADDED_LEN * C::N_CHAN);
    for p in 0..C::PADDED_LEN {
        let row = &mut padded[p * C::N_CHAN..(p + 1) * C::N_CHAN];
        if p < C::PAD_LEFT || p >= C::PAD_LEFT + C::Y_IN {
            row.fill(D::ZERO);
        } else {
            let src = (p - C::PAD_LEFT) * C::N_CHAN;
            row.copy_from_slice(&data[src..src + C::N_CHAN]);
        }
    }
}

/// Computes every partial product `[Y_OUT][N_FILT][N_CHAN][Y_FILT]`
/// without reducing any of them.
///
/// Both operands are promoted to the accumulator type and multiplied there.
pub fn multiply<C, D>(padded: &[D], weights: &[C::Weight], mult: &mut [C::Accum])
where
    C: Conv1dConfig,
    D: Copy,
    C::Accum: CastFrom<D> + CastFrom<C::Weight>,
{
    let () = ShapeCheck::<C>::OK;
    assert_eq!(padded.len(), C::PADDED_LEN * C::N_CHAN);
    assert_eq!(weights.len(), C::Y_FILT * C::N_CHAN * C::N_FILT);
    assert_eq!(mult.len(), C::N_MULT);
    let mut idx = 0;
    for o in 0..C::Y_OUT {
        for f in 0..C::N_FILT {
            for c in 0..C::N_CHAN {
                for t in 0..C::Y_FILT {
                    let x = padded[(o * C::STRIDE + t) * C::N_CHAN + c];
                    let w = weights[(t * C::N_CHAN + c) * C::N_FILT + f];
                    mult[idx] = <C::Accum as CastFrom<D>>::cast_from(x)
                        .acc_mul(<C::Accum as CastFrom<C::Weight>>::cast_from(w));
                    idx += 1;
                }
            }
        }
    }
}

/// Sums the taps of each `(output, filter, channel)` into a per-channel
/// accumulator, leaving channels unsummed.
pub fn accumulate_taps<C: Conv1dConfig>(mult: &[C::Accum], acc_prechannel: &mut [C::Accum]) {
    let () = ShapeCheck::<C>::OK;
    assert_eq!(mult.len(), C::N_MULT);
    assert_eq!(acc_prechannel.len(), C::Y_OUT * C::N_FILT * C::N_CHAN);
    for (acc, taps) in acc_prechannel.iter_mut().zip(mult.chunks_exact(C::Y_FILT)) {
        let mut sum = C::Accum::ZERO;
        for &m in taps {
            sum = sum.acc_add(m);
        }
        *acc = sum;
    }
}

/// Starts each `(output, filter)` accumulator at the filter's bias and adds
/// the channel partial sums in channel order.
pub fn accumulate_channels<C>(
    acc_prechannel: &[C::Accum],
    biases: &[C::Bias],
    acc: &mut [C::Accum],
) where
    C: Conv1dConfig,
    C::Accum: CastFrom<C::Bias>,
{
    let () = ShapeCheck::<C>::OK;
    assert_eq!(acc_prechannel.len(), C::Y_OUT * C::N_FILT * C::N_CHAN);
    assert_eq!(biases.len(), C::N_FILT);
    assert_eq!(acc.len(), C::Y_OUT * C::N_FILT);
    for (i, (out, channels)) in acc
        .iter_mut()
        .zip(acc_prechannel.chunks_exact(C::N_CHAN))
        .enumerate()
    {
        let mut sum = C::Accum::cast_from(biases[i % C::N_FILT]);
        for &partial in channels {
            sum = sum.acc_add(partial);
        }
        *out = sum;
    }
}

/// Converts the accumulators to the output type.
pub fn cast_output<A: Copy, R: CastFrom<A>>(acc: &[A], res: &mut [R]) {
    assert_eq!(acc.len(), res.len());
    for (r, &a) in res.iter_mut().zip(acc) {
        *r = R::cast_from(a);
    }
}

/// Reusable Conv1D layer: owns every intermediate buffer, sized once from `C`.
pub struct Conv1d<C: Conv1dConfig, D> {
    padded: Vec<D>,
    mult: Vec<C::Accum>,
    acc_prechannel: Vec<C::Accum>,
    acc: Vec<C::Accum>,
    _config: PhantomData<C>,
}

impl<C, D> Conv1d<C, D>
where
    C: Conv1dConfig,
    D: Zero,
    C::Accum: CastFrom<D> + CastFrom<C::Weight> + CastFrom<C::Bias>,
{
    pub fn new() -> Self {
        let () = ShapeCheck::<C>::OK;
        log::debug!(
            "Conv1d: in [{}, {}] pad ({}, {}) filt [{}, {}, {}] stride {} -> out [{}, {}]; {} mults, limit {} (reuse {}), weights in {}",
            C::Y_IN,
            C::N_CHAN,
            C::PAD_LEFT,
            C::PAD_RIGHT,
            C::Y_FILT,
            C::N_CHAN,
            C::N_FILT,
            C::STRIDE,
            C::Y_OUT,
            C::N_FILT,
            C::N_MULT,
            C::MULTIPLIER_LIMIT,
            C::REUSE_FACTOR,
            if C::STORE_WEIGHTS_IN_BRAM { "BRAM" } else { "registers" },
        );
        Self {
            padded: vec![D::ZERO; C::PADDED_LEN * C::N_CHAN],
            mult: vec![C::Accum::ZERO; C::N_MULT],
            acc_prechannel: vec![C::Accum::ZERO; C::Y_OUT * C::N_FILT * C::N_CHAN],
            acc: vec![C::Accum::ZERO; C::Y_OUT * C::N_FILT],
            _config: PhantomData,
        }
    }

    /// Runs the four passes and writes `[Y_OUT, N_FILT]` into `out`.
    ///
    /// Panics if any view is not shaped exactly as `C` describes.
    pub fn forward<'a, R>(
        &mut self,
        data: &TensorView<'_, D>,
        weights: &TensorView<'_, C::Weight>,
        biases: &TensorView<'_, C::Bias>,
        out: &'a mut Vec<R>,
    ) -> TensorView<'a, R>
    where
        R: Zero + CastFrom<C::Accum>,
    {
        assert_eq!(
            data.shape.as_ref(),
            &[C::Y_IN, C::N_CHAN],
            "Conv1d: input shape mismatch"
        );
        assert_eq!(
            weights.shape.as_ref(),
            &[C::Y_FILT, C::N_CHAN, C::N_FILT],
            "Conv1d: weight shape mismatch"
        );
        assert_eq!(
            biases.shape.as_ref(),
            &[C::N_FILT],
            "Conv1d: bias shape mismatch"
        );
        log::trace!("Conv1d: forward {} x {}", C::Y_OUT, C::N_FILT);
        pad_input::<C, D>(&data.data, &mut self.padded);
        multiply::<C, D>(&self.padded, &weights.data, &mut self.mult);
        accumulate_taps::<C>(&self.mult, &mut self.acc_prechannel);
        accumulate_channels::<C>(&self.acc_prechannel, &biases.data, &mut self.acc);
        utils::ensure_capacity(out, C::Y_OUT * C::N_FILT);
        cast_output(&self.acc, out);
        TensorView::from_slice(out, vec![C::Y_OUT, C::N_FILT])
    }

    pub fn padded(&self) -> &[D] {
        &self.padded
    }

    pub fn partial_products(&self) -> &[C::Accum] {
        &self.mult
    }

    pub fn channel_sums(&self) -> &[C::Accum] {
        &self.acc_prechannel
    }
}

impl<C, D> Default for Conv1d<C, D>
where
    C: Conv1dConfig,
    D: Zero,
    C::Accum: CastFrom<D> + CastFrom<C::Weight> + CastFrom<C::Bias>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot Conv1D: `data [Y_IN, N_CHAN]` to `[Y_OUT, N_FILT]`.
pub fn conv_1d<'a, D, R, C>(
    data: &TensorView<'_, D>,
    weights: &TensorView<'_, C::Weight>,
    biases: &TensorView<'_, C::Bias>,
    out: &'a mut Vec<R>,
) -> TensorView<'a, R>
where
    C: Conv1dConfig,
    D: Zero,
    R: Zero + CastFrom<C::Accum>,
    C::Accum: CastFrom<D> + CastFrom<C::Weight> + CastFrom<C::Bias>,
{
    Conv1d::<C, D>::new().forward(data, weights, biases, out)
}
