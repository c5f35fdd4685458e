//! Transformer autoencoder
//!
//! Pure-ndarray forward pass of the pretrained encoder-decoder. Each encoder
//! block replaces layer normalization with a learned smooth-thresholding
//! transform (DyT) applied before both the attention and feed-forward
//! sub-layers. Inference only: no dropout, no gradients.

use ndarray::{s, Array1, Array2, Array3};
use thiserror::Error;

// Trained hyperparameters. These never change independently of the weight
// file: the loader validates every tensor against them.
pub const INPUT_DIM: usize = 12;
pub const HIDDEN_DIM: usize = 64;
pub const NUM_LAYERS: usize = 3;
pub const NUM_HEADS: usize = 4;
pub const FEEDFORWARD_DIM: usize = 256;
pub const MAX_SEQ_LEN: usize = 256;

const LAYER_NORM_EPS: f32 = 1e-5;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("sequence length {actual} exceeds the maximum of {max}")]
    SequenceTooLong { actual: usize, max: usize },

    #[error("expected input with {expected} features, got {actual}")]
    InputDimMismatch { expected: usize, actual: usize },
}

/// Fully-connected layer. Weights are stored as `(out, in)` with the bias
/// along `out`, matching the persisted state dict.
#[derive(Debug, Clone)]
pub struct Linear {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weight.t()) + &self.bias
    }
}

/// Standard layer normalization over the feature axis.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    pub weight: Array1<f32>,
    pub bias: Array1<f32>,
}

impl LayerNorm {
    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            let mean = row.mean().unwrap_or(0.0);
            let var = row.mapv(|v| (v - mean).powi(2)).mean().unwrap_or(0.0);
            let denom = (var + LAYER_NORM_EPS).sqrt();
            row.mapv_inplace(|v| (v - mean) / denom);
        }
        out * &self.weight + &self.bias
    }
}

/// Smooth-thresholding transform: `gamma * tanh(alpha * x) + beta`,
/// applied per channel. Stands in for layer norm inside encoder blocks.
#[derive(Debug, Clone)]
pub struct DyT {
    pub alpha: Array1<f32>,
    pub gamma: Array1<f32>,
    pub beta: Array1<f32>,
}

impl DyT {
    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        (x * &self.alpha).mapv(f32::tanh) * &self.gamma + &self.beta
    }
}

/// Multi-head self-attention with the fused query/key/value projection
/// layout of the persisted weights.
#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    /// `(3 * hidden, hidden)`: stacked q, k, v projections.
    pub in_proj_weight: Array2<f32>,
    pub in_proj_bias: Array1<f32>,
    pub out_proj: Linear,
    pub num_heads: usize,
}

impl MultiHeadAttention {
    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let d = x.ncols();
        let head_dim = d / self.num_heads;
        let scale = (head_dim as f32).sqrt();

        let qkv = x.dot(&self.in_proj_weight.t()) + &self.in_proj_bias;
        let q = qkv.slice(s![.., 0..d]);
        let k = qkv.slice(s![.., d..2 * d]);
        let v = qkv.slice(s![.., 2 * d..3 * d]);

        let mut context = Array2::<f32>::zeros((x.nrows(), d));
        for h in 0..self.num_heads {
            let cols = h * head_dim..(h + 1) * head_dim;
            let qh = q.slice(s![.., cols.clone()]);
            let kh = k.slice(s![.., cols.clone()]);
            let vh = v.slice(s![.., cols.clone()]);

            let mut scores = qh.dot(&kh.t()) / scale;
            softmax_rows(&mut scores);
            context.slice_mut(s![.., cols]).assign(&scores.dot(&vh));
        }

        self.out_proj.forward(&context)
    }
}

fn softmax_rows(x: &mut Array2<f32>) {
    for mut row in x.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

/// One encoder block: DyT → self-attention → residual,
/// then DyT → feed-forward → residual.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    pub dyt_attn: DyT,
    pub self_attn: MultiHeadAttention,
    pub dyt_ffn: DyT,
    pub ffn_in: Linear,
    pub ffn_out: Linear,
}

impl EncoderLayer {
    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let attn = self.self_attn.forward(&self.dyt_attn.forward(x));
        let x = x + &attn;

        let hidden = self
            .ffn_in
            .forward(&self.dyt_ffn.forward(&x))
            .mapv(|v| v.max(0.0));
        let ffn = self.ffn_out.forward(&hidden);

        &x + &ffn
    }
}

/// Transformer encoder-decoder that reconstructs its standardized input.
#[derive(Debug, Clone)]
pub struct TransformerAutoencoder {
    pub input_norm: LayerNorm,
    pub linear_in: Linear,
    /// `(1, max_seq_len, hidden)`: learned positional embedding.
    pub pos_embedding: Array3<f32>,
    pub layers: Vec<EncoderLayer>,
    pub decoder: Linear,
}

impl TransformerAutoencoder {
    /// Maximum sequence length this instance was loaded with.
    pub fn max_seq_len(&self) -> usize {
        self.pos_embedding.shape()[1]
    }

    /// Reconstruct a `(seq_len, input_dim)` sequence.
    pub fn forward(&self, x: &Array2<f32>) -> Result<Array2<f32>, NetworkError> {
        let input_dim = self.linear_in.weight.ncols();
        if x.ncols() != input_dim {
            return Err(NetworkError::InputDimMismatch {
                expected: input_dim,
                actual: x.ncols(),
            });
        }

        let seq_len = x.nrows();
        let max = self.max_seq_len();
        if seq_len > max {
            return Err(NetworkError::SequenceTooLong {
                actual: seq_len,
                max,
            });
        }

        let mut h = self.linear_in.forward(&self.input_norm.forward(x));
        h += &self.pos_embedding.slice(s![0, ..seq_len, ..]);

        for layer in &self.layers {
            h = layer.forward(&h);
        }

        Ok(self.decoder.forward(&h))
    }
}

/// Mean squared error between a reconstruction and its input.
/// Both arrays must have the same shape.
pub fn reconstruction_mse(reconstructed: &Array2<f32>, input: &Array2<f32>) -> f32 {
    let diff = reconstructed - input;
    diff.mapv(|v| v * v).mean().unwrap_or(0.0)
}
