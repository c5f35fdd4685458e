//! Inference pipeline: feature extraction, scaling, autoencoder, detection.

pub mod detector;
pub mod features;
pub mod loader;
pub mod network;
pub mod scaler;

/// Probe the compute device once at startup. The ndarray backend runs on
/// the host CPU only, so the probe always reports `cpu`; the serving layer
/// still logs and exposes it so deployments can see what they score on.
pub fn detect_device() -> &'static str {
    "cpu"
}

#[cfg(test)]
pub(crate) mod testutil {
    use ndarray::{Array1, Array2, Array3};
    use safetensors::tensor::TensorView;
    use safetensors::Dtype;

    use super::network::{
        DyT, EncoderLayer, LayerNorm, Linear, MultiHeadAttention, TransformerAutoencoder,
        FEEDFORWARD_DIM, HIDDEN_DIM, INPUT_DIM, MAX_SEQ_LEN, NUM_HEADS, NUM_LAYERS,
    };

    pub(crate) type TensorEntry = (String, Vec<usize>, Vec<f32>);

    fn zero_linear(out: usize, inp: usize) -> Linear {
        Linear {
            weight: Array2::zeros((out, inp)),
            bias: Array1::zeros(out),
        }
    }

    fn init_dyt() -> DyT {
        DyT {
            alpha: Array1::from_elem(HIDDEN_DIM, 0.01),
            gamma: Array1::ones(HIDDEN_DIM),
            beta: Array1::zeros(HIDDEN_DIM),
        }
    }

    /// A structurally complete network with zeroed projections. Useful for
    /// pipeline tests where the reconstruction should collapse to zero.
    pub(crate) fn zero_network() -> TransformerAutoencoder {
        let layers = (0..NUM_LAYERS)
            .map(|_| EncoderLayer {
                dyt_attn: init_dyt(),
                self_attn: MultiHeadAttention {
                    in_proj_weight: Array2::zeros((3 * HIDDEN_DIM, HIDDEN_DIM)),
                    in_proj_bias: Array1::zeros(3 * HIDDEN_DIM),
                    out_proj: zero_linear(HIDDEN_DIM, HIDDEN_DIM),
                    num_heads: NUM_HEADS,
                },
                dyt_ffn: init_dyt(),
                ffn_in: zero_linear(FEEDFORWARD_DIM, HIDDEN_DIM),
                ffn_out: zero_linear(HIDDEN_DIM, FEEDFORWARD_DIM),
            })
            .collect();

        TransformerAutoencoder {
            input_norm: LayerNorm {
                weight: Array1::ones(INPUT_DIM),
                bias: Array1::zeros(INPUT_DIM),
            },
            linear_in: zero_linear(HIDDEN_DIM, INPUT_DIM),
            pos_embedding: Array3::zeros((1, MAX_SEQ_LEN, HIDDEN_DIM)),
            layers,
            decoder: zero_linear(INPUT_DIM, HIDDEN_DIM),
        }
    }

    /// The full parameter set of `zero_network`, as loader input.
    pub(crate) fn zero_model_entries() -> Vec<TensorEntry> {
        let mut entries: Vec<TensorEntry> = vec![
            ("input_norm.weight".into(), vec![INPUT_DIM], vec![1.0; INPUT_DIM]),
            ("input_norm.bias".into(), vec![INPUT_DIM], vec![0.0; INPUT_DIM]),
            (
                "linear_in.weight".into(),
                vec![HIDDEN_DIM, INPUT_DIM],
                vec![0.0; HIDDEN_DIM * INPUT_DIM],
            ),
            ("linear_in.bias".into(), vec![HIDDEN_DIM], vec![0.0; HIDDEN_DIM]),
            (
                "pos_embedding".into(),
                vec![1, MAX_SEQ_LEN, HIDDEN_DIM],
                vec![0.0; MAX_SEQ_LEN * HIDDEN_DIM],
            ),
            (
                "decoder.weight".into(),
                vec![INPUT_DIM, HIDDEN_DIM],
                vec![0.0; INPUT_DIM * HIDDEN_DIM],
            ),
            ("decoder.bias".into(), vec![INPUT_DIM], vec![0.0; INPUT_DIM]),
        ];

        for i in 0..NUM_LAYERS {
            let p = format!("encoder.layers.{i}");
            for dyt in ["dyt_attn", "dyt_ffn"] {
                entries.push((format!("{p}.{dyt}.alpha"), vec![HIDDEN_DIM], vec![0.01; HIDDEN_DIM]));
                entries.push((format!("{p}.{dyt}.gamma"), vec![HIDDEN_DIM], vec![1.0; HIDDEN_DIM]));
                entries.push((format!("{p}.{dyt}.beta"), vec![HIDDEN_DIM], vec![0.0; HIDDEN_DIM]));
            }
            entries.push((
                format!("{p}.self_attn.in_proj_weight"),
                vec![3 * HIDDEN_DIM, HIDDEN_DIM],
                vec![0.0; 3 * HIDDEN_DIM * HIDDEN_DIM],
            ));
            entries.push((
                format!("{p}.self_attn.in_proj_bias"),
                vec![3 * HIDDEN_DIM],
                vec![0.0; 3 * HIDDEN_DIM],
            ));
            entries.push((
                format!("{p}.self_attn.out_proj.weight"),
                vec![HIDDEN_DIM, HIDDEN_DIM],
                vec![0.0; HIDDEN_DIM * HIDDEN_DIM],
            ));
            entries.push((
                format!("{p}.self_attn.out_proj.bias"),
                vec![HIDDEN_DIM],
                vec![0.0; HIDDEN_DIM],
            ));
            entries.push((
                format!("{p}.ffn.0.weight"),
                vec![FEEDFORWARD_DIM, HIDDEN_DIM],
                vec![0.0; FEEDFORWARD_DIM * HIDDEN_DIM],
            ));
            entries.push((
                format!("{p}.ffn.0.bias"),
                vec![FEEDFORWARD_DIM],
                vec![0.0; FEEDFORWARD_DIM],
            ));
            entries.push((
                format!("{p}.ffn.3.weight"),
                vec![HIDDEN_DIM, FEEDFORWARD_DIM],
                vec![0.0; HIDDEN_DIM * FEEDFORWARD_DIM],
            ));
            entries.push((
                format!("{p}.ffn.3.bias"),
                vec![HIDDEN_DIM],
                vec![0.0; HIDDEN_DIM],
            ));
        }

        entries
    }

    /// Serialize tensor entries into an in-memory safetensors buffer.
    pub(crate) fn serialize_entries(entries: &[TensorEntry]) -> Vec<u8> {
        let buffers: Vec<Vec<u8>> = entries
            .iter()
            .map(|(_, _, data)| data.iter().flat_map(|v| v.to_le_bytes()).collect())
            .collect();

        let views: Vec<(String, TensorView)> = entries
            .iter()
            .zip(&buffers)
            .map(|((name, shape, _), buf)| {
                let view = TensorView::new(Dtype::F32, shape.clone(), buf)
                    .expect("valid tensor view");
                (name.clone(), view)
            })
            .collect();

        safetensors::serialize(views, &None).expect("serializable tensors")
    }
}
