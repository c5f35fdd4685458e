//! Weight loading
//!
//! Reads the autoencoder's safetensors state dict and validates every
//! tensor against the trained hyperparameters. The positional embedding
//! goes through a versioned detect → adapt → validate step because older
//! checkpoints persisted it without the leading broadcast dimension.

use std::path::Path;

use ndarray::{Array1, Array2, Array3};
use safetensors::{Dtype, SafeTensors};
use thiserror::Error;

use super::network::{
    DyT, EncoderLayer, LayerNorm, Linear, MultiHeadAttention, TransformerAutoencoder,
    FEEDFORWARD_DIM, HIDDEN_DIM, INPUT_DIM, MAX_SEQ_LEN, NUM_HEADS, NUM_LAYERS,
};

const POS_EMBEDDING: &str = "pos_embedding";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model file: {0}")]
    Format(String),

    #[error("model is missing tensor '{0}'")]
    MissingTensor(String),

    #[error("tensor '{name}' has dtype {dtype:?}, expected F32")]
    Dtype { name: String, dtype: Dtype },

    #[error("tensor '{name}' has shape {actual:?}, expected {expected:?}")]
    Shape {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Load the pretrained autoencoder from a safetensors file.
pub fn load_network(path: &Path) -> Result<TransformerAutoencoder, ModelError> {
    let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let network = load_network_from_bytes(&bytes)?;
    tracing::info!("Model weights loaded from {}", path.display());
    Ok(network)
}

/// Build the network from an in-memory safetensors buffer.
pub fn load_network_from_bytes(bytes: &[u8]) -> Result<TransformerAutoencoder, ModelError> {
    let tensors =
        SafeTensors::deserialize(bytes).map_err(|e| ModelError::Format(e.to_string()))?;

    let input_norm = LayerNorm {
        weight: tensor1(&tensors, "input_norm.weight", INPUT_DIM)?,
        bias: tensor1(&tensors, "input_norm.bias", INPUT_DIM)?,
    };
    let linear_in = linear(&tensors, "linear_in", HIDDEN_DIM, INPUT_DIM)?;
    let pos_embedding = load_pos_embedding(&tensors)?;

    let mut layers = Vec::with_capacity(NUM_LAYERS);
    for i in 0..NUM_LAYERS {
        layers.push(encoder_layer(&tensors, i)?);
    }

    let decoder = linear(&tensors, "decoder", INPUT_DIM, HIDDEN_DIM)?;

    Ok(TransformerAutoencoder {
        input_norm,
        linear_in,
        pos_embedding,
        layers,
        decoder,
    })
}

/// Persisted layouts of the positional embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PosEmbeddingLayout {
    /// `[1, max_seq_len, hidden]`
    Current,
    /// `[max_seq_len, hidden]`: saved before the broadcast dimension existed.
    LegacyUnbatched,
    Unknown,
}

fn classify_pos_embedding(shape: &[usize]) -> PosEmbeddingLayout {
    match shape {
        [1, s, h] if *s == MAX_SEQ_LEN && *h == HIDDEN_DIM => PosEmbeddingLayout::Current,
        [s, h] if *s == MAX_SEQ_LEN && *h == HIDDEN_DIM => PosEmbeddingLayout::LegacyUnbatched,
        _ => PosEmbeddingLayout::Unknown,
    }
}

fn load_pos_embedding(tensors: &SafeTensors) -> Result<Array3<f32>, ModelError> {
    let view = tensors
        .tensor(POS_EMBEDDING)
        .map_err(|_| ModelError::MissingTensor(POS_EMBEDDING.to_string()))?;
    let shape = view.shape().to_vec();
    let data = f32_data(&view, POS_EMBEDDING)?;

    match classify_pos_embedding(&shape) {
        PosEmbeddingLayout::Current => {}
        PosEmbeddingLayout::LegacyUnbatched => {
            tracing::info!(
                "'{}' persisted in legacy shape {:?}; inserting broadcast dimension \
                 to [1, {}, {}]",
                POS_EMBEDDING,
                shape,
                MAX_SEQ_LEN,
                HIDDEN_DIM
            );
        }
        PosEmbeddingLayout::Unknown => {
            tracing::warn!(
                "'{}' has unexpected shape {:?} (expected [1, {}, {}] or legacy [{}, {}]); \
                 loading best-effort",
                POS_EMBEDDING,
                shape,
                MAX_SEQ_LEN,
                HIDDEN_DIM,
                MAX_SEQ_LEN,
                HIDDEN_DIM
            );
        }
    }

    // Both accepted layouts are row-major over (seq, hidden), so adapting is
    // a pure reshape: the values are never touched.
    Array3::from_shape_vec((1, MAX_SEQ_LEN, HIDDEN_DIM), data).map_err(|_| ModelError::Shape {
        name: POS_EMBEDDING.to_string(),
        expected: vec![1, MAX_SEQ_LEN, HIDDEN_DIM],
        actual: shape,
    })
}

fn encoder_layer(tensors: &SafeTensors, index: usize) -> Result<EncoderLayer, ModelError> {
    let p = format!("encoder.layers.{index}");

    Ok(EncoderLayer {
        dyt_attn: dyt(tensors, &format!("{p}.dyt_attn"))?,
        self_attn: MultiHeadAttention {
            in_proj_weight: tensor2(
                tensors,
                &format!("{p}.self_attn.in_proj_weight"),
                3 * HIDDEN_DIM,
                HIDDEN_DIM,
            )?,
            in_proj_bias: tensor1(
                tensors,
                &format!("{p}.self_attn.in_proj_bias"),
                3 * HIDDEN_DIM,
            )?,
            out_proj: linear(
                tensors,
                &format!("{p}.self_attn.out_proj"),
                HIDDEN_DIM,
                HIDDEN_DIM,
            )?,
            num_heads: NUM_HEADS,
        },
        dyt_ffn: dyt(tensors, &format!("{p}.dyt_ffn"))?,
        // Sequential indices from the persisted module: 0 = expansion,
        // 3 = projection back to the hidden width.
        ffn_in: linear(tensors, &format!("{p}.ffn.0"), FEEDFORWARD_DIM, HIDDEN_DIM)?,
        ffn_out: linear(tensors, &format!("{p}.ffn.3"), HIDDEN_DIM, FEEDFORWARD_DIM)?,
    })
}

fn dyt(tensors: &SafeTensors, prefix: &str) -> Result<DyT, ModelError> {
    Ok(DyT {
        alpha: tensor1(tensors, &format!("{prefix}.alpha"), HIDDEN_DIM)?,
        gamma: tensor1(tensors, &format!("{prefix}.gamma"), HIDDEN_DIM)?,
        beta: tensor1(tensors, &format!("{prefix}.beta"), HIDDEN_DIM)?,
    })
}

fn linear(
    tensors: &SafeTensors,
    prefix: &str,
    out: usize,
    inp: usize,
) -> Result<Linear, ModelError> {
    Ok(Linear {
        weight: tensor2(tensors, &format!("{prefix}.weight"), out, inp)?,
        bias: tensor1(tensors, &format!("{prefix}.bias"), out)?,
    })
}

fn tensor1(tensors: &SafeTensors, name: &str, len: usize) -> Result<Array1<f32>, ModelError> {
    let view = tensors
        .tensor(name)
        .map_err(|_| ModelError::MissingTensor(name.to_string()))?;
    if view.shape() != [len] {
        return Err(ModelError::Shape {
            name: name.to_string(),
            expected: vec![len],
            actual: view.shape().to_vec(),
        });
    }
    Ok(Array1::from_vec(f32_data(&view, name)?))
}

fn tensor2(
    tensors: &SafeTensors,
    name: &str,
    rows: usize,
    cols: usize,
) -> Result<Array2<f32>, ModelError> {
    let view = tensors
        .tensor(name)
        .map_err(|_| ModelError::MissingTensor(name.to_string()))?;
    if view.shape() != [rows, cols] {
        return Err(ModelError::Shape {
            name: name.to_string(),
            expected: vec![rows, cols],
            actual: view.shape().to_vec(),
        });
    }
    let data = f32_data(&view, name)?;
    Array2::from_shape_vec((rows, cols), data).map_err(|_| ModelError::Shape {
        name: name.to_string(),
        expected: vec![rows, cols],
        actual: view.shape().to_vec(),
    })
}

fn f32_data(view: &safetensors::tensor::TensorView<'_>, name: &str) -> Result<Vec<f32>, ModelError> {
    if view.dtype() != Dtype::F32 {
        return Err(ModelError::Dtype {
            name: name.to_string(),
            dtype: view.dtype(),
        });
    }
    Ok(view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::testutil::{serialize_entries, zero_model_entries, TensorEntry};

    #[test]
    fn test_load_zero_model() {
        let bytes = serialize_entries(&zero_model_entries());
        let network = load_network_from_bytes(&bytes).unwrap();

        assert_eq!(network.layers.len(), NUM_LAYERS);
        assert_eq!(network.pos_embedding.shape(), [1, MAX_SEQ_LEN, HIDDEN_DIM]);
        assert_eq!(network.decoder.weight.dim(), (INPUT_DIM, HIDDEN_DIM));
        assert_eq!(network.max_seq_len(), MAX_SEQ_LEN);
    }

    #[test]
    fn test_legacy_pos_embedding_is_rebatched_without_value_changes() {
        let count = MAX_SEQ_LEN * HIDDEN_DIM;
        let values: Vec<f32> = (0..count).map(|i| i as f32).collect();

        let mut entries = zero_model_entries();
        set_entry(
            &mut entries,
            POS_EMBEDDING,
            vec![MAX_SEQ_LEN, HIDDEN_DIM],
            values,
        );

        let network = load_network_from_bytes(&serialize_entries(&entries)).unwrap();
        assert_eq!(network.pos_embedding.shape(), [1, MAX_SEQ_LEN, HIDDEN_DIM]);

        // Spot-check that the reshape moved no values.
        assert_eq!(network.pos_embedding[[0, 0, 0]], 0.0);
        assert_eq!(network.pos_embedding[[0, 0, 63]], 63.0);
        assert_eq!(network.pos_embedding[[0, 1, 0]], 64.0);
        assert_eq!(
            network.pos_embedding[[0, MAX_SEQ_LEN - 1, HIDDEN_DIM - 1]],
            (count - 1) as f32
        );
    }

    #[test]
    fn test_unexpected_pos_embedding_shape_loads_best_effort() {
        // Wrong rank but the right element count: warned about, then loaded.
        let count = MAX_SEQ_LEN * HIDDEN_DIM;
        let mut entries = zero_model_entries();
        set_entry(
            &mut entries,
            POS_EMBEDDING,
            vec![2, MAX_SEQ_LEN / 2, HIDDEN_DIM],
            vec![0.0; count],
        );

        let network = load_network_from_bytes(&serialize_entries(&entries)).unwrap();
        assert_eq!(network.pos_embedding.shape(), [1, MAX_SEQ_LEN, HIDDEN_DIM]);
    }

    #[test]
    fn test_pos_embedding_wrong_element_count_fails() {
        let mut entries = zero_model_entries();
        set_entry(
            &mut entries,
            POS_EMBEDDING,
            vec![4, HIDDEN_DIM],
            vec![0.0; 4 * HIDDEN_DIM],
        );

        assert!(matches!(
            load_network_from_bytes(&serialize_entries(&entries)),
            Err(ModelError::Shape { .. })
        ));
    }

    #[test]
    fn test_missing_tensor_fails() {
        let entries: Vec<TensorEntry> = zero_model_entries()
            .into_iter()
            .filter(|(name, _, _)| name != "decoder.bias")
            .collect();

        match load_network_from_bytes(&serialize_entries(&entries)) {
            Err(ModelError::MissingTensor(name)) => assert_eq!(name, "decoder.bias"),
            other => panic!("expected MissingTensor, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_wrong_weight_shape_fails() {
        let mut entries = zero_model_entries();
        set_entry(
            &mut entries,
            "decoder.weight",
            vec![HIDDEN_DIM, INPUT_DIM],
            vec![0.0; HIDDEN_DIM * INPUT_DIM],
        );

        assert!(matches!(
            load_network_from_bytes(&serialize_entries(&entries)),
            Err(ModelError::Shape { .. })
        ));
    }

    #[test]
    fn test_garbage_bytes_fail_to_parse() {
        assert!(matches!(
            load_network_from_bytes(b"not a safetensors file"),
            Err(ModelError::Format(_))
        ));
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_network(&dir.path().join("missing.safetensors")),
            Err(ModelError::Io { .. })
        ));
    }

    fn set_entry(entries: &mut Vec<TensorEntry>, name: &str, shape: Vec<usize>, data: Vec<f32>) {
        entries.retain(|(n, _, _)| n != name);
        entries.push((name.to_string(), shape, data));
    }
}
