//! Tract-based local embedding (fallback for musl and Intel Mac).
//!
//! Pure-Rust path: the ONNX export of `all-MiniLM-L6-v2` is loaded with
//! tract-onnx and tokenized with the tokenizers crate. Model and tokenizer
//! are downloaded into `~/.cache/lexassist/models` on first use and loaded
//! once per provider.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tract_onnx::prelude::*;

use super::EmbeddingProvider;

const ALL_MINILM_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";
const MAX_SEQ_LEN: usize = 256;

type Runnable = TypedRunnableModel<TypedModel>;

struct Loaded {
    tokenizer: tokenizers::Tokenizer,
    model: Runnable,
}

/// Sentence-embedding provider backed by tract.
pub struct TractProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    loaded: Arc<Loaded>,
}

impl TractProvider {
    pub fn new(model_name: String, dims: usize, batch_size: usize) -> Result<Self> {
        if model_name != "all-minilm-l6-v2" {
            bail!(
                "Tract backend supports only all-minilm-l6-v2. Requested: '{}'",
                model_name
            );
        }
        let (onnx_path, tokenizer_path) = ensure_cached(&model_name)?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Load tokenizer: {}", e))?;
        let model = tract_onnx::onnx()
            .model_for_path(&onnx_path)
            .map_err(|e| anyhow!("Load ONNX: {}", e))?
            .into_optimized()
            .map_err(|e| anyhow!("Optimize: {}", e))?
            .into_runnable()
            .map_err(|e| anyhow!("Build tract runnable: {}", e))?;

        Ok(Self {
            model_name,
            dims,
            batch_size: batch_size.max(1),
            loaded: Arc::new(Loaded { tokenizer, model }),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for TractProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let loaded = self.loaded.clone();
        let texts = texts.to_vec();
        let (dims, batch_size) = (self.dims, self.batch_size);
        tokio::task::spawn_blocking(move || run_batches(&loaded, dims, batch_size, &texts)).await?
    }
}

fn cache_dir() -> Result<PathBuf> {
    let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = PathBuf::from(base)
        .join(".cache")
        .join("lexassist")
        .join("models");
    std::fs::create_dir_all(&dir).context("Create model cache dir")?;
    Ok(dir)
}

fn download_to_cache(repo: &str, path: &str, cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!("https://huggingface.co/{}/resolve/main/{}", repo, path);
    let bytes = reqwest::blocking::get(&url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .with_context(|| format!("Download {}", url))?;
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(cache_path, &bytes).context("Write model cache")?;
    Ok(())
}

fn ensure_cached(model_name: &str) -> Result<(PathBuf, PathBuf)> {
    let model_dir = cache_dir()?.join(model_name);
    let onnx_path = model_dir.join("onnx/model.onnx");
    let tokenizer_path = model_dir.join("tokenizer.json");
    download_to_cache(ALL_MINILM_REPO, "onnx/model.onnx", &onnx_path)?;
    download_to_cache(ALL_MINILM_REPO, "tokenizer.json", &tokenizer_path)?;
    Ok((onnx_path, tokenizer_path))
}

fn run_batches(
    loaded: &Loaded,
    dims: usize,
    batch_size: usize,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let encodings = batch
            .iter()
            .map(|s| {
                loaded
                    .tokenizer
                    .encode(s.as_str(), true)
                    .map_err(|e| anyhow!("Tokenize: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(1)
            .clamp(1, MAX_SEQ_LEN);
        let rows = encodings.len();

        let mut input_ids = vec![0i64; rows * seq_len];
        let mut attention_mask = vec![0i64; rows * seq_len];
        for (i, enc) in encodings.iter().enumerate() {
            for (j, &id) in enc.get_ids().iter().take(seq_len).enumerate() {
                input_ids[i * seq_len + j] = id as i64;
                attention_mask[i * seq_len + j] = 1;
            }
        }
        let token_type_ids = vec![0i64; rows * seq_len];

        let to_tensor = |data: Vec<i64>| -> Result<TValue> {
            let arr = ndarray::Array2::from_shape_vec((rows, seq_len), data)?;
            Ok(Tensor::from(arr).into())
        };
        let result = loaded.model.run(tvec!(
            to_tensor(input_ids)?,
            to_tensor(attention_mask)?,
            to_tensor(token_type_ids)?
        ))?;

        let output = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No output tensor"))?;
        let view = output.to_array_view::<f32>()?;
        let shape = view.shape().to_vec();

        match shape.len() {
            // [batch, dims]: already pooled.
            2 => {
                for i in 0..shape[0] {
                    let row: Vec<f32> = view.slice(ndarray::s![i, ..]).iter().copied().collect();
                    out.push(normalize_l2(row));
                }
            }
            // [batch, seq, dims]: mean-pool over the attended tokens.
            3 => {
                for (i, enc) in encodings.iter().enumerate() {
                    let valid = enc.get_ids().len().min(seq_len).max(1);
                    let mut sum = vec![0f32; dims];
                    for j in 0..valid {
                        for (k, &v) in view.slice(ndarray::s![i, j, ..]).iter().enumerate() {
                            if k < dims {
                                sum[k] += v;
                            }
                        }
                    }
                    sum.iter_mut().for_each(|x| *x /= valid as f32);
                    out.push(normalize_l2(sum));
                }
            }
            _ => bail!("Unexpected output shape: {:?}", shape),
        }
    }

    Ok(out)
}

fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
