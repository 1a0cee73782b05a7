//! DistilBERT for sequence classification
//!
//! Parameter names follow the HuggingFace `DistilBertForSequenceClassification`
//! layout (`distilbert.*`, `pre_classifier`, `classifier`), so hub checkpoints
//! load directly and trained weights round-trip through `model.safetensors`.
//!
//! Every op here has a backward pass, which lets the trainer fine-tune the
//! whole network rather than just the head. Dropout is only active in
//! `forward_t(.., train = true)`.

use candle_core::{DType, IndexOp, Module, Result, Tensor, D};
use candle_nn::{embedding, linear, Dropout, Embedding, Init, Linear, ModuleT, VarBuilder};
use serde::Deserialize;

/// Hyper-parameters read from a DistilBERT `config.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DistilBertConfig {
    pub vocab_size: usize,
    pub dim: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub hidden_dim: usize,
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default = "default_dropout")]
    pub dropout: f32,
    #[serde(default = "default_dropout")]
    pub attention_dropout: f32,
    /// Applied between `pre_classifier` and `classifier`
    #[serde(default = "default_seq_classif_dropout")]
    pub seq_classif_dropout: f32,
    /// Standard deviation of the fresh classification head's weights
    #[serde(default = "default_initializer_range")]
    pub initializer_range: f64,
}

fn default_dropout() -> f32 {
    0.1
}

fn default_seq_classif_dropout() -> f32 {
    0.2
}

fn default_initializer_range() -> f64 {
    0.02
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Gelu,
    Relu,
}

impl Activation {
    fn apply(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Gelu => xs.gelu_erf(),
            Self::Relu => xs.relu(),
        }
    }
}

const LAYER_NORM_EPS: f64 = 1e-12;

/// Layer normalization built from differentiable primitives
#[derive(Debug, Clone)]
struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
}

impl LayerNorm {
    fn load(dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get_with_hints(dim, "weight", Init::Const(1.0))?,
            bias: vb.get_with_hints(dim, "bias", Init::Const(0.0))?,
        })
    }
}

impl Module for LayerNorm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        let variance = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let normed = centered.broadcast_div(&(variance + LAYER_NORM_EPS)?.sqrt()?)?;
        normed.broadcast_mul(&self.weight)?.broadcast_add(&self.bias)
    }
}

#[derive(Debug, Clone)]
struct Embeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    layer_norm: LayerNorm,
    dropout: Dropout,
}

impl Embeddings {
    fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        Ok(Self {
            word_embeddings: embedding(config.vocab_size, config.dim, vb.pp("word_embeddings"))?,
            position_embeddings: embedding(
                config.max_position_embeddings,
                config.dim,
                vb.pp("position_embeddings"),
            )?,
            layer_norm: LayerNorm::load(config.dim, vb.pp("LayerNorm"))?,
            dropout: Dropout::new(config.dropout),
        })
    }

    fn forward(&self, input_ids: &Tensor, train: bool) -> Result<Tensor> {
        let (_batch, seq_len) = input_ids.dims2()?;
        let positions = Tensor::arange(0u32, seq_len as u32, input_ids.device())?;
        let words = self.word_embeddings.forward(input_ids)?;
        let positions = self.position_embeddings.forward(&positions)?;
        let embedded = self.layer_norm.forward(&words.broadcast_add(&positions)?)?;
        self.dropout.forward_t(&embedded, train)
    }
}

#[derive(Debug, Clone)]
struct SelfAttention {
    q_lin: Linear,
    k_lin: Linear,
    v_lin: Linear,
    out_lin: Linear,
    dropout: Dropout,
    n_heads: usize,
    head_dim: usize,
}

impl SelfAttention {
    fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        let dim = config.dim;
        if dim % config.n_heads != 0 {
            candle_core::bail!("dim {} is not divisible by n_heads {}", dim, config.n_heads);
        }
        Ok(Self {
            q_lin: linear(dim, dim, vb.pp("q_lin"))?,
            k_lin: linear(dim, dim, vb.pp("k_lin"))?,
            v_lin: linear(dim, dim, vb.pp("v_lin"))?,
            out_lin: linear(dim, dim, vb.pp("out_lin"))?,
            dropout: Dropout::new(config.attention_dropout),
            n_heads: config.n_heads,
            head_dim: dim / config.n_heads,
        })
    }

    fn forward(&self, xs: &Tensor, padding_mask: &Tensor, train: bool) -> Result<Tensor> {
        let (batch, seq_len, dim) = xs.dims3()?;
        let heads = |t: Tensor| -> Result<Tensor> {
            t.reshape((batch, seq_len, self.n_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };

        let q = heads(self.q_lin.forward(xs)?)?;
        let k = heads(self.k_lin.forward(xs)?)?;
        let v = heads(self.v_lin.forward(xs)?)?;

        let q = (q / (self.head_dim as f64).sqrt())?;
        let scores = q.matmul(&k.t()?.contiguous()?)?;

        let mask = padding_mask.broadcast_as(scores.shape())?;
        let blocked = Tensor::new(f32::NEG_INFINITY, scores.device())?
            .to_dtype(scores.dtype())?
            .broadcast_as(scores.shape())?;
        let scores = mask.where_cond(&blocked, &scores)?;
        let weights = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let weights = self.dropout.forward_t(&weights, train)?;

        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, dim))?;
        self.out_lin.forward(&context)
    }
}

#[derive(Debug, Clone)]
struct TransformerBlock {
    attention: SelfAttention,
    sa_layer_norm: LayerNorm,
    lin1: Linear,
    lin2: Linear,
    output_layer_norm: LayerNorm,
    activation: Activation,
    dropout: Dropout,
}

impl TransformerBlock {
    fn load(vb: VarBuilder, config: &DistilBertConfig) -> Result<Self> {
        Ok(Self {
            attention: SelfAttention::load(vb.pp("attention"), config)?,
            sa_layer_norm: LayerNorm::load(config.dim, vb.pp("sa_layer_norm"))?,
            lin1: linear(config.dim, config.hidden_dim, vb.pp("ffn.lin1"))?,
            lin2: linear(config.hidden_dim, config.dim, vb.pp("ffn.lin2"))?,
            output_layer_norm: LayerNorm::load(config.dim, vb.pp("output_layer_norm"))?,
            activation: config.activation,
            dropout: Dropout::new(config.dropout),
        })
    }

    fn forward(&self, xs: &Tensor, padding_mask: &Tensor, train: bool) -> Result<Tensor> {
        let attended = self.attention.forward(xs, padding_mask, train)?;
        let xs = self.sa_layer_norm.forward(&(attended + xs)?)?;
        let hidden = self.activation.apply(&self.lin1.forward(&xs)?)?;
        let ffn = self.dropout.forward_t(&self.lin2.forward(&hidden)?, train)?;
        self.output_layer_norm.forward(&(ffn + xs)?)
    }
}

/// DistilBERT encoder with a two-layer classification head on `[CLS]`
#[derive(Debug, Clone)]
pub struct DistilBertForSequenceClassification {
    embeddings: Embeddings,
    layers: Vec<TransformerBlock>,
    pre_classifier: Linear,
    classifier: Linear,
    head_dropout: Dropout,
    num_labels: usize,
}

/// Linear layer whose fresh weights are drawn from `N(0, stdev)` with zero bias
fn head_linear(in_dim: usize, out_dim: usize, stdev: f64, vb: VarBuilder) -> Result<Linear> {
    let weight = vb.get_with_hints((out_dim, in_dim), "weight", Init::Randn { mean: 0.0, stdev })?;
    let bias = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}

impl DistilBertForSequenceClassification {
    /// Build the network from a VarBuilder rooted at the checkpoint top level
    pub fn load(vb: VarBuilder, config: &DistilBertConfig, num_labels: usize) -> Result<Self> {
        let encoder = vb.pp("distilbert");
        let embeddings = Embeddings::load(encoder.pp("embeddings"), config)?;
        let layers = (0..config.n_layers)
            .map(|idx| TransformerBlock::load(encoder.pp(format!("transformer.layer.{idx}")), config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            embeddings,
            layers,
            pre_classifier: head_linear(
                config.dim,
                config.dim,
                config.initializer_range,
                vb.pp("pre_classifier"),
            )?,
            classifier: head_linear(
                config.dim,
                num_labels,
                config.initializer_range,
                vb.pp("classifier"),
            )?,
            head_dropout: Dropout::new(config.seq_classif_dropout),
            num_labels,
        })
    }

    /// Inference logits of shape `(batch, num_labels)`, dropout disabled
    pub fn forward(&self, input_ids: &Tensor, padding_mask: &Tensor) -> Result<Tensor> {
        self.forward_t(input_ids, padding_mask, false)
    }

    /// Logits with dropout applied when `train` is set
    pub fn forward_t(&self, input_ids: &Tensor, padding_mask: &Tensor, train: bool) -> Result<Tensor> {
        let mut hidden = self.embeddings.forward(input_ids, train)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden, padding_mask, train)?;
        }

        let cls = hidden.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&cls)?.relu()?;
        let pooled = self.head_dropout.forward_t(&pooled, train)?;
        self.classifier.forward(&pooled)
    }

    /// Class probabilities of shape `(batch, num_labels)`
    pub fn probabilities(&self, input_ids: &Tensor, padding_mask: &Tensor) -> Result<Tensor> {
        let logits = self.forward(input_ids, padding_mask)?.detach();
        candle_nn::ops::softmax(&logits.to_dtype(DType::F32)?, D::Minus1)
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }
}
