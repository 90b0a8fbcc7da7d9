//! Llama transformer building blocks.
//!
//! Pre-norm decoder layers with grouped-query attention, rotary position
//! embeddings and a SwiGLU feed-forward block. Every forward pass recomputes
//! the whole sequence: there is no KV cache, so a model can be reused across
//! unrelated prompts without clearing anything.

use candle_core::{DType, Device, Module, Result, Tensor, D};
use candle_nn::{linear_no_bias, Init, Linear, VarBuilder};

use super::llama::LlamaConfig;

/// Root-mean-square layer normalization.
///
/// `output = x / sqrt(mean(x^2) + eps) * weight`
#[derive(Debug, Clone)]
pub struct RmsNorm {
    weight: Tensor,
    eps: f64,
}

impl RmsNorm {
    pub fn new(hidden_size: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(hidden_size, "weight", Init::Const(1.0))?;
        Ok(Self { weight, eps })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let dtype = x.dtype();
        // Accumulate in f32 so half-precision weights don't overflow.
        let x = x.to_dtype(DType::F32)?;
        let variance = x.sqr()?.mean_keepdim(D::Minus1)?;
        let normalized = x.broadcast_div(&(variance + self.eps)?.sqrt()?)?;
        normalized.to_dtype(dtype)?.broadcast_mul(&self.weight)
    }
}

/// Precomputed rotary position embedding tables.
#[derive(Debug, Clone)]
pub struct RotaryEmbedding {
    /// [max_seq_len, head_dim]
    cos: Tensor,
    /// [max_seq_len, head_dim]
    sin: Tensor,
}

impl RotaryEmbedding {
    pub fn new(
        head_dim: usize,
        max_seq_len: usize,
        theta: f64,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        if head_dim % 2 != 0 {
            return Err(candle_core::Error::Msg(format!(
                "rotary head_dim must be even, got {head_dim}"
            )));
        }
        let inv_freq: Vec<f32> = (0..head_dim / 2)
            .map(|i| 1.0 / theta.powf(2.0 * i as f64 / head_dim as f64) as f32)
            .collect();
        let inv_freq = Tensor::new(inv_freq.as_slice(), device)?;
        let positions: Vec<f32> = (0..max_seq_len).map(|p| p as f32).collect();
        let positions = Tensor::new(positions.as_slice(), device)?.reshape((max_seq_len, 1))?;

        let freqs = positions.broadcast_mul(&inv_freq)?;
        let freqs = Tensor::cat(&[&freqs, &freqs], 1)?;

        Ok(Self {
            cos: freqs.cos()?.to_dtype(dtype)?,
            sin: freqs.sin()?.to_dtype(dtype)?,
        })
    }

    /// Rotates `x` of shape [batch, seq_len, heads, head_dim] starting at position 0.
    pub fn apply(&self, x: &Tensor) -> Result<Tensor> {
        let (_, seq_len, _, _) = x.dims4()?;
        let cos = self.cos.narrow(0, 0, seq_len)?.unsqueeze(0)?.unsqueeze(2)?;
        let sin = self.sin.narrow(0, 0, seq_len)?.unsqueeze(0)?.unsqueeze(2)?;

        let half = x.dim(D::Minus1)? / 2;
        let x1 = x.narrow(D::Minus1, 0, half)?;
        let x2 = x.narrow(D::Minus1, half, half)?;
        let rotated = Tensor::cat(&[&x2.neg()?, &x1], D::Minus1)?;

        x.broadcast_mul(&cos)? + rotated.broadcast_mul(&sin)?
    }
}

/// Grouped-query causal self-attention.
#[derive(Debug, Clone)]
pub struct Attention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    o_proj: Linear,
    rotary: RotaryEmbedding,
    num_heads: usize,
    num_kv_heads: usize,
    head_dim: usize,
}

impl Attention {
    pub fn new(config: &LlamaConfig, vb: VarBuilder) -> Result<Self> {
        let hidden = config.hidden_size;
        let num_heads = config.num_attention_heads;
        let num_kv_heads = config.num_kv_heads();
        let head_dim = config.head_dim();

        Ok(Self {
            q_proj: linear_no_bias(hidden, num_heads * head_dim, vb.pp("q_proj"))?,
            k_proj: linear_no_bias(hidden, num_kv_heads * head_dim, vb.pp("k_proj"))?,
            v_proj: linear_no_bias(hidden, num_kv_heads * head_dim, vb.pp("v_proj"))?,
            o_proj: linear_no_bias(num_heads * head_dim, hidden, vb.pp("o_proj"))?,
            rotary: RotaryEmbedding::new(
                head_dim,
                config.max_position_embeddings,
                config.rope_theta,
                vb.dtype(),
                vb.device(),
            )?,
            num_heads,
            num_kv_heads,
            head_dim,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, _) = x.dims3()?;

        let q = self
            .q_proj
            .forward(x)?
            .reshape((batch, seq_len, self.num_heads, self.head_dim))?;
        let k = self
            .k_proj
            .forward(x)?
            .reshape((batch, seq_len, self.num_kv_heads, self.head_dim))?;
        let v = self
            .v_proj
            .forward(x)?
            .reshape((batch, seq_len, self.num_kv_heads, self.head_dim))?;

        let q = self.rotary.apply(&q)?;
        let k = self.rotary.apply(&k)?;
        let k = self.repeat_kv(&k)?;
        let v = self.repeat_kv(&v)?;

        // [batch, heads, seq_len, head_dim]
        let q = q.transpose(1, 2)?.contiguous()?;
        let k = k.transpose(1, 2)?.contiguous()?;
        let v = v.transpose(1, 2)?.contiguous()?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = (q.matmul(&k.transpose(D::Minus2, D::Minus1)?)? * scale)?;
        let mask = causal_mask(seq_len, x.device())?.to_dtype(scores.dtype())?;
        let weights = candle_nn::ops::softmax_last_dim(&scores.broadcast_add(&mask)?)?;

        let out = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, self.num_heads * self.head_dim))?;
        self.o_proj.forward(&out)
    }

    /// [batch, seq, kv_heads, d] -> [batch, seq, heads, d]
    fn repeat_kv(&self, x: &Tensor) -> Result<Tensor> {
        let n_rep = self.num_heads / self.num_kv_heads;
        if n_rep == 1 {
            return Ok(x.clone());
        }
        let (batch, seq_len, kv_heads, head_dim) = x.dims4()?;
        x.unsqueeze(3)?
            .expand((batch, seq_len, kv_heads, n_rep, head_dim))?
            .reshape((batch, seq_len, self.num_heads, head_dim))
    }
}

/// [1, 1, seq_len, seq_len] additive mask, -inf above the diagonal.
fn causal_mask(seq_len: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<f32> = (0..seq_len)
        .flat_map(|q| (0..seq_len).map(move |k| if k > q { f32::NEG_INFINITY } else { 0.0 }))
        .collect();
    Tensor::from_vec(mask, (1, 1, seq_len, seq_len), device)
}

/// SwiGLU feed-forward: `down(silu(gate(x)) * up(x))`.
#[derive(Debug, Clone)]
pub struct Mlp {
    gate_proj: Linear,
    up_proj: Linear,
    down_proj: Linear,
}

impl Mlp {
    pub fn new(hidden_size: usize, intermediate_size: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            gate_proj: linear_no_bias(hidden_size, intermediate_size, vb.pp("gate_proj"))?,
            up_proj: linear_no_bias(hidden_size, intermediate_size, vb.pp("up_proj"))?,
            down_proj: linear_no_bias(intermediate_size, hidden_size, vb.pp("down_proj"))?,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let gate = candle_nn::ops::silu(&self.gate_proj.forward(x)?)?;
        let up = self.up_proj.forward(x)?;
        self.down_proj.forward(&(gate * up)?)
    }
}

/// Pre-norm decoder layer: attention and MLP, each with a residual.
#[derive(Debug, Clone)]
pub struct DecoderLayer {
    input_layernorm: RmsNorm,
    self_attn: Attention,
    post_attention_layernorm: RmsNorm,
    mlp: Mlp,
}

impl DecoderLayer {
    pub fn new(config: &LlamaConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            input_layernorm: RmsNorm::new(
                config.hidden_size,
                config.rms_norm_eps,
                vb.pp("input_layernorm"),
            )?,
            self_attn: Attention::new(config, vb.pp("self_attn"))?,
            post_attention_layernorm: RmsNorm::new(
                config.hidden_size,
                config.rms_norm_eps,
                vb.pp("post_attention_layernorm"),
            )?,
            mlp: Mlp::new(config.hidden_size, config.intermediate_size, vb.pp("mlp"))?,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let residual = x;
        let h = self.self_attn.forward(&self.input_layernorm.forward(x)?)?;
        let h = (residual + h)?;
        let residual = &h;
        let out = self.mlp.forward(&self.post_attention_layernorm.forward(&h)?)?;
        residual + out
    }
}
