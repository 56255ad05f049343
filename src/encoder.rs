use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// 向量编码器
///
/// 编码模型是外部能力，这里只关心"图片或文本进，定长向量出"。
/// async fn 的 trait 无法做成 trait object，因此用枚举分发。
pub enum Encoder {
    /// 远程编码服务
    Rest(RestEncoder),
    /// 内置的确定性编码器，用于测试和离线试运行
    Stub(StubEncoder),
}

impl Encoder {
    pub async fn encode_image(&self, path: &Path) -> Result<Vec<f32>> {
        match self {
            Encoder::Rest(e) => e.encode_image(path).await,
            Encoder::Stub(e) => e.encode_image(path).await,
        }
    }

    pub async fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            Encoder::Rest(e) => e.encode_text(text).await,
            Encoder::Stub(e) => e.encode_text(text).await,
        }
    }

    /// 输出向量的维度
    pub fn dim(&self) -> usize {
        match self {
            Encoder::Rest(e) => e.dim,
            Encoder::Stub(e) => e.dim,
        }
    }
}

#[derive(Deserialize)]
struct EncodeResponse {
    embedding: Vec<f32>,
}

/// 通过 HTTP 调用本地 CLIP 编码服务
pub struct RestEncoder {
    client: reqwest::Client,
    base_url: String,
    dim: usize,
}

impl RestEncoder {
    pub fn new(base_url: impl Into<String>, dim: usize) -> Result<Self> {
        let client = reqwest::Client::builder().build().context("创建 HTTP 客户端失败")?;
        let base_url = base_url.into();
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), dim })
    }

    pub async fn encode_image(&self, path: &Path) -> Result<Vec<f32>> {
        let resp: EncodeResponse = self
            .client
            .post(format!("{}/encode/image", self.base_url))
            .json(&serde_json::json!({ "path": path.to_string_lossy() }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("图片编码失败: {}", path.display()))?;
        self.check_dim(resp.embedding)
    }

    pub async fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        let resp: EncodeResponse = self
            .client
            .post(format!("{}/encode/text", self.base_url))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("文本编码失败")?;
        self.check_dim(resp.embedding)
    }

    fn check_dim(&self, embedding: Vec<f32>) -> Result<Vec<f32>> {
        ensure!(
            embedding.len() == self.dim,
            "编码服务返回的向量维度错误：期望 {}，实际 {}",
            self.dim,
            embedding.len()
        );
        Ok(embedding)
    }
}

/// 确定性编码器：把输入字节哈希后展开成单位向量
///
/// 相同输入总是得到相同向量，与真实模型无关，只用于测试和演示
pub struct StubEncoder {
    dim: usize,
}

impl StubEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub async fn encode_image(&self, path: &Path) -> Result<Vec<f32>> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("读取图片失败: {}", path.display()))?;
        ensure!(!data.is_empty(), "空图片文件: {}", path.display());
        Ok(self.project(&data))
    }

    pub async fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.project(text.as_bytes()))
    }

    fn project(&self, data: &[u8]) -> Vec<f32> {
        // FNV-1a 做种子，xorshift 展开
        let mut state: u64 = 0xcbf29ce484222325;
        for &b in data {
            state ^= b as u64;
            state = state.wrapping_mul(0x100000001b3);
        }
        let mut v = Vec::with_capacity(self.dim);
        for _ in 0..self.dim {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            v.push((state >> 11) as f32 / (1u64 << 53) as f32 - 0.5);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}
