use std::time::{SystemTime, UNIX_EPOCH};

use indicatif::ProgressStyle;

/// 计算两个向量的余弦相似度，1 表示方向完全一致，0 表示正交
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= 0.0 {
        return 0.0;
    }
    dot / denom
}

/// 将嵌入向量编码为数据库 BLOB
pub fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(v).to_vec()
}

/// 从数据库 BLOB 还原嵌入向量，长度非法时返回空向量
pub fn blob_to_vec(b: &[u8]) -> Vec<f32> {
    if b.len() % 4 != 0 {
        return vec![];
    }
    bytemuck::pod_collect_to_vec(b)
}

/// 当前 unix 时间戳，单位毫秒
pub fn unix_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap()
    .progress_chars("#>-")
}
