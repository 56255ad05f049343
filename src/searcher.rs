use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use log::warn;
use uuid::Uuid;

use crate::db::{Database, crud};
use crate::encoder::Encoder;
use crate::hnsw::IndexError;
use crate::library::{LibraryIndexManager, SearchResult};
use crate::metrics;
use crate::utils;

/// 线性扫描回退的默认相似度阈值
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// 照片搜索服务
///
/// 优先走 HNSW 索引；索引不可用时回退到对全部已编码照片的精确
/// 余弦扫描，结果正确但更慢。
pub struct Searcher {
    db: Database,
    encoder: Arc<Encoder>,
    manager: Arc<LibraryIndexManager>,
    threshold: f32,
}

impl Searcher {
    pub fn new(db: Database, encoder: Arc<Encoder>, manager: Arc<LibraryIndexManager>) -> Self {
        Self { db, encoder, manager, threshold: DEFAULT_THRESHOLD }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// 用自然语言搜索照片
    ///
    /// 查询文本编码失败直接上抛，不做回退
    pub async fn search_text(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let query = self.encoder.encode_text(text).await?;
        self.search_vector(&query, k).await
    }

    /// 用查询向量搜索照片
    pub async fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let start = Instant::now();
        match self.ann_search(query, k).await {
            Ok(results) => {
                metrics::observe_search("ann", start.elapsed());
                Ok(results)
            }
            Err(e) => {
                warn!("索引搜索失败，回退到线性扫描: {e}");
                let results = self.brute_force(query, k).await?;
                metrics::observe_search("brute", start.elapsed());
                Ok(results)
            }
        }
    }

    async fn ann_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        // 按需加载：库重新打开后第一次搜索时从磁盘恢复索引
        if !self.manager.is_loaded().await && self.manager.index_exists() {
            self.manager.load().await?;
        }
        self.manager.search(query, k, self.threshold).await
    }

    /// 对所有已编码照片做精确余弦扫描
    ///
    /// 没有嵌入的照片被跳过，结果按相似度降序
    pub async fn brute_force(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let library_id = self.manager.library_id().to_string();
        let photos = crud::embedded_photos(&self.db, &library_id).await?;

        let mut results = Vec::new();
        for photo in &photos {
            let Some(embedding) = photo.embedding_vec() else {
                continue;
            };
            if embedding.len() != query.len() {
                continue;
            }
            let similarity = utils::cosine_similarity(query, &embedding);
            if similarity >= self.threshold {
                results.push(SearchResult { photo_id: Uuid::parse_str(&photo.id)?, similarity });
            }
        }
        results.sort_unstable_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        results.truncate(k);
        Ok(results)
    }
}
