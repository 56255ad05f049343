use std::path::Path;

use thiserror::Error;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

/// 索引操作错误
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("索引尚未初始化")]
    NotInitialized,
    #[error("向量维度不匹配：期望 {expected}，实际 {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("参数错误：{0}")]
    InvalidArgument(String),
    #[error("索引初始化失败：{0}")]
    Initialization(String),
    #[error("添加向量失败：{0}")]
    AddItem(String),
    #[error("批量添加向量失败：{0}")]
    BatchInsert(String),
    #[error("搜索失败：{0}")]
    Search(String),
    #[error("索引扩容失败：{0}")]
    Resize(String),
    #[error("保存索引失败：{0}")]
    Save(String),
    #[error("加载索引失败：{0}")]
    Load(String),
}

/// HNSW 图参数
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// 每个节点的双向连接数，越大越准确，内存和构建时间也越高
    pub m: usize,
    /// 构建时的动态候选列表大小
    pub ef_construction: usize,
    /// 查询时的搜索宽度
    pub ef: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self { m: 16, ef_construction: 200, ef: 100 }
    }
}

/// 基于余弦距离的 HNSW 向量索引
///
/// 距离定义为 `1 - 余弦相似度`，范围 [0, 2]
pub struct HnswIndex {
    index: Index,
    dim: usize,
}

impl HnswIndex {
    /// 新建一个空索引
    ///
    /// # Arguments
    ///
    /// * `dim` - 向量维度
    /// * `max_elements` - 初始容量
    /// * `params` - HNSW 图参数
    pub fn new(dim: usize, max_elements: usize, params: HnswParams) -> Result<Self, IndexError> {
        let options = IndexOptions {
            dimensions: dim,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: params.m,
            expansion_add: params.ef_construction,
            expansion_search: params.ef,
            ..Default::default()
        };
        let index = Index::new(&options).map_err(|e| IndexError::Initialization(e.to_string()))?;
        index.reserve(max_elements).map_err(|e| IndexError::Initialization(e.to_string()))?;
        Ok(Self { index, dim })
    }

    /// 从文件加载索引，维度不一致时报错
    pub fn load(path: &Path, dim: usize, params: HnswParams) -> Result<Self, IndexError> {
        let s = Self::new(dim, 0, params)?;
        let path = path.to_str().ok_or_else(|| IndexError::Load("非法的索引文件路径".to_string()))?;
        s.index.load(path).map_err(|e| IndexError::Load(e.to_string()))?;
        if s.index.dimensions() != dim {
            return Err(IndexError::DimensionMismatch { expected: dim, got: s.index.dimensions() });
        }
        s.set_ef(params.ef);
        Ok(s)
    }

    /// 保存索引到文件
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let path = path.to_str().ok_or_else(|| IndexError::Save("非法的索引文件路径".to_string()))?;
        self.index.save(path).map_err(|e| IndexError::Save(e.to_string()))
    }

    /// 调整查询时的搜索宽度，只影响精度和速度，不影响已有数据
    pub fn set_ef(&self, ef: usize) {
        self.index.change_expansion_search(ef);
    }

    /// 添加一个向量
    pub fn insert(&self, vector: &[f32], label: u64) -> Result<(), IndexError> {
        self.check_dim(vector.len())?;
        self.index.add(label, vector).map_err(|e| IndexError::AddItem(e.to_string()))
    }

    /// 批量添加向量，要么全部成功，要么回滚已添加的部分
    pub fn insert_batch(&self, vectors: &[Vec<f32>], labels: &[u64]) -> Result<(), IndexError> {
        if vectors.len() != labels.len() {
            return Err(IndexError::InvalidArgument(format!(
                "向量数量 {} 与标签数量 {} 不一致",
                vectors.len(),
                labels.len()
            )));
        }
        for vector in vectors {
            self.check_dim(vector.len())?;
        }
        for (i, (vector, &label)) in vectors.iter().zip(labels).enumerate() {
            if let Err(e) = self.index.add(label, vector) {
                for &added in &labels[..i] {
                    let _ = self.index.remove(added);
                }
                return Err(IndexError::BatchInsert(e.to_string()));
            }
        }
        Ok(())
    }

    /// 软删除一个标签，之后的搜索不再返回它，槽位可被复用
    ///
    /// 标签不存在时静默跳过
    pub fn soft_delete(&self, label: u64) {
        if self.index.contains(label) {
            let _ = self.index.remove(label);
        }
    }

    /// 搜索最近的 k 个向量，返回 (标签, 距离)，按距离升序
    ///
    /// 空索引返回空结果而非错误
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>, IndexError> {
        self.check_dim(query.len())?;
        let count = self.index.size();
        if count == 0 {
            return Ok(vec![]);
        }
        let k = k.min(count);
        let matches = self.index.search(query, k).map_err(|e| IndexError::Search(e.to_string()))?;
        Ok(matches.keys.into_iter().zip(matches.distances).collect())
    }

    /// `search` 的批量形式，结果顺序与查询顺序一致
    pub fn search_batch(
        &self,
        queries: &[Vec<f32>],
        k: usize,
    ) -> Result<Vec<Vec<(u64, f32)>>, IndexError> {
        queries.iter().map(|query| self.search(query, k)).collect()
    }

    /// 扩容到新的最大容量，不会重建已有的图连接
    ///
    /// 缩容到当前元素数量以下会报错
    pub fn resize(&self, new_max_elements: usize) -> Result<(), IndexError> {
        if new_max_elements < self.index.size() {
            return Err(IndexError::Resize(format!(
                "新容量 {} 小于当前元素数量 {}",
                new_max_elements,
                self.index.size()
            )));
        }
        self.index.reserve(new_max_elements).map_err(|e| IndexError::Resize(e.to_string()))
    }

    /// 当前元素数量
    pub fn current_count(&self) -> usize {
        self.index.size()
    }

    /// 当前容量
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    /// 向量维度
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn check_dim(&self, got: usize) -> Result<(), IndexError> {
        if got != self.dim {
            return Err(IndexError::DimensionMismatch { expected: self.dim, got });
        }
        Ok(())
    }
}
