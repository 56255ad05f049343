use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ConfDir;
use crate::hnsw::{HnswIndex, HnswParams, IndexError};
use crate::mapping::IdentityMap;

/// 搜索结果
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// 照片 ID
    pub photo_id: Uuid,
    /// 余弦相似度，1 表示方向完全一致
    pub similarity: f32,
}

/// 单个照片库的索引状态：HNSW 索引 + 标签映射
struct LibraryIndex {
    index: HnswIndex,
    mapping: IdentityMap,
}

impl LibraryIndex {
    /// 容量不足时翻倍扩容
    fn ensure_capacity(&self, incoming: usize) -> Result<(), IndexError> {
        let needed = self.index.current_count() + incoming;
        let capacity = self.index.capacity();
        if needed > capacity {
            self.index.resize((capacity * 2).max(needed))?;
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize, threshold: f32) -> Result<Vec<SearchResult>, IndexError> {
        let mut results = Vec::new();
        for (label, distance) in self.index.search(query, k)? {
            // 映射中不存在的标签说明该向量已失效，直接丢弃
            let Some(photo_id) = self.mapping.photo_id_for(label) else {
                continue;
            };
            let similarity = 1.0 - distance;
            if similarity >= threshold {
                results.push(SearchResult { photo_id, similarity });
            }
        }
        Ok(results)
    }
}

/// 单个照片库的索引管理器
///
/// 持有该库的全部可变状态，写操作互斥执行，搜索之间可以并发，
/// 但不会与任何写操作交错。不同照片库的管理器互不阻塞。
pub struct LibraryIndexManager {
    library_id: Uuid,
    dim: usize,
    params: HnswParams,
    index_path: PathBuf,
    mapping_path: PathBuf,
    inner: RwLock<Option<LibraryIndex>>,
}

impl LibraryIndexManager {
    pub fn new(conf_dir: &ConfDir, library_id: Uuid, dim: usize, params: HnswParams) -> Self {
        Self {
            index_path: conf_dir.index_file(&library_id),
            mapping_path: conf_dir.mapping_file(&library_id),
            library_id,
            dim,
            params,
            inner: RwLock::new(None),
        }
    }

    pub fn library_id(&self) -> Uuid {
        self.library_id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// 索引文件是否存在于磁盘上，与内存状态无关
    pub fn index_exists(&self) -> bool {
        self.index_path.exists()
    }

    pub async fn is_loaded(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// 当前索引中的照片数量，未初始化时为 0
    pub async fn current_count(&self) -> usize {
        self.inner.read().await.as_ref().map(|s| s.mapping.len()).unwrap_or(0)
    }

    /// 初始化一个全新索引，索引、映射和标签计数器一并重置
    pub async fn initialize_index(&self, max_elements: usize) -> Result<(), IndexError> {
        let mut guard = self.inner.write().await;
        let start = Instant::now();
        info!(
            "初始化索引: max_elements={}, m={}, ef_construction={}",
            max_elements, self.params.m, self.params.ef_construction
        );
        let index = HnswIndex::new(self.dim, max_elements, self.params)?;
        *guard = Some(LibraryIndex { index, mapping: IdentityMap::new() });
        debug!("索引初始化完成，耗时 {:.3}s", start.elapsed().as_secs_f32());
        Ok(())
    }

    /// 添加一张照片的嵌入向量
    ///
    /// 照片已在索引中时替换旧向量，绝不产生重复条目
    pub async fn add_item(&self, embedding: &[f32], photo_id: Uuid) -> Result<(), IndexError> {
        let mut guard = self.inner.write().await;
        let state = guard.as_mut().ok_or(IndexError::NotInitialized)?;
        if embedding.len() != self.dim {
            return Err(IndexError::DimensionMismatch { expected: self.dim, got: embedding.len() });
        }

        if let Some(old) = state.mapping.unbind(&photo_id) {
            state.index.soft_delete(old);
        }
        state.ensure_capacity(1)?;
        let label = state.mapping.alloc_label();
        state.index.insert(embedding, label)?;
        state.mapping.bind(photo_id, label);
        Ok(())
    }

    /// 批量添加照片嵌入向量
    ///
    /// 先整体校验参数和维度，单个坏向量会在修改任何状态前中止整批
    pub async fn add_items(
        &self,
        embeddings: &[Vec<f32>],
        photo_ids: &[Uuid],
    ) -> Result<(), IndexError> {
        let mut guard = self.inner.write().await;
        let state = guard.as_mut().ok_or(IndexError::NotInitialized)?;
        if embeddings.len() != photo_ids.len() {
            return Err(IndexError::InvalidArgument(format!(
                "向量数量 {} 与照片数量 {} 不一致",
                embeddings.len(),
                photo_ids.len()
            )));
        }
        for embedding in embeddings {
            if embedding.len() != self.dim {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dim,
                    got: embedding.len(),
                });
            }
        }

        let start = Instant::now();
        state.ensure_capacity(embeddings.len())?;
        let labels: Vec<u64> = photo_ids.iter().map(|_| state.mapping.alloc_label()).collect();
        state.index.insert_batch(embeddings, &labels)?;
        for (photo_id, &label) in photo_ids.iter().zip(&labels) {
            // 重复索引的照片在这里替换旧向量
            if let Some(old) = state.mapping.unbind(photo_id) {
                state.index.soft_delete(old);
            }
            state.mapping.bind(*photo_id, label);
        }
        debug!("批量添加 {} 个向量，耗时 {:.3}s", embeddings.len(), start.elapsed().as_secs_f32());
        Ok(())
    }

    /// 从索引中移除一张照片，照片不存在或索引未初始化时静默跳过
    pub async fn remove_item(&self, photo_id: Uuid) -> Result<(), IndexError> {
        let mut guard = self.inner.write().await;
        let Some(state) = guard.as_mut() else {
            return Ok(());
        };
        if let Some(label) = state.mapping.unbind(&photo_id) {
            state.index.soft_delete(label);
        }
        Ok(())
    }

    /// 搜索最相似的 k 张照片，相似度低于 threshold 的结果被过滤，
    /// 返回结果按相似度降序排列
    pub async fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let guard = self.inner.read().await;
        let state = guard.as_ref().ok_or(IndexError::NotInitialized)?;
        state.search(query, k, threshold)
    }

    /// `search` 的批量形式，每个查询独立，结果顺序与查询顺序一致
    pub async fn search_batch(
        &self,
        queries: &[Vec<f32>],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Vec<SearchResult>>, IndexError> {
        let guard = self.inner.read().await;
        let state = guard.as_ref().ok_or(IndexError::NotInitialized)?;
        queries.iter().map(|query| state.search(query, k, threshold)).collect()
    }

    /// 扩容索引，映射状态不受影响
    pub async fn resize(&self, new_max_elements: usize) -> Result<(), IndexError> {
        let guard = self.inner.write().await;
        let state = guard.as_ref().ok_or(IndexError::NotInitialized)?;
        state.index.resize(new_max_elements)
    }

    /// 持久化索引和映射
    ///
    /// 先写入临时文件再原子替换，中途失败不会破坏旧文件
    pub async fn save(&self) -> Result<(), IndexError> {
        let guard = self.inner.write().await;
        let state = guard.as_ref().ok_or(IndexError::NotInitialized)?;
        let start = Instant::now();

        let index_tmp = tmp_path(&self.index_path);
        state.index.save(&index_tmp)?;
        std::fs::rename(&index_tmp, &self.index_path)
            .map_err(|e| IndexError::Save(e.to_string()))?;

        let mapping_tmp = tmp_path(&self.mapping_path);
        state.mapping.save(&mapping_tmp).map_err(|e| IndexError::Save(e.to_string()))?;
        std::fs::rename(&mapping_tmp, &self.mapping_path)
            .map_err(|e| IndexError::Save(e.to_string()))?;

        debug!(
            "索引已保存至 {}，耗时 {:.3}s",
            self.index_path.display(),
            start.elapsed().as_secs_f32()
        );
        Ok(())
    }

    /// 从磁盘加载索引和映射
    ///
    /// 两个文件缺一不可，部分加载绝不视为成功
    pub async fn load(&self) -> Result<(), IndexError> {
        let mut guard = self.inner.write().await;
        let start = Instant::now();
        if !self.index_path.exists() {
            return Err(IndexError::Load(format!("索引文件不存在: {}", self.index_path.display())));
        }
        if !self.mapping_path.exists() {
            return Err(IndexError::Load(format!(
                "映射文件不存在: {}",
                self.mapping_path.display()
            )));
        }

        let index = HnswIndex::load(&self.index_path, self.dim, self.params)?;
        let mapping = IdentityMap::load(&self.mapping_path).map_err(|e| IndexError::Load(e.to_string()))?;
        if index.current_count() != mapping.len() {
            warn!("索引与映射数量不一致: {} != {}", index.current_count(), mapping.len());
        }
        let count = mapping.len();
        *guard = Some(LibraryIndex { index, mapping });
        info!("索引加载完成: {} 个向量，耗时 {:.3}s", count, start.elapsed().as_secs_f32());
        Ok(())
    }

    /// 清除索引：内存状态与磁盘文件一并删除
    pub async fn clear(&self) -> anyhow::Result<()> {
        let mut guard = self.inner.write().await;
        *guard = None;
        for path in [&self.index_path, &self.mapping_path] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(e.into());
                }
            }
        }
        info!("已清除照片库 {} 的索引", self.library_id);
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".tmp");
    PathBuf::from(p)
}
