use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::AppError;
use crate::cli::server::ServerCommand;
use crate::config::{ConfDir, SearchOptions};
use crate::db::Database;
use crate::encoder::Encoder;
use crate::hnsw::HnswParams;
use crate::library::LibraryIndexManager;

/// 应用状态
pub struct AppState {
    /// 数据库连接
    pub db: Database,
    /// 向量编码器
    pub encoder: Arc<Encoder>,
    /// 配置目录
    pub conf_dir: ConfDir,
    /// HNSW 参数
    pub hnsw: HnswParams,
    /// 搜索配置选项
    pub search: SearchOptions,
    /// 鉴权 token
    pub token: String,
    /// 每个照片库一个索引管理器，按需创建
    managers: RwLock<HashMap<Uuid, Arc<LibraryIndexManager>>>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(db: Database, encoder: Encoder, conf_dir: ConfDir, opts: ServerCommand) -> Arc<Self> {
        Arc::new(AppState {
            db,
            encoder: Arc::new(encoder),
            conf_dir,
            hnsw: (&opts.hnsw).into(),
            search: opts.search,
            token: opts.token,
            managers: RwLock::new(HashMap::new()),
        })
    }

    /// 取出指定照片库的索引管理器，不存在时创建
    ///
    /// 管理器本身只在首次搜索时从磁盘按需加载索引
    pub async fn manager(&self, library_id: Uuid) -> Arc<LibraryIndexManager> {
        if let Some(manager) = self.managers.read().await.get(&library_id) {
            return manager.clone();
        }
        let mut guard = self.managers.write().await;
        guard
            .entry(library_id)
            .or_insert_with(|| {
                Arc::new(LibraryIndexManager::new(
                    &self.conf_dir,
                    library_id,
                    self.encoder.dim(),
                    self.hnsw,
                ))
            })
            .clone()
    }

    /// 校验请求的鉴权 token
    pub fn check_token(&self, token: &str) -> Result<(), AppError> {
        if token != self.token {
            return Err(AppError::unauthorized("无效的 token"));
        }
        Ok(())
    }
}
