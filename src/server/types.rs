use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// 搜索请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// 照片库 ID，只有一个库时可省略
    pub library_id: Option<Uuid>,
    /// 自然语言查询
    pub query: String,
    /// 返回结果数量
    pub count: Option<usize>,
    /// 最低相似度阈值
    pub threshold: Option<f32>,
}

/// 单条搜索结果
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchHit {
    /// 照片 ID
    pub photo_id: Uuid,
    /// 照片路径
    pub path: String,
    /// 余弦相似度
    pub similarity: f32,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 按相似度降序排列的结果
    pub result: Vec<SearchHit>,
}

/// 重新加载索引的参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReloadRequest {
    /// 照片库 ID，只有一个库时可省略
    pub library_id: Option<Uuid>,
}

/// 照片库信息
#[derive(Debug, Serialize, ToSchema)]
pub struct LibraryInfo {
    /// 库 ID
    pub id: String,
    /// 库名称
    pub name: String,
    /// 照片根目录
    pub path: String,
    /// 照片总数
    pub photos: i64,
    /// 已编码的照片数量
    pub embedded: i64,
    /// 索引文件是否存在
    pub index_exists: bool,
    /// 上次索引完成时间，unix 毫秒
    pub last_indexed_at: Option<i64>,
}
