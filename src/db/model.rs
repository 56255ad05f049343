use crate::utils;

/// 照片库记录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LibraryRecord {
    /// 库 ID（UUID 字符串）
    pub id: String,
    /// 库名称
    pub name: String,
    /// 照片根目录
    pub path: String,
    /// 创建时间，unix 毫秒
    pub created_at: i64,
    /// 上次索引完成时间，unix 毫秒
    pub last_indexed_at: Option<i64>,
}

/// 照片记录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PhotoRecord {
    /// 照片 ID（UUID 字符串）
    pub id: String,
    /// 所属照片库 ID
    pub library_id: String,
    /// 照片路径
    pub path: String,
    /// 文件名
    pub file_name: String,
    /// 文件大小，字节
    pub file_size: i64,
    /// 修改时间，unix 毫秒
    pub modified_at: i64,
    /// CLIP 嵌入向量，尚未编码成功时为 None
    pub embedding: Option<Vec<u8>>,
}

impl PhotoRecord {
    /// 解码嵌入向量，没有嵌入时返回 None
    pub fn embedding_vec(&self) -> Option<Vec<f32>> {
        self.embedding.as_deref().map(utils::blob_to_vec)
    }
}
