use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 照片 ID 与索引标签之间的双向映射
///
/// 两个方向的表在同一次操作中同步修改，任何时刻每张照片至多对应一个标签。
/// `next_label` 单调递增，标签不会重新分配给其他照片。
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IdentityMap {
    label_to_photo: HashMap<u64, Uuid>,
    photo_to_label: HashMap<Uuid, u64>,
    next_label: u64,
}

/// 映射文件的持久化格式，键值都存为字符串以保持可读和向前兼容
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappingRecord {
    label_to_photo_id: HashMap<String, String>,
    photo_id_to_label: HashMap<String, String>,
    next_label: u64,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配下一个标签
    pub fn alloc_label(&mut self) -> u64 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// 绑定照片与标签，照片已有绑定时先解除旧绑定
    pub fn bind(&mut self, photo_id: Uuid, label: u64) {
        if let Some(old) = self.photo_to_label.insert(photo_id, label) {
            self.label_to_photo.remove(&old);
        }
        self.label_to_photo.insert(label, photo_id);
    }

    /// 按照片解除绑定，返回对应的标签，不存在时返回 None
    pub fn unbind(&mut self, photo_id: &Uuid) -> Option<u64> {
        let label = self.photo_to_label.remove(photo_id)?;
        self.label_to_photo.remove(&label);
        Some(label)
    }

    /// 按标签解除绑定，返回对应的照片 ID
    pub fn unbind_label(&mut self, label: u64) -> Option<Uuid> {
        let photo_id = self.label_to_photo.remove(&label)?;
        self.photo_to_label.remove(&photo_id);
        Some(photo_id)
    }

    pub fn label_for(&self, photo_id: &Uuid) -> Option<u64> {
        self.photo_to_label.get(photo_id).copied()
    }

    pub fn photo_id_for(&self, label: u64) -> Option<Uuid> {
        self.label_to_photo.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.photo_to_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photo_to_label.is_empty()
    }

    /// 当前绑定的所有标签
    pub fn labels(&self) -> impl Iterator<Item = u64> + '_ {
        self.label_to_photo.keys().copied()
    }

    pub fn next_label(&self) -> u64 {
        self.next_label
    }

    /// 保存映射到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let record = MappingRecord {
            label_to_photo_id: self
                .label_to_photo
                .iter()
                .map(|(label, id)| (label.to_string(), id.to_string()))
                .collect(),
            photo_id_to_label: self
                .photo_to_label
                .iter()
                .map(|(id, label)| (id.to_string(), label.to_string()))
                .collect(),
            next_label: self.next_label,
        };
        let data = serde_json::to_vec(&record)?;
        std::fs::write(path, data).with_context(|| format!("写入映射文件失败: {}", path.display()))?;
        Ok(())
    }

    /// 从文件加载映射，`load(save())` 必须精确复原
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("读取映射文件失败: {}", path.display()))?;
        let record: MappingRecord = serde_json::from_slice(&data)?;

        let mut map = Self { next_label: record.next_label, ..Default::default() };
        for (label, id) in &record.label_to_photo_id {
            map.label_to_photo.insert(label.parse()?, Uuid::parse_str(id)?);
        }
        for (id, label) in &record.photo_id_to_label {
            map.photo_to_label.insert(Uuid::parse_str(id)?, label.parse()?);
        }
        Ok(map)
    }
}
