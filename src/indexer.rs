use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::UNIX_EPOCH;

use anyhow::{Result, ensure};
use futures::StreamExt;
use indicatif::ProgressBar;
use log::{error, info};
use regex::Regex;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::db::{Database, LibraryRecord, PhotoRecord, crud};
use crate::encoder::Encoder;
use crate::library::LibraryIndexManager;
use crate::utils;

/// 每个索引写入子批的大小，每写完一批就落盘一次
const INDEX_ADD_BATCH: usize = 256;
/// 新建索引的最小容量
const MIN_INDEX_CAPACITY: usize = 1000;

/// 根据照片总量选择编码批大小：
/// 小相册用小批保证进度反馈及时，大相册用大批减少开销
fn encode_batch_size(total: usize) -> usize {
    match total {
        0..=100 => 10,
        101..=1000 => 32,
        _ => 128,
    }
}

fn encode_concurrency() -> usize {
    num_cpus::get().clamp(2, 16)
}

/// 取消标志，在批与批之间检查
///
/// 取消后磁盘状态停留在最后一个完整子批落盘时的样子
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 一次索引任务的统计结果
#[derive(Debug, Default)]
pub struct IndexReport {
    /// 扫描到的照片数量
    pub scanned: usize,
    /// 编码成功的数量
    pub encoded: usize,
    /// 编码失败的数量，这些照片仍会入库但搜索不到
    pub failed: usize,
    /// 写入索引的数量
    pub indexed: usize,
    /// 是否中途被取消
    pub cancelled: bool,
}

/// 扫描到的照片文件
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub modified_at: i64,
}

/// 照片库批量索引器
///
/// 整库重建：扫描目录，逐批编码，然后重建索引。
/// 编码是唯一并行的阶段，索引写入始终串行。
pub struct Indexer {
    db: Database,
    encoder: Arc<Encoder>,
    manager: Arc<LibraryIndexManager>,
    cancel: CancelFlag,
}

impl Indexer {
    pub fn new(db: Database, encoder: Arc<Encoder>, manager: Arc<LibraryIndexManager>) -> Self {
        Self { db, encoder, manager, cancel: CancelFlag::new() }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// 扫描目录，列出所有符合后缀的照片文件
    ///
    /// # Arguments
    ///
    /// * `root` - 照片根目录
    /// * `suffix` - 文件后缀名，多个后缀用逗号分隔，大小写不敏感
    pub fn scan(root: &Path, suffix: &str) -> Result<Vec<PhotoFile>> {
        let re = Regex::new(&format!("(?i)^({})$", suffix.replace(',', "|")))?;
        let mut files = vec![];
        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(ext) = path.extension() else {
                continue;
            };
            if !re.is_match(&ext.to_string_lossy()) {
                continue;
            }
            let metadata = entry.metadata()?;
            let modified_at = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or_default();
            files.push(PhotoFile {
                file_name: path.file_name().unwrap_or_default().to_string_lossy().to_string(),
                path: path.to_path_buf(),
                file_size: metadata.len(),
                modified_at,
            });
        }
        Ok(files)
    }

    /// 全量重建照片库的索引
    ///
    /// 旧的照片记录和索引状态会被整体替换。单张照片编码失败不会中止
    /// 任务，索引构建失败只会降级（搜索回退到线性扫描），入库的照片
    /// 记录始终有效。
    pub async fn index_library(
        &self,
        library: &LibraryRecord,
        suffix: &str,
        pb: &ProgressBar,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let root = Path::new(&library.path);
        ensure!(root.exists(), "照片目录不存在: {}", root.display());

        info!("开始扫描目录: {}", root.display());
        let files = Self::scan(root, suffix)?;
        report.scanned = files.len();
        info!("扫描完成，共 {} 张照片", files.len());
        pb.set_length(files.len() as u64);

        // 全量重建，旧记录直接清掉
        crud::clear_photos(&self.db, &library.id).await?;

        let batch_size = encode_batch_size(files.len());
        for chunk in files.chunks(batch_size) {
            if self.cancel.is_cancelled() {
                info!("索引任务被取消");
                report.cancelled = true;
                return Ok(report);
            }

            let encoded = futures::stream::iter(chunk.iter().cloned())
                .map(|file| {
                    let encoder = self.encoder.clone();
                    async move {
                        let encoded = encoder.encode_image(&file.path).await;
                        (file, encoded)
                    }
                })
                .buffer_unordered(encode_concurrency())
                .collect::<Vec<_>>()
                .await;

            // 编码结果串行落库
            for (file, result) in encoded {
                let embedding = match result {
                    Ok(v) => {
                        report.encoded += 1;
                        Some(utils::vec_to_blob(&v))
                    }
                    Err(e) => {
                        report.failed += 1;
                        pb.println(format!("编码失败: {}: {e:#}", file.path.display()));
                        None
                    }
                };
                let photo = PhotoRecord {
                    id: Uuid::new_v4().to_string(),
                    library_id: library.id.clone(),
                    path: file.path.to_string_lossy().to_string(),
                    file_name: file.file_name.clone(),
                    file_size: file.file_size as i64,
                    modified_at: file.modified_at,
                    embedding,
                };
                crud::add_photo(&self.db, &photo).await?;
                pb.inc(1);
            }
        }

        match self.build_index(library, &mut report).await {
            Ok(()) => {
                if !report.cancelled {
                    crud::set_last_indexed(&self.db, &library.id, utils::unix_millis()).await?;
                }
            }
            Err(e) => error!("索引构建失败，搜索将回退到线性扫描: {e:#}"),
        }
        Ok(report)
    }

    async fn build_index(&self, library: &LibraryRecord, report: &mut IndexReport) -> Result<()> {
        let photos = crud::embedded_photos(&self.db, &library.id).await?;
        // 预留 20% 余量，避免后续单张补增时频繁扩容
        let capacity = (photos.len() + photos.len() / 5).max(MIN_INDEX_CAPACITY);
        self.manager.initialize_index(capacity).await?;

        for chunk in photos.chunks(INDEX_ADD_BATCH) {
            if self.cancel.is_cancelled() {
                info!("索引构建被取消，磁盘保留最后一次落盘的状态");
                report.cancelled = true;
                return Ok(());
            }
            let mut embeddings = Vec::with_capacity(chunk.len());
            let mut photo_ids = Vec::with_capacity(chunk.len());
            for photo in chunk {
                let Some(v) = photo.embedding_vec() else {
                    continue;
                };
                embeddings.push(v);
                photo_ids.push(Uuid::parse_str(&photo.id)?);
            }
            self.manager.add_items(&embeddings, &photo_ids).await?;
            self.manager.save().await?;
            report.indexed += photo_ids.len();
        }

        info!("索引构建完成，共 {} 个向量", report.indexed);
        Ok(())
    }
}
