use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;
use uuid::Uuid;

use crate::cli::{SubCommandExtend, resolve_library};
use crate::config::{EncoderOptions, HnswOptions, Opts};
use crate::db::{self, crud};
use crate::library::LibraryIndexManager;

#[derive(Parser, Debug, Clone)]
pub struct RemoveCommand {
    /// 要移除的照片路径
    pub photo: PathBuf,
    /// 照片库名称或 ID
    #[arg(short, long)]
    pub library: Option<String>,
    #[command(flatten)]
    pub encoder: EncoderOptions,
    #[command(flatten)]
    pub hnsw: HnswOptions,
}

impl SubCommandExtend for RemoveCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        opts.conf_dir.ensure()?;
        let db = db::init_db(opts.conf_dir.database()).await?;
        let library = resolve_library(&db, self.library.as_deref()).await?;

        // 文件可能已经不在磁盘上了，canonicalize 失败时用原始路径查询
        let path = self.photo.canonicalize().unwrap_or_else(|_| self.photo.clone());
        let path_str = path.to_string_lossy().to_string();
        let photo = crud::find_photo_by_path(&db, &library.id, &path_str)
            .await?
            .ok_or_else(|| anyhow!("照片不存在: {path_str}"))?;

        let manager = Arc::new(LibraryIndexManager::new(
            &opts.conf_dir,
            Uuid::parse_str(&library.id)?,
            self.encoder.dim,
            (&self.hnsw).into(),
        ));
        if manager.index_exists() {
            manager.load().await?;
            manager.remove_item(Uuid::parse_str(&photo.id)?).await?;
            manager.save().await?;
        }
        crud::delete_photo(&db, &photo.id).await?;

        info!("已移除照片: {}", photo.path);
        Ok(())
    }
}
