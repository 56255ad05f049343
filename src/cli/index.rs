use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use uuid::Uuid;

use crate::cli::SubCommandExtend;
use crate::config::{EncoderOptions, HnswOptions, Opts};
use crate::db::{self, LibraryRecord, crud};
use crate::indexer::Indexer;
use crate::library::LibraryIndexManager;
use crate::utils::{pb_style, unix_millis};

#[derive(Parser, Debug, Clone)]
pub struct IndexCommand {
    /// 照片所在目录
    pub path: PathBuf,
    /// 照片库名称，默认取目录名
    #[arg(long)]
    pub name: Option<String>,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png,heic,heif,gif,tiff,tif,bmp,webp")]
    pub suffix: String,
    #[command(flatten)]
    pub encoder: EncoderOptions,
    #[command(flatten)]
    pub hnsw: HnswOptions,
}

impl SubCommandExtend for IndexCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        opts.conf_dir.ensure()?;
        let db = db::init_db(opts.conf_dir.database()).await?;

        let path = self.path.canonicalize()?;
        let path_str = path.to_string_lossy().to_string();
        let library = match crud::get_library_by_path(&db, &path_str).await? {
            Some(library) => library,
            None => {
                let name = self.name.clone().unwrap_or_else(|| {
                    path.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
                });
                let library = LibraryRecord {
                    id: Uuid::new_v4().to_string(),
                    name,
                    path: path_str,
                    created_at: unix_millis(),
                    last_indexed_at: None,
                };
                crud::add_library(&db, &library).await?;
                info!("创建照片库: {} ({})", library.name, library.id);
                library
            }
        };

        let encoder = Arc::new(self.encoder.build()?);
        let library_id = Uuid::parse_str(&library.id)?;
        let manager = Arc::new(LibraryIndexManager::new(
            &opts.conf_dir,
            library_id,
            self.encoder.dim,
            (&self.hnsw).into(),
        ));

        let pb = ProgressBar::no_length().with_style(pb_style());
        let indexer = Indexer::new(db, encoder, manager);
        let report = indexer.index_library(&library, &self.suffix, &pb).await?;
        pb.finish_with_message("索引完成");

        info!(
            "共扫描 {} 张照片，编码成功 {}，失败 {}，写入索引 {}",
            report.scanned, report.encoded, report.failed, report.indexed
        );
        Ok(())
    }
}
