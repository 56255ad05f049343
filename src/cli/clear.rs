use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::info;
use uuid::Uuid;

use crate::cli::{SubCommandExtend, resolve_library};
use crate::config::{EncoderOptions, HnswOptions, Opts};
use crate::db::{self, crud};
use crate::library::LibraryIndexManager;

#[derive(Parser, Debug, Clone)]
pub struct ClearCommand {
    /// 照片库名称或 ID
    #[arg(short, long)]
    pub library: Option<String>,
    /// 仅删除索引文件，保留照片记录
    #[arg(long)]
    pub index_only: bool,
    #[command(flatten)]
    pub encoder: EncoderOptions,
    #[command(flatten)]
    pub hnsw: HnswOptions,
}

impl SubCommandExtend for ClearCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        opts.conf_dir.ensure()?;
        let db = db::init_db(opts.conf_dir.database()).await?;
        let library = resolve_library(&db, self.library.as_deref()).await?;

        let manager = Arc::new(LibraryIndexManager::new(
            &opts.conf_dir,
            Uuid::parse_str(&library.id)?,
            self.encoder.dim,
            (&self.hnsw).into(),
        ));
        manager.clear().await?;

        if !self.index_only {
            crud::delete_library(&db, &library.id).await?;
            info!("已删除照片库 {} 及其全部照片记录", library.name);
        }
        Ok(())
    }
}
