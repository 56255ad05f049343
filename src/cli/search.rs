use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use uuid::Uuid;

use crate::cli::{SubCommandExtend, resolve_library};
use crate::config::{EncoderOptions, HnswOptions, Opts, SearchOptions};
use crate::db::{self, crud};
use crate::library::LibraryIndexManager;
use crate::searcher::Searcher;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    /// 查询文本
    pub query: String,
    /// 照片库名称或 ID
    #[arg(short, long)]
    pub library: Option<String>,
    #[command(flatten)]
    pub encoder: EncoderOptions,
    #[command(flatten)]
    pub hnsw: HnswOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        opts.conf_dir.ensure()?;
        let db = db::init_db(opts.conf_dir.database()).await?;
        let library = resolve_library(&db, self.library.as_deref()).await?;

        let encoder = Arc::new(self.encoder.build()?);
        let manager = Arc::new(LibraryIndexManager::new(
            &opts.conf_dir,
            Uuid::parse_str(&library.id)?,
            self.encoder.dim,
            (&self.hnsw).into(),
        ));
        let searcher = Searcher::new(db.clone(), encoder, manager).with_threshold(self.search.threshold);

        let results = searcher.search_text(&self.query, self.search.count).await?;
        let mut rows = Vec::with_capacity(results.len());
        for result in &results {
            if let Some(photo) = crud::get_photo(&db, &result.photo_id.to_string()).await? {
                rows.push((result.similarity, photo.path));
            }
        }

        print_result(&rows, self)
    }
}

fn print_result(result: &[(f32, String)], opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for (similarity, path) in result {
                println!("{:.3}\t{}", similarity, path);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}
