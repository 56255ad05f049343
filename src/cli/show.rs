use anyhow::Result;
use clap::Parser;
use uuid::Uuid;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::db::{self, crud};

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {}

impl SubCommandExtend for ShowCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        opts.conf_dir.ensure()?;
        let db = db::init_db(opts.conf_dir.database()).await?;

        let libraries = crud::list_libraries(&db).await?;
        if libraries.is_empty() {
            println!("尚未创建任何照片库");
            return Ok(());
        }

        for library in libraries {
            let photos = crud::count_photos(&db, &library.id).await?;
            let embedded = crud::count_embedded(&db, &library.id).await?;
            let index_exists = Uuid::parse_str(&library.id)
                .map(|id| opts.conf_dir.index_file(&id).exists())
                .unwrap_or(false);

            println!("{} ({})", library.name, library.id);
            println!("  路径: {}", library.path);
            println!("  照片: {photos} 张，已编码 {embedded} 张");
            println!("  索引: {}", if index_exists { "已构建" } else { "未构建" });
            if let Some(ts) = library.last_indexed_at {
                println!("  上次索引: {ts}");
            }
        }
        Ok(())
    }
}
