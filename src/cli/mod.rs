mod clear;
mod index;
mod remove;
mod search;
pub mod server;
mod show;

pub use clear::*;
pub use index::*;
pub use remove::*;
pub use search::*;
pub use server::*;
pub use show::*;

use anyhow::anyhow;

use crate::config::Opts;
use crate::db::{Database, LibraryRecord, crud};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 根据名称或 ID 定位照片库，未指定且只有一个库时直接取它
pub(crate) async fn resolve_library(
    db: &Database,
    selector: Option<&str>,
) -> anyhow::Result<LibraryRecord> {
    match selector {
        Some(s) => crud::find_library(db, s).await?.ok_or_else(|| anyhow!("找不到照片库: {s}")),
        None => {
            let mut libraries = crud::list_libraries(db).await?;
            match libraries.len() {
                0 => Err(anyhow!("尚未创建任何照片库，请先执行 index 命令")),
                1 => Ok(libraries.remove(0)),
                _ => Err(anyhow!("存在多个照片库，请用 --library 指定")),
            }
        }
    }
}
