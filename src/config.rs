use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use log::warn;
use uuid::Uuid;

use crate::cli::*;
use crate::encoder::{Encoder, RestEncoder, StubEncoder};
use crate::hnsw::HnswParams;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "picsearch").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone)]
pub struct EncoderOptions {
    /// 编码服务地址，不填则使用内置的确定性编码器（仅供测试）
    #[arg(long, value_name = "URL")]
    pub encoder_url: Option<String>,
    /// 嵌入向量维度
    #[arg(long, value_name = "DIM", default_value_t = 512)]
    pub dim: usize,
}

impl EncoderOptions {
    /// 构建编码器实例
    pub fn build(&self) -> anyhow::Result<Encoder> {
        match &self.encoder_url {
            Some(url) => Ok(Encoder::Rest(RestEncoder::new(url.clone(), self.dim)?)),
            None => {
                warn!("未配置编码服务，使用内置的确定性编码器");
                Ok(Encoder::Stub(StubEncoder::new(self.dim)))
            }
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct HnswOptions {
    /// HNSW 图每个节点的连接数，越大越准确，内存占用也越高
    #[arg(long, value_name = "M", default_value_t = 16)]
    pub m: usize,
    /// 构建索引时的候选列表大小，越大构建越准确也越慢
    #[arg(long, value_name = "EF", default_value_t = 200)]
    pub ef_construction: usize,
    /// 查询时的搜索宽度，越大召回越高，延迟也越高
    #[arg(long, value_name = "EF", default_value_t = 100)]
    pub ef: usize,
}

impl From<&HnswOptions> for HnswParams {
    fn from(opts: &HnswOptions) -> Self {
        Self { m: opts.m, ef_construction: opts.ef_construction, ef: opts.ef }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 返回的结果数量
    #[arg(short = 'k', long, value_name = "K", default_value_t = 20)]
    pub count: usize,
    /// 最低相似度阈值，低于该值的结果被过滤
    #[arg(short, long, value_name = "T", default_value_t = 0.5)]
    pub threshold: f32,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "picsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// picsearch 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 扫描照片目录并构建语义索引
    Index(IndexCommand),
    /// 用自然语言搜索照片
    Search(SearchCommand),
    /// 从索引中移除单张照片
    Remove(RemoveCommand),
    /// 清除照片库的索引和记录
    Clear(ClearCommand),
    /// 显示照片库和索引状态
    Show(ShowCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 确保配置目录存在
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.path)
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("picsearch.db")
    }

    /// 返回指定照片库的索引文件路径
    pub fn index_file(&self, library_id: &Uuid) -> PathBuf {
        self.path.join(format!("{library_id}.hnsw"))
    }

    /// 返回指定照片库的映射文件路径
    pub fn mapping_file(&self, library_id: &Uuid) -> PathBuf {
        self.path.join(format!("{library_id}.mappings"))
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
