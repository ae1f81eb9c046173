use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{MatchOptions, Opts};
use crate::engine::run_matching;
use crate::index::HnswIndex;
use crate::keys::{KeyStore, LoweKeyLoader, read_file_list};
use crate::sink::ResultSink;

#[derive(Parser, Debug, Clone)]
pub struct MatchCommand {
    /// key 文件列表，每行一个路径
    pub list: PathBuf,
    /// 匹配结果输出文件
    pub output: PathBuf,
    #[command(flatten)]
    pub options: MatchOptions,
}

impl SubCommandExtend for MatchCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let files = read_file_list(&self.list)?;
        // 输出文件打不开属于致命错误，在读取 key 之前就失败
        let sink = ResultSink::create(&self.output)?;

        let start = Instant::now();
        let store = KeyStore::load(&LoweKeyLoader, &files);
        info!(
            "读取 {} 个 key 文件耗时 {:.3}s，共 {} 个描述符",
            store.len(),
            start.elapsed().as_secs_f32(),
            store.total_descriptors()
        );

        let start = Instant::now();
        run_matching::<HnswIndex, _>(&store, &sink, &self.options)?;
        info!("匹配耗时 {:.3}s", start.elapsed().as_secs_f32());

        Ok(())
    }
}
