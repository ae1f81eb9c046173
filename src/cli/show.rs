use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::keys::{KeyStore, LoweKeyLoader, read_file_list};

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// key 文件列表，每行一个路径
    pub list: PathBuf,
}

impl SubCommandExtend for ShowCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let files = read_file_list(&self.list)?;
        let store = KeyStore::load(&LoweKeyLoader, &files);

        for (i, (path, set)) in files.iter().zip(store.sets()).enumerate() {
            println!("{}\t{}\t{}", i, set.len(), path.display());
        }
        println!("共 {} 张图片，{} 个描述符", store.len(), store.total_descriptors());

        Ok(())
    }
}
