use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::matcher::MatchList;

/// 匹配结果的输出端，所有 worker 共享
///
/// 互斥锁保证一个图片对的记录作为整体写入，不同图片对的记录不会交错；
/// 记录之间的先后顺序不做任何保证
pub struct ResultSink<W: Write> {
    inner: Mutex<W>,
}

impl ResultSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("无法打开输出文件 {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ResultSink<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: Mutex::new(writer) }
    }

    /// 原子地写入一个图片对的记录：图片对、匹配数量、逐行的下标对，
    /// 释放锁之前强制刷新输出流
    pub fn write_record(&self, source: usize, target: usize, matches: &MatchList) -> Result<()> {
        let mut w = self.inner.lock().unwrap();
        writeln!(w, "{} {}", source, target)?;
        writeln!(w, "{}", matches.len())?;
        for (src, dst) in matches {
            writeln!(w, "{} {}", src, dst)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap()
    }
}
