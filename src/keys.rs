use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{debug, info};
use rayon::prelude::*;

use crate::utils::pb_style;

/// SIFT 描述符的维数
pub const DESCRIPTOR_DIM: usize = 128;

/// 一张图片的描述符集合，按行存储的二维 u8 数组
///
/// 加载完成后不再修改，匹配阶段所有线程无锁并发读取
#[derive(Debug, Default)]
pub struct DescriptorSet {
    count: usize,
    data: Vec<u8>,
}

impl DescriptorSet {
    pub fn new() -> Self {
        Self { count: 0, data: vec![] }
    }

    pub fn with_capacity(count: usize) -> Self {
        Self { count: 0, data: Vec::with_capacity(count * DESCRIPTOR_DIM) }
    }

    pub fn push(&mut self, v: &[u8]) {
        assert_eq!(v.len(), DESCRIPTOR_DIM);
        self.count += 1;
        self.data.extend_from_slice(v);
    }

    /// 描述符数量
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 第 n 个描述符
    pub fn descriptor(&self, n: usize) -> &[u8] {
        &self.data[n * DESCRIPTOR_DIM..(n + 1) * DESCRIPTOR_DIM]
    }

    /// 按局部下标顺序遍历所有描述符
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[u8]> {
        self.data.chunks_exact(DESCRIPTOR_DIM)
    }
}

/// 描述符加载器的抽象，任何能按图片产出描述符集合的实现都可以替换默认的 Lowe 格式
pub trait DescriptorLoader: Sync {
    fn load(&self, path: &Path) -> Result<DescriptorSet>;
}

/// Lowe 格式的 key 文件加载器
///
/// 文件为纯文本：首行 `<count> <dim>`，之后每个特征点依次是
/// 四个浮点数（位置、尺度、方向，匹配时用不到）和 128 个 0~255 的整数。
/// 解析按空白符切分，不依赖具体的换行位置。
pub struct LoweKeyLoader;

impl DescriptorLoader for LoweKeyLoader {
    fn load(&self, path: &Path) -> Result<DescriptorSet> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("无法读取 key 文件 {}", path.display()))?;
        parse_key_text(&text).with_context(|| format!("key 文件 {} 格式错误", path.display()))
    }
}

fn parse_key_text(text: &str) -> Result<DescriptorSet> {
    let mut tokens = text.split_ascii_whitespace();

    // 空文件视同没有特征点
    let Some(count) = tokens.next() else {
        return Ok(DescriptorSet::new());
    };
    let count = count.parse::<usize>().context("特征点数量不是整数")?;
    let dim = tokens.next().context("缺少维数")?.parse::<usize>().context("维数不是整数")?;
    if dim != DESCRIPTOR_DIM {
        bail!("维数 {} 不受支持，只接受 {}", dim, DESCRIPTOR_DIM);
    }

    let mut set = DescriptorSet::with_capacity(count);
    let mut buf = [0u8; DESCRIPTOR_DIM];
    for i in 0..count {
        // 跳过位置、尺度、方向
        for _ in 0..4 {
            tokens.next().with_context(|| format!("特征点 {} 数据不完整", i))?;
        }
        for b in buf.iter_mut() {
            let token = tokens.next().with_context(|| format!("特征点 {} 数据不完整", i))?;
            *b = token.parse::<u8>().with_context(|| format!("特征点 {} 的分量不合法", i))?;
        }
        set.push(&buf);
    }
    Ok(set)
}

/// 读取 key 文件路径列表，每行一个路径，忽略空行
pub fn read_file_list(path: &Path) -> Result<Vec<PathBuf>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("无法读取列表文件 {}", path.display()))?;
    let files = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect::<Vec<_>>();
    if files.is_empty() {
        bail!("列表文件 {} 中没有找到任何输入", path.display());
    }
    Ok(files)
}

/// 全部图片的描述符，按图片下标存储
///
/// 在匹配开始之前一次性填充完毕，之后只读
pub struct KeyStore {
    sets: Vec<DescriptorSet>,
}

impl KeyStore {
    /// 并行加载列表中的所有 key 文件
    ///
    /// 无法读取或格式错误的文件视同没有特征点，不会中断整个流程，
    /// 对应的图片会被所有图片对跳过
    pub fn load<L: DescriptorLoader>(loader: &L, files: &[PathBuf]) -> Self {
        let pb = ProgressBar::new(files.len() as u64).with_style(pb_style());
        let sets = files
            .par_iter()
            .progress_with(pb)
            .map(|path| match loader.load(path) {
                Ok(set) => {
                    debug!("{}: {} 个描述符", path.display(), set.len());
                    set
                }
                Err(e) => {
                    info!("跳过 {}: {:#}", path.display(), e);
                    DescriptorSet::new()
                }
            })
            .collect();
        Self { sets }
    }

    pub fn from_sets(sets: Vec<DescriptorSet>) -> Self {
        Self { sets }
    }

    /// 图片数量
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn set(&self, image: usize) -> &DescriptorSet {
        &self.sets[image]
    }

    pub fn sets(&self) -> &[DescriptorSet] {
        &self.sets
    }

    pub fn total_descriptors(&self) -> usize {
        self.sets.iter().map(|s| s.len()).sum()
    }
}
