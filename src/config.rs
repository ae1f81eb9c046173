use clap::{Parser, Subcommand};

use crate::cli::*;

#[derive(Parser, Debug, Clone)]
#[command(name = "keymatch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 对列表中的所有图片做两两特征匹配
    Match(MatchCommand),
    /// 显示列表中每张图片的描述符数量
    Show(ShowCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct MatchOptions {
    /// 最近邻距离比值检验的阈值，最近距离严格小于 RATIO 倍次近距离的匹配才会被接受
    #[arg(short, long, value_name = "RATIO", default_value_t = 0.6)]
    pub ratio: f32,
    /// 滑动窗口半径，每张图片只与下标距离不超过 N 的更早图片比较，负数表示不限制
    #[arg(short, long, value_name = "N", default_value_t = -1, allow_negative_numbers = true)]
    pub window_radius: i32,
    /// 工作线程数量，0 表示使用全部 CPU 核心
    #[arg(short = 'j', long, value_name = "N", default_value_t = 3)]
    pub threads: usize,
}
