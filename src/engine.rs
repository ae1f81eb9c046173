use std::io::Write;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Result, bail};
use crossbeam_channel::bounded;
use indicatif::ProgressBar;
use log::debug;

use crate::config::MatchOptions;
use crate::index::KnnIndex;
use crate::keys::KeyStore;
use crate::matcher::match_descriptors;
use crate::sink::ResultSink;
use crate::utils::pb_style;

/// 低于该数量的匹配对不会被写入输出，过滤掉统计意义太弱的图片对
pub const MIN_MATCHES: usize = 16;

/// 计算目标图片的候选源图片区间
///
/// 每张图片只与更早的图片比较，一个图片对不会计算两次，也不会和自己比较。
/// `window_radius` 为负表示不限制窗口，所有更早的图片都是候选；
/// 非负时区间收窄为 `[max(target - window_radius, 0), target)`
pub fn candidate_sources(target: usize, window_radius: i32) -> Range<usize> {
    let start = match window_radius {
        r if r >= 0 => target.saturating_sub(r as usize),
        _ => 0,
    };
    start..target
}

/// 在固定大小的线程池上执行全部两两匹配
///
/// 每张目标图片对应一个任务，启动时按下标顺序一次性全部入队。
/// worker 从队列中取任务，为目标图片构建索引，按 [candidate_sources]
/// 扫描源图片并把合格的匹配列表交给输出端。任务之间除了共享的只读
/// 描述符和输出锁之外相互独立，队列排空后 worker 自行退出。
/// 单个任务写入失败不会打断其他任务，排空之后整个运行报告失败
pub fn run_matching<I, W>(store: &KeyStore, sink: &ResultSink<W>, opts: &MatchOptions) -> Result<()>
where
    I: KnnIndex,
    W: Write + Send,
{
    let threads = match opts.threads {
        0 => num_cpus::get(),
        n => n,
    };
    let pb = ProgressBar::new(store.len() as u64).with_style(pb_style());
    let failed = AtomicBool::new(false);

    std::thread::scope(|s| {
        let (tx, rx) = bounded(store.len() + 1);
        for target in 0..store.len() {
            tx.send(target).unwrap();
        }
        // 关闭队列，worker 排空后收到 Err 退出
        drop(tx);

        for _ in 0..threads {
            let rx = rx.clone();
            let pb = pb.clone();
            let failed = &failed;
            s.spawn(move || {
                while let Ok(target) = rx.recv() {
                    if let Err(e) = match_one_target::<I, W>(store, sink, opts, target) {
                        pb.println(format!("匹配图片 {} 失败: {:#}", target, e));
                        failed.store(true, Ordering::Relaxed);
                    }
                    pb.inc(1);
                }
            });
        }
    });

    pb.finish_and_clear();

    if failed.load(Ordering::Relaxed) {
        bail!("部分匹配任务失败，输出不完整");
    }
    Ok(())
}

/// 单张目标图片的完整匹配任务
fn match_one_target<I, W>(
    store: &KeyStore,
    sink: &ResultSink<W>,
    opts: &MatchOptions,
    target: usize,
) -> Result<()>
where
    I: KnnIndex,
    W: Write + Send,
{
    let target_set = store.set(target);
    if target_set.is_empty() {
        return Ok(());
    }

    let start = Instant::now();
    let index = I::build(target_set);

    let mut pairs = 0;
    for source in candidate_sources(target, opts.window_radius) {
        let source_set = store.set(source);
        if source_set.is_empty() {
            continue;
        }

        let matches = match_descriptors(source_set, &index, opts.ratio);
        if matches.len() >= MIN_MATCHES {
            sink.write_record(source, target, &matches)?;
            pairs += 1;
        }
    }

    debug!("image {}: {} pairs written, {:.3}s", target, pairs, start.elapsed().as_secs_f32());
    Ok(())
}
