use indicatif::ProgressStyle;

/// 进度条样式
pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("{wide_bar} {pos}/{len} [{elapsed_precise}<{eta_precise}] {msg}")
        .expect("failed to build progress style")
}
