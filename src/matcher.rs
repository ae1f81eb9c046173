use crate::index::KnnIndex;
use crate::keys::DescriptorSet;

/// 一个图片对中被接受的匹配，每项是（源图片局部下标，目标图片局部下标）
pub type MatchList = Vec<(u32, u32)>;

/// 把源图片的描述符逐个在目标索引中检索，用最近邻距离比值检验筛选匹配
///
/// 对每个源描述符取 2 个最近邻，只有 `dist1 < ratio * dist2` 时才接受最近的
/// 那一个，比值接近 1 的歧义匹配被丢弃。目标图片不足 2 个描述符时无法做
/// 检验，直接跳过。结果按源描述符的局部下标顺序排列，目标下标不做去重，
/// 重复认领留给下游的几何校验处理
pub fn match_descriptors<I: KnnIndex>(source: &DescriptorSet, index: &I, ratio: f32) -> MatchList {
    let mut matches = MatchList::new();
    for (i, descriptor) in source.iter().enumerate() {
        let nn = index.knn(descriptor, 2);
        if nn.len() != 2 {
            continue;
        }
        let (m, n) = (&nn[0], &nn[1]);
        if m.distance < ratio * n.distance {
            matches.push((i as u32, m.index as u32));
        }
    }
    matches
}
