use hnsw_rs::prelude::*;
use rayon::prelude::*;

use crate::keys::DescriptorSet;

/// knn 查询结果
pub struct Neighbor {
    /// 描述符在目标图片中的局部下标
    pub index: usize,
    /// 与查询描述符的距离（欧氏距离的平方）
    pub distance: f32,
}

/// 最近邻索引的抽象
///
/// 匹配核心只依赖这个接口，任何正确的 knn 实现都可以替换默认的 HNSW。
/// 索引由单个匹配任务独占，构建它的任务结束时一并销毁
pub trait KnnIndex: Sized {
    /// 在一张图片的描述符集合上构建索引
    ///
    /// 不允许在空集合上构建，调用方必须先检查 `len() > 0`
    fn build(set: &DescriptorSet) -> Self;

    /// 返回距离升序排列的 k 个最近邻，集合中描述符不足 k 个时返回的数量会少于 k
    fn knn(&self, descriptor: &[u8], k: usize) -> Vec<Neighbor>;
}

/// 欧氏距离的平方。128 * 255^2 远小于 i32::MAX，中间结果用整数累加
struct DistL2Sq;

impl Distance<u8> for DistL2Sq {
    fn eval(&self, va: &[u8], vb: &[u8]) -> f32 {
        let mut sum = 0i32;
        for (a, b) in va.iter().zip(vb) {
            let d = *a as i32 - *b as i32;
            sum += d * d;
        }
        sum as f32
    }
}

// 比值检验只需要 top-2，ef 取大一些让小图片上的搜索接近精确
const EF_SEARCH: usize = 64;

/// 基于 HNSW 的描述符索引
pub struct HnswIndex {
    hnsw: Hnsw<'static, u8, DistL2Sq>,
}

impl KnnIndex for HnswIndex {
    fn build(set: &DescriptorSet) -> Self {
        assert!(!set.is_empty(), "cannot build index on an empty descriptor set");
        let hnsw = Hnsw::<u8, _>::new(32, set.len(), 16, 128, DistL2Sq);
        (0..set.len()).into_par_iter().for_each(|i| {
            hnsw.insert((set.descriptor(i), i));
        });
        Self { hnsw }
    }

    fn knn(&self, descriptor: &[u8], k: usize) -> Vec<Neighbor> {
        self.hnsw
            .search(descriptor, k, EF_SEARCH)
            .into_iter()
            .map(|n| Neighbor { index: n.d_id, distance: n.distance })
            .collect()
    }
}
