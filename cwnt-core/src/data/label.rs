//! 标签体与标签生成器.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicU32, Ordering};

use ndarray::{Array3, ArrayView, ArrayViewMut, Ix3};

use super::Calibration;
use crate::consts::{BACKGROUND, FIRST_LABEL};
use crate::Idx3d;

/// 单调递增的标签生成器.
///
/// 同一帧内, 连通域标记与分裂共享同一个生成器, 因此新标签不会与旧标签冲突.
/// 取号是单个原子操作, 可以跨线程共享 `&LabelGenerator`.
#[derive(Debug)]
pub struct LabelGenerator {
    next: AtomicU32,
}

impl LabelGenerator {
    /// 创建从 [`FIRST_LABEL`] 开始取号的生成器.
    #[inline]
    pub const fn new() -> Self {
        Self::starting_at(FIRST_LABEL)
    }

    /// 创建从 `first` 开始取号的生成器.
    #[inline]
    pub const fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// 取出下一个标签.
    #[inline]
    pub fn next_label(&self) -> u32 {
        self.next.fetch_add(1, Ordering::AcqRel)
    }

    /// 查看下一个将被取出的标签, 不推进生成器.
    #[inline]
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Acquire)
    }
}

impl Default for LabelGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// 连通域的统计量. 从 [`LabelVolume`] 中按需计算, 生成细胞核后即被丢弃.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// 标签.
    pub label: u32,

    /// 体素个数.
    pub volume: usize,

    /// 包围盒最小角 `(z, h, w)`.
    pub min: Idx3d,

    /// 包围盒最大角 `(z, h, w)`, 包含在内.
    pub max: Idx3d,

    /// 各体素 `(z, h, w)` 坐标之和.
    sum: [f64; 3],
}

impl Blob {
    fn new(label: u32, pos: Idx3d) -> Self {
        Self {
            label,
            volume: 0,
            min: pos,
            max: pos,
            sum: [0.0; 3],
        }
    }

    fn push(&mut self, (z, h, w): Idx3d) {
        self.volume += 1;
        self.min = (self.min.0.min(z), self.min.1.min(h), self.min.2.min(w));
        self.max = (self.max.0.max(z), self.max.1.max(h), self.max.2.max(w));
        self.sum[0] += z as f64;
        self.sum[1] += h as f64;
        self.sum[2] += w as f64;
    }

    /// 包围盒在 `(z, h, w)` 三个方向上的长度.
    #[inline]
    pub fn extents(&self) -> [usize; 3] {
        [
            self.max.0 - self.min.0 + 1,
            self.max.1 - self.min.1 + 1,
            self.max.2 - self.min.2 + 1,
        ]
    }

    /// 物理质心 `[x, y, z]`.
    pub fn centroid(&self, calibration: &Calibration) -> [f64; 3] {
        let n = self.volume as f64;
        let [z, h, w] = self.sum;
        [
            w / n * calibration.x(),
            h / n * calibration.y(),
            z / n * calibration.z(),
        ]
    }
}

/// 与源体数据同形状的标签体. 0 为背景, 正整数为连通域标签.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    data: Array3<u32>,
}

impl Index<Idx3d> for LabelVolume {
    type Output = u32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for LabelVolume {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl LabelVolume {
    /// 直接包装已有的标签数据.
    #[inline]
    pub fn from_array(data: Array3<u32>) -> Self {
        Self { data }
    }

    /// 获取数据形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u32, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, u32, Ix3> {
        self.data.view_mut()
    }

    /// 取出内部数据.
    #[inline]
    pub fn into_data(self) -> Array3<u32> {
        self.data
    }

    /// 获取 `pos` 周围 6-邻域 (前后上下左右) 的坐标.
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn diamond_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        [
            (z.wrapping_sub(1), h, w),
            (z.saturating_add(1), h, w),
            (z, h.wrapping_sub(1), w),
            (z, h.saturating_add(1), w),
            (z, h, w.wrapping_sub(1)),
            (z, h, w.saturating_add(1)),
        ]
        .into_iter()
        .filter(|p| self.check(p))
        .collect()
    }

    /// 所有非背景标签, 升序.
    pub fn labels(&self) -> BTreeSet<u32> {
        self.data
            .iter()
            .copied()
            .filter(|&l| l != BACKGROUND)
            .collect()
    }

    /// 标签为 `label` 的体素个数.
    #[cfg(test)]
    pub(crate) fn count(&self, label: u32) -> usize {
        self.data.iter().filter(|&&l| l == label).count()
    }

    /// 一次扫描计算所有连通域的统计量, 按标签升序.
    pub fn blobs(&self) -> BTreeMap<u32, Blob> {
        let mut out = BTreeMap::new();
        for (pos, &l) in self.data.indexed_iter() {
            if l != BACKGROUND {
                out.entry(l).or_insert_with(|| Blob::new(l, pos)).push(pos);
            }
        }
        out
    }

    /// 一次扫描收集 `wanted` 中每个标签的全部体素坐标 (按行优先顺序).
    pub fn positions_of(&self, wanted: &BTreeSet<u32>) -> HashMap<u32, Vec<Idx3d>> {
        let mut out: HashMap<u32, Vec<Idx3d>> = HashMap::with_capacity(wanted.len());
        for (pos, l) in self.data.indexed_iter() {
            if wanted.contains(l) {
                out.entry(*l).or_default().push(pos);
            }
        }
        out
    }

    /// 将 `labels` 中的标签全部改写为背景. 返回被改写的体素个数.
    pub fn erase(&mut self, labels: &BTreeSet<u32>) -> usize {
        let mut cnt = 0;
        self.data.map_inplace(|l| {
            if labels.contains(l) {
                *l = BACKGROUND;
                cnt += 1;
            }
        });
        cnt
    }

    /// 将 `positions` 处的体素改写为 `label`.
    ///
    /// 如果存在越界索引, 则程序 panic.
    pub fn assign(&mut self, positions: &[Idx3d], label: u32) {
        for &pos in positions {
            self.data[pos] = label;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LabelVolume {
        let mut data = Array3::<u32>::zeros((2, 3, 3));
        data[(0, 0, 0)] = 4;
        data[(0, 0, 1)] = 4;
        data[(1, 2, 2)] = 9;
        LabelVolume::from_array(data)
    }

    #[test]
    fn test_generator_monotonic() {
        let g = LabelGenerator::new();
        assert_eq!(g.next_label(), 1);
        assert_eq!(g.next_label(), 2);
        assert_eq!(g.peek(), 3);
    }

    #[test]
    fn test_generator_across_threads() {
        let g = LabelGenerator::new();
        let mut taken: Vec<u32> = std::thread::scope(|s| {
            let hs: Vec<_> = (0..4)
                .map(|_| s.spawn(|| (0..100).map(|_| g.next_label()).collect::<Vec<_>>()))
                .collect();
            hs.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });
        taken.sort_unstable();
        taken.dedup();
        assert_eq!(taken.len(), 400);
        assert_eq!(g.peek(), 401);
    }

    #[test]
    fn test_blob_statistics() {
        let lv = sample();
        let blobs = lv.blobs();
        assert_eq!(blobs.len(), 2);
        let b = &blobs[&4];
        assert_eq!(b.volume, 2);
        assert_eq!(b.min, (0, 0, 0));
        assert_eq!(b.max, (0, 0, 1));
        assert_eq!(b.extents(), [1, 1, 2]);
        let c = b.centroid(&Calibration::new(2.0, 1.0, 1.0).unwrap());
        assert_eq!(c, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_erase_and_assign() {
        let mut lv = sample();
        let gone = lv.erase(&BTreeSet::from([4]));
        assert_eq!(gone, 2);
        assert_eq!(lv.labels(), BTreeSet::from([9]));
        lv.assign(&[(0, 1, 1)], 12);
        assert_eq!(lv.count(12), 1);
        let pos = lv.positions_of(&BTreeSet::from([9, 12]));
        assert_eq!(pos[&9], vec![(1, 2, 2)]);
    }

    #[test]
    fn test_diamond_neighbours_at_corner() {
        let lv = sample();
        let mut n = lv.diamond_neighbours((0, 0, 0));
        n.sort_unstable();
        assert_eq!(n, vec![(0, 0, 1), (0, 1, 0), (1, 0, 0)]);
        assert_eq!(lv.diamond_neighbours((1, 1, 1)).len(), 5);
    }
}
