//! 细胞核分裂.
//!
//! 1. 丢弃体积过大 (`>= volume_upper`) 或过小 (`<= volume_lower`) 的连通域;
//! 2. 对剩余连通域计算体积均值与标准差, 体积不小于 `mean + std_factor * std`
//!    的连通域成为分裂候选, 其余直接成为质量为 1 的细胞核;
//! 3. 对每个候选, 统计包围盒内三个方向的位置直方图并计数峰, 以峰数之积 `n`
//!    估计分裂个数;
//! 4. `n > 1` 时在物理坐标上做 k-means++ 聚类, 每个子类成为质量为 `1/n` 的细胞核.
//!    体素数不超过 `n` 的候选无法聚类, 退化为一个质量为 0 的细胞核.
//!
//! 需要改写标签体时, 先收集全部坐标, 读完之后再统一改写.

use std::collections::BTreeSet;
use std::time::Instant;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::defaults;
use crate::spot::Spot;
use crate::{Blob, Calibration, Idx3d, LabelGenerator, LabelVolume};

pub mod histogram;
pub mod kmeans;

use histogram::{estimate_split_count, position_histograms};
use kmeans::{kmeans_pp, Point};

/// 分裂阶段的可调参数. 不属于用户配置, 由程序设置.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplitterOptions {
    /// 体积上界 (体素个数), 不小于该值的连通域被丢弃.
    pub volume_upper: usize,

    /// 体积下界 (体素个数), 不大于该值的连通域被丢弃.
    pub volume_lower: usize,

    /// 候选判定的标准差系数.
    pub std_factor: f64,

    /// k-means++ 随机种子.
    pub seed: u64,
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            volume_upper: defaults::VOLUME_UPPER,
            volume_lower: defaults::VOLUME_LOWER,
            std_factor: defaults::STD_FACTOR,
            seed: defaults::KMEANS_SEED,
        }
    }
}

/// 体积分布统计.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    /// 均值 (体素个数).
    pub mean: f64,

    /// 总体标准差 (体素个数).
    pub std: f64,
}

impl VolumeStats {
    /// 由若干体积计算. 为空时返回 `None`.
    pub fn from_volumes<I: IntoIterator<Item = usize>>(volumes: I) -> Option<Self> {
        let (n, sum, sum_sq) = volumes
            .into_iter()
            .fold((0usize, 0.0, 0.0), |(n, s, sq), v| {
                let v = v as f64;
                (n + 1, s + v, sq + v * v)
            });
        if n == 0 {
            return None;
        }
        let mean = sum / n as f64;
        let var = (sum_sq / n as f64 - mean * mean).max(0.0);
        Some(Self {
            mean,
            std: var.sqrt(),
        })
    }

    /// 分裂候选的体积阈值.
    #[inline]
    pub fn split_threshold(&self, std_factor: f64) -> f64 {
        self.mean + std_factor * self.std
    }
}

/// 流程第七阶段.
///
/// 标签生成器必须与生成 `labels` 的生成器为同一个, 以保证新标签不冲突.
pub struct NucleiSplitter<'a> {
    labels: &'a mut LabelVolume,
    calibration: Calibration,
    generator: &'a LabelGenerator,
    relabel: bool,
    options: SplitterOptions,
}

impl<'a> NucleiSplitter<'a> {
    /// 创建分裂器. `relabel` 为真时, 会擦除被丢弃的连通域, 并给分裂出的子核分配新标签.
    pub fn new(
        labels: &'a mut LabelVolume,
        calibration: Calibration,
        generator: &'a LabelGenerator,
        relabel: bool,
    ) -> Self {
        Self {
            labels,
            calibration,
            generator,
            relabel,
            options: SplitterOptions::default(),
        }
    }

    /// 替换分裂参数.
    #[inline]
    pub fn with_options(mut self, options: SplitterOptions) -> Self {
        self.options = options;
        self
    }

    /// 由整个连通域生成细胞核.
    fn spot_from_blob(&self, blob: &Blob, quality: f64) -> Spot {
        Spot::from_volume(
            blob.centroid(&self.calibration),
            blob.volume as f64 * self.calibration.voxel(),
            quality,
        )
    }

    /// 执行分裂, 返回全部细胞核.
    ///
    /// 顺序为: 非候选连通域 (标签升序), 然后是候选连通域产生的细胞核 (父标签升序).
    pub fn process(self) -> Vec<Spot> {
        let t = Instant::now();
        let opts = self.options;
        let mut blobs = self.labels.blobs();
        let total = blobs.len();

        let trashed: BTreeSet<u32> = blobs
            .values()
            .filter(|b| b.volume >= opts.volume_upper || b.volume <= opts.volume_lower)
            .map(|b| b.label)
            .collect();
        if self.relabel && !trashed.is_empty() {
            self.labels.erase(&trashed);
        }
        blobs.retain(|l, _| !trashed.contains(l));

        let Some(stats) = VolumeStats::from_volumes(blobs.values().map(|b| b.volume)) else {
            debug!("splitter: no blob left out of {total}");
            return Vec::new();
        };
        let threshold = stats.split_threshold(opts.std_factor);
        let (candidates, regular): (Vec<&Blob>, Vec<&Blob>) = blobs
            .values()
            .partition(|b| b.volume as f64 >= threshold);

        let mut spots: Vec<Spot> = regular.iter().map(|b| self.spot_from_blob(b, 1.0)).collect();

        let wanted: BTreeSet<u32> = candidates.iter().map(|b| b.label).collect();
        let mut positions = self.labels.positions_of(&wanted);
        let mut rng = StdRng::seed_from_u64(opts.seed);
        let mut relabels: Vec<(Vec<Idx3d>, u32)> = Vec::new();
        let mut n_split = 0usize;

        for blob in candidates.iter() {
            let voxels = positions.remove(&blob.label).unwrap_or_default();
            let hist = position_histograms(&voxels, blob.min, blob.max);
            let n = estimate_split_count(&hist);
            if n <= 1 {
                spots.push(self.spot_from_blob(blob, 1.0));
                continue;
            }
            if voxels.len() <= n {
                warn!(
                    "degenerate blob: label {} has {} voxels, cannot split into {n}",
                    blob.label,
                    voxels.len()
                );
                spots.push(self.spot_from_blob(blob, 0.0));
                continue;
            }

            n_split += 1;
            let points: Vec<Point> = voxels
                .iter()
                .map(|&p| self.calibration.to_physical(p))
                .collect();
            let quality = 1.0 / n as f64;
            let voxel = self.calibration.voxel();
            for cluster in kmeans_pp(&points, n, &mut rng) {
                spots.push(Spot::from_volume(
                    cluster.centroid,
                    cluster.members.len() as f64 * voxel,
                    quality,
                ));
                if self.relabel {
                    let members = cluster.members.iter().map(|&i| voxels[i]).collect();
                    relabels.push((members, self.generator.next_label()));
                }
            }
        }

        for (members, label) in relabels.iter() {
            self.labels.assign(members, *label);
        }

        debug!(
            "splitter: {total} blobs, {} trashed, mean volume {:.1} (std {:.1}), \
             {} candidates, {n_split} split, {} spots in {:?}",
            trashed.len(),
            stats.mean,
            stats.std,
            candidates.len(),
            spots.len(),
            t.elapsed()
        );
        spots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// 两个相隔的十字, 都属于标签 `label`. x 方向直方图为 [1, 3, 1, 0, 1, 3, 1].
    fn two_crosses(data: &mut Array3<u32>, label: u32) {
        for cw in [1usize, 5] {
            for (z, w) in [(1, cw - 1), (1, cw), (0, cw), (2, cw), (1, cw + 1)] {
                data[(z, 1, w)] = label;
            }
        }
    }

    fn unbounded() -> SplitterOptions {
        SplitterOptions {
            volume_upper: usize::MAX,
            ..SplitterOptions::default()
        }
    }

    #[test]
    fn test_volume_stats() {
        let s = VolumeStats::from_volumes([10, 1]).unwrap();
        assert!((s.mean - 5.5).abs() < 1e-12);
        assert!((s.std - 4.5).abs() < 1e-12);
        assert!((s.split_threshold(0.5) - 7.75).abs() < 1e-12);
        assert!(VolumeStats::from_volumes([]).is_none());
    }

    #[test]
    fn test_quality_semantics() {
        let mut data = Array3::<u32>::zeros((3, 3, 8));
        two_crosses(&mut data, 3);
        data[(0, 0, 0)] = 7;
        let mut labels = LabelVolume::from_array(data);
        let g = LabelGenerator::starting_at(8);
        let spots = NucleiSplitter::new(&mut labels, Calibration::unit(), &g, false)
            .with_options(unbounded())
            .process();

        // 标签 7 体积 1, 不是候选, 质量为 1.
        assert_eq!(spots.len(), 3);
        assert_eq!(spots[0].quality(), 1.0);
        assert_eq!(spots[0].position(), [0.0, 0.0, 0.0]);
        // 标签 3 分裂成两个, 各自质量为 1/2.
        let mut halves = spots[1..].to_vec();
        halves.sort_by(|a, b| a.x().total_cmp(&b.x()));
        assert_eq!(halves[0].quality(), 0.5);
        assert_eq!(halves[1].quality(), 0.5);
        assert!((halves[0].x() - 1.0).abs() < 1e-9);
        assert!((halves[1].x() - 5.0).abs() < 1e-9);
        assert!((halves[0].z() - 1.0).abs() < 1e-9);
        // 未要求改写标签体.
        assert_eq!(labels.labels(), BTreeSet::from([3, 7]));
        assert_eq!(g.peek(), 8);
    }

    #[test]
    fn test_relabel_after_split() {
        let mut data = Array3::<u32>::zeros((3, 3, 8));
        two_crosses(&mut data, 1);
        let mut labels = LabelVolume::from_array(data);
        let g = LabelGenerator::starting_at(2);
        let spots = NucleiSplitter::new(&mut labels, Calibration::unit(), &g, true)
            .with_options(unbounded())
            .process();
        assert_eq!(spots.len(), 2);
        assert_eq!(labels.labels(), BTreeSet::from([2, 3]));
        assert_eq!(labels.count(2), 5);
        assert_eq!(labels.count(3), 5);
        // 每个新标签只占据一个十字
        let blobs = labels.blobs();
        assert!(blobs.values().all(|b| b.extents() == [3, 1, 3]));
    }

    #[test]
    fn test_degenerate_blob_has_zero_quality() {
        let mut data = Array3::<u32>::zeros((1, 1, 3));
        data[(0, 0, 0)] = 5;
        data[(0, 0, 2)] = 5;
        let mut labels = LabelVolume::from_array(data);
        let g = LabelGenerator::starting_at(6);
        let spots = NucleiSplitter::new(&mut labels, Calibration::unit(), &g, true).process();
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].quality(), 0.0);
        assert!((spots[0].x() - 1.0).abs() < 1e-12);
        assert_eq!(g.peek(), 6);
    }

    #[test]
    fn test_out_of_bounds_blobs_are_trashed() {
        let mut data = Array3::<u32>::zeros((1, 4, 4));
        data[(0, 0, 0)] = 1;
        for w in 0..4 {
            data[(0, 3, w)] = 2;
        }
        let opts = SplitterOptions {
            volume_upper: 3,
            ..SplitterOptions::default()
        };

        let mut kept = LabelVolume::from_array(data.clone());
        let g = LabelGenerator::starting_at(3);
        let spots = NucleiSplitter::new(&mut kept, Calibration::unit(), &g, false)
            .with_options(opts)
            .process();
        assert_eq!(spots.len(), 1);
        assert_eq!(kept.count(2), 4);

        let mut erased = LabelVolume::from_array(data);
        let spots = NucleiSplitter::new(&mut erased, Calibration::unit(), &g, true)
            .with_options(opts)
            .process();
        assert_eq!(spots.len(), 1);
        assert_eq!(erased.labels(), BTreeSet::from([1]));
    }

    #[test]
    fn test_calibrated_radius() {
        let mut data = Array3::<u32>::zeros((2, 2, 2));
        data.fill(4);
        let mut labels = LabelVolume::from_array(data);
        let cal = Calibration::new(0.5, 0.5, 2.0).unwrap();
        let g = LabelGenerator::starting_at(5);
        let spots = NucleiSplitter::new(&mut labels, cal, &g, false).process();
        assert_eq!(spots.len(), 1);
        let expected = crate::spot::radius_from_volume(8.0 * 0.5);
        assert!((spots[0].radius() - expected).abs() < 1e-12);
        assert_eq!(spots[0].position(), [0.25, 0.25, 1.0]);
    }

    #[test]
    fn test_empty_labels() {
        let mut labels = LabelVolume::from_array(Array3::zeros((2, 2, 2)));
        let g = LabelGenerator::new();
        assert!(NucleiSplitter::new(&mut labels, Calibration::unit(), &g, true)
            .process()
            .is_empty());
    }
}
