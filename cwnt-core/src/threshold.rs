//! 逐切片 Otsu 二值化.

use std::time::Instant;

use itertools::{Itertools, MinMaxResult};
use log::debug;
use ndarray::{Array3, ArrayView2, ArrayViewMut2, Axis, Zip};

use crate::consts::{keys, OTSU_BINS};
use crate::error::{ConfigIssue, SegmentResult};
use crate::exec::for_each_slice;
use crate::VolumeBuffer;

/// 把 `[min, max]` 上的实数值映射到 `bins` 个等宽直方图级.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinMapper {
    min: f64,
    max: f64,
    bins: usize,
}

impl BinMapper {
    /// 创建映射. `bins` 至少为 2, 否则返回 `None`.
    pub fn new(min: f64, max: f64, bins: usize) -> Option<Self> {
        (bins >= 2 && min <= max).then_some(Self { min, max, bins })
    }

    #[inline]
    fn step(&self) -> f64 {
        (self.max - self.min) / (self.bins - 1) as f64
    }

    /// 值 -> 直方图级. 区间外的值被夹到两端.
    #[inline]
    pub fn map(&self, value: f64) -> usize {
        let step = self.step();
        if step <= 0.0 {
            return 0;
        }
        let idx = ((value - self.min) / step).round();
        idx.clamp(0.0, (self.bins - 1) as f64) as usize
    }

    /// 直方图级 (可以是缩放后的小数) -> 值.
    #[inline]
    pub fn inv_map(&self, index: f64) -> f64 {
        self.min + index * self.step()
    }
}

/// 计算直方图 `hist` 的 Otsu 阈值级. `n_points` 为直方图总计数.
///
/// 返回使类间方差 `wB * wF * (mB - mF)^2` 最大的级. 背景权重为 0 时跳过,
/// 前景权重为 0 时结束. 平局时取最先出现的级.
pub fn otsu_threshold_index(hist: &[u64], n_points: u64) -> usize {
    let total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_b = 0.0;
    let mut w_b = 0u64;
    let mut best = 0usize;
    let mut var_max = 0.0;

    for (t, &c) in hist.iter().enumerate() {
        w_b += c;
        if w_b == 0 {
            continue;
        }
        let w_f = n_points.saturating_sub(w_b);
        if w_f == 0 {
            break;
        }
        sum_b += t as f64 * c as f64;
        let m_b = sum_b / w_b as f64;
        let m_f = (total - sum_b) / w_f as f64;
        let between = w_b as f64 * w_f as f64 * (m_b - m_f) * (m_b - m_f);
        if between > var_max {
            var_max = between;
            best = t;
        }
    }
    best
}

/// 流程第五阶段.
#[derive(Debug, Clone, Copy)]
pub struct OtsuThresholder2D {
    factor: f64,
}

impl OtsuThresholder2D {
    /// 以阈值缩放系数 `factor` 创建. `factor` 须为有限数.
    pub fn new(factor: f64) -> Result<Self, ConfigIssue> {
        if !factor.is_finite() {
            return Err(ConfigIssue::OutOfRange {
                key: keys::THRESHOLD_FACTOR,
                value: factor,
                constraint: "finite",
            });
        }
        Ok(Self { factor })
    }

    /// 计算单个切片的阈值 (灰度值).
    ///
    /// 在切片的 `[min, max]` 上建立 256 级直方图, 求 Otsu 级, 乘以缩放系数
    /// 并截断取整, 再映射回灰度.
    pub fn slice_threshold(&self, slice: ArrayView2<f32>) -> f64 {
        let (min, max) = match slice.iter().copied().minmax() {
            MinMaxResult::NoElements => return 0.0,
            MinMaxResult::OneElement(v) => (v as f64, v as f64),
            MinMaxResult::MinMax(a, b) => (a as f64, b as f64),
        };
        let Some(mapper) = BinMapper::new(min, max, OTSU_BINS) else {
            return min;
        };
        let mut hist = vec![0u64; OTSU_BINS];
        for &v in slice.iter() {
            hist[mapper.map(v as f64)] += 1;
        }
        let index = otsu_threshold_index(&hist, slice.len() as u64);
        mapper.inv_map((index as f64 * self.factor).trunc())
    }

    fn binarize_slice(&self, src: ArrayView2<f32>, dst: ArrayViewMut2<bool>) {
        let threshold = self.slice_threshold(src);
        Zip::from(dst)
            .and(src)
            .for_each(|b, &v| *b = v as f64 > threshold);
    }

    /// 对 `masked` 的每个切片独立二值化. 严格大于阈值的体素为前景.
    pub fn threshold(&self, masked: &VolumeBuffer) -> SegmentResult<Array3<bool>> {
        let t = Instant::now();
        let mut out = crate::data::try_zeros::<bool>(masked.shape(), "otsu threshold")?;
        let src = masked.data();
        for_each_slice(out.view_mut(), |z, dst| {
            self.binarize_slice(src.index_axis(Axis(0), z), dst)
        });
        debug!(
            "otsu threshold: factor = {}, {} foreground voxels in {:?}",
            self.factor,
            out.iter().filter(|&&b| b).count(),
            t.elapsed()
        );
        Ok(out)
    }
}
