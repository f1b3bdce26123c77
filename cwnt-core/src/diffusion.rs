//! Perona-Malik 各向异性扩散与逐切片归一化.
//!
//! 扩散只在切片内部进行, 使用 8-邻域: 对每个邻居, 用灰度差 `d` 计算传导系数
//! `exp(-(d / κ)^2)`, 再按邻居距离平方的倒数加权 (对角邻居权重为 1/2).
//! 每轮更新 `I += rate * Σ c(d) * d / dist²`, 读取的是上一轮的值.

use std::time::Instant;

use itertools::{Itertools, MinMaxResult};
use log::debug;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};

use crate::consts::{keys, DIFFUSION_RATE};
use crate::error::{ConfigIssue, SegmentResult};
use crate::exec::for_each_slice;
use crate::filter::kernel::clamp_index;
use crate::VolumeBuffer;

/// 8-邻域偏移及其距离平方的倒数.
const NEIGHBOURS: [(isize, isize, f32); 8] = [
    (-1, -1, 0.5),
    (-1, 0, 1.0),
    (-1, 1, 0.5),
    (0, -1, 1.0),
    (0, 1, 1.0),
    (1, -1, 0.5),
    (1, 0, 1.0),
    (1, 1, 0.5),
];

/// 扩散结果: 原始扩散值与逐切片归一化到 `[0, 1]` 的值.
#[derive(Debug, Clone)]
pub struct Diffused {
    /// 扩散后, 归一化前.
    pub raw: VolumeBuffer,

    /// 每个切片归一化到 `[0, 1]`.
    pub normalized: VolumeBuffer,
}

/// 流程第二阶段.
#[derive(Debug, Clone, Copy)]
pub struct AnisotropicDiffuser {
    iterations: u32,
    kappa: f64,
}

impl AnisotropicDiffuser {
    /// 创建扩散器. `kappa` 必须为正有限数.
    pub fn new(iterations: u32, kappa: f64) -> Result<Self, ConfigIssue> {
        if !(kappa.is_finite() && kappa > 0.0) {
            return Err(ConfigIssue::OutOfRange {
                key: keys::KAPPA,
                value: kappa,
                constraint: "> 0",
            });
        }
        Ok(Self { iterations, kappa })
    }

    /// 对 `source` 的每个切片扩散 `iterations` 轮, 然后逐切片归一化.
    pub fn apply(&self, source: &VolumeBuffer) -> SegmentResult<Diffused> {
        let t = Instant::now();
        let mut raw = source.try_clone("anisotropic diffusion")?;
        let (iterations, kappa) = (self.iterations, self.kappa as f32);
        for_each_slice(raw.data_mut(), |_, s| diffuse_slice(s, iterations, kappa));

        let mut normalized = raw.try_zeros_like("intensity normalization")?;
        let src = raw.data();
        for_each_slice(normalized.data_mut(), |z, dst| {
            normalize_slice(src.index_axis(Axis(0), z), dst)
        });

        debug!(
            "anisotropic diffusion: {} iterations, kappa = {}, {} slices in {:?}",
            self.iterations,
            self.kappa,
            source.len_z(),
            t.elapsed()
        );
        Ok(Diffused { raw, normalized })
    }
}

/// 对单个切片原地做 `iterations` 轮 Perona-Malik 扩散. 边界以复制边缘像素的方式延拓.
pub fn diffuse_slice(mut slice: ArrayViewMut2<f32>, iterations: u32, kappa: f32) {
    let (h, w) = slice.dim();
    let rate = DIFFUSION_RATE as f32;
    let mut prev = Array2::<f32>::zeros((h, w));
    for _ in 0..iterations {
        prev.assign(&slice);
        for ((i, j), out) in slice.indexed_iter_mut() {
            let center = prev[(i, j)];
            let mut increment = 0.0;
            for &(di, dj, weight) in NEIGHBOURS.iter() {
                let ni = clamp_index(i as isize + di, h);
                let nj = clamp_index(j as isize + dj, w);
                let diff = prev[(ni, nj)] - center;
                let ratio = diff / kappa;
                increment += weight * (-ratio * ratio).exp() * diff;
            }
            *out = center + rate * increment;
        }
    }
}

/// 把 `src` 线性映射到 `[0, 1]` 后写入 `dst`. 若切片为常数, 则 `dst` 全部置 0.
pub fn normalize_slice(src: ArrayView2<f32>, mut dst: ArrayViewMut2<f32>) {
    match src.iter().copied().minmax() {
        MinMaxResult::MinMax(min, max) if max > min => {
            let range = max - min;
            dst.zip_mut_with(&src, |d, &s| *d = (s - min) / range);
        }
        _ => dst.fill(0.0),
    }
}
