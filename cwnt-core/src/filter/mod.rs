//! 像素滤波: 可选 3x3 中值滤波与高斯低通, 均逐切片执行.

use std::time::Instant;

use log::debug;

use crate::consts::keys;
use crate::error::{ConfigIssue, SegmentResult};
use crate::exec::for_each_slice;
use crate::VolumeBuffer;

pub mod kernel;
pub mod median;

pub use kernel::{central_difference, gaussian_half_kernel, smooth_slice};
pub use median::median3x3;

/// 流程第一阶段.
#[derive(Debug, Clone)]
pub struct PixelFilter {
    do_median: bool,
    half_kernel: Vec<f32>,
}

impl PixelFilter {
    /// 创建滤波器. `sigma` 必须为非负有限数.
    pub fn new(do_median: bool, sigma: f64) -> Result<Self, ConfigIssue> {
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(ConfigIssue::OutOfRange {
                key: keys::SIGMA_FILTER,
                value: sigma,
                constraint: ">= 0",
            });
        }
        Ok(Self {
            do_median,
            half_kernel: gaussian_half_kernel(sigma),
        })
    }

    /// 是否会做中值滤波?
    #[inline]
    pub fn does_median(&self) -> bool {
        self.do_median
    }

    /// 对 `source` 滤波, 返回新的体数据. `source` 本身不变.
    ///
    /// 不做中值滤波且 `sigma == 0` 时, 结果是输入的副本.
    pub fn apply(&self, source: &VolumeBuffer) -> SegmentResult<VolumeBuffer> {
        let t = Instant::now();
        let mut out = source.try_zeros_like("pixel filter")?;
        let src = source.data();
        let half = self.half_kernel.as_slice();
        let do_median = self.do_median;

        for_each_slice(out.data_mut(), |z, mut dst| {
            let s = src.index_axis(ndarray::Axis(0), z);
            if do_median {
                median3x3(s, dst.view_mut());
                let despeckled = dst.to_owned();
                smooth_slice(despeckled.view(), dst, half);
            } else {
                smooth_slice(s, dst, half);
            }
        });

        debug!(
            "pixel filter: median = {}, kernel = {}, {} slices in {:?}",
            self.do_median,
            half.len(),
            source.len_z(),
            t.elapsed()
        );
        Ok(out)
    }
}
