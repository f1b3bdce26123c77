//! 逐切片的高斯梯度, 拉普拉斯与 Hessian 行列式.
//!
//! 对每个切片:
//!
//! 1. 高斯平滑后做中心差分, 得到 `Gx`, `Gy` 与梯度模 `sqrt(Gx² + Gy²)`;
//! 2. 对 `Gx` 重复同一操作得到 `(Gxx, Gxy)`, 对 `Gy` 得到 `(Gyx, Gyy)`;
//! 3. 拉普拉斯 `L = max(0, Gxx + Gyy)`;
//! 4. Hessian `H = max(0, -(Gxx * Gyy - Gxy * Gyx))`.
//!
//! 切片之间互不耦合.

use std::time::Instant;

use log::debug;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis, Zip};

use crate::consts::keys;
use crate::error::{ConfigIssue, SegmentResult};
use crate::exec::for_each_slice3;
use crate::filter::{central_difference, gaussian_half_kernel, smooth_slice};
use crate::VolumeBuffer;

/// 2D 高斯梯度算子: 高斯平滑, 然后中心差分.
#[derive(Debug, Clone)]
pub struct GaussianGradient2D {
    half_kernel: Vec<f32>,
}

impl GaussianGradient2D {
    /// 创建算子. `sigma` 必须为正有限数.
    pub fn new(sigma: f64) -> Result<Self, ConfigIssue> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(ConfigIssue::OutOfRange {
                key: keys::SIGMA_GRADIENT,
                value: sigma,
                constraint: "> 0",
            });
        }
        Ok(Self {
            half_kernel: gaussian_half_kernel(sigma),
        })
    }

    /// 计算单个切片的梯度分量, 返回 `(Gx, Gy)`.
    pub fn gradient(&self, src: ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
        let mut smoothed = Array2::<f32>::zeros(src.dim());
        smooth_slice(src, smoothed.view_mut(), &self.half_kernel);
        central_difference(smoothed.view())
    }
}

/// 三个导数量, 与输入同形状.
#[derive(Debug, Clone)]
pub struct Derivatives {
    /// 梯度模.
    pub gradient_norm: VolumeBuffer,

    /// 拉普拉斯的正部.
    pub laplacian: VolumeBuffer,

    /// Hessian 行列式负部的绝对值.
    pub hessian: VolumeBuffer,
}

/// 流程第三阶段.
#[derive(Debug, Clone)]
pub struct DerivativeEngine {
    gradient: GaussianGradient2D,
}

impl DerivativeEngine {
    /// 以导数平滑尺度 `sigma` 创建.
    pub fn new(sigma: f64) -> Result<Self, ConfigIssue> {
        Ok(Self {
            gradient: GaussianGradient2D::new(sigma)?,
        })
    }

    /// 计算 `normalized` 每个切片的三个导数量.
    pub fn compute(&self, normalized: &VolumeBuffer) -> SegmentResult<Derivatives> {
        let t = Instant::now();
        let mut gradient_norm = normalized.try_zeros_like("gradient norm")?;
        let mut laplacian = normalized.try_zeros_like("laplacian")?;
        let mut hessian = normalized.try_zeros_like("hessian")?;

        let src = normalized.data();
        for_each_slice3(
            gradient_norm.data_mut(),
            laplacian.data_mut(),
            hessian.data_mut(),
            |z, g, l, h| self.slice(src.index_axis(Axis(0), z), g, l, h),
        );

        debug!(
            "derivatives: {} slices in {:?}",
            normalized.len_z(),
            t.elapsed()
        );
        Ok(Derivatives {
            gradient_norm,
            laplacian,
            hessian,
        })
    }

    fn slice(
        &self,
        src: ArrayView2<f32>,
        norm: ArrayViewMut2<f32>,
        lap: ArrayViewMut2<f32>,
        hes: ArrayViewMut2<f32>,
    ) {
        let (gx, gy) = self.gradient.gradient(src);
        let (gxx, gxy) = self.gradient.gradient(gx.view());
        let (gyx, gyy) = self.gradient.gradient(gy.view());

        Zip::from(norm)
            .and(&gx)
            .and(&gy)
            .for_each(|n, &x, &y| *n = x.hypot(y));

        Zip::from(lap)
            .and(hes)
            .and(&gxx)
            .and(&gxy)
            .and(&gyx)
            .and(&gyy)
            .for_each(|l, h, &xx, &xy, &yx, &yy| {
                *l = (xx + yy).max(0.0);
                *h = (-(xx * yy - xy * yx)).max(0.0);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Calibration;
    use ndarray::Array3;

    #[test]
    fn test_sigma_must_be_positive() {
        assert!(DerivativeEngine::new(0.0).is_err());
        assert!(DerivativeEngine::new(1.0).is_ok());
    }

    #[test]
    fn test_flat_volume_has_no_derivatives() {
        let v = VolumeBuffer::from_array(Array3::from_elem((2, 6, 6), 0.5), Calibration::unit());
        let d = DerivativeEngine::new(1.0).unwrap().compute(&v).unwrap();
        for b in [&d.gradient_norm, &d.laplacian, &d.hessian] {
            assert!(b.data().iter().all(|&x| x.abs() < 1e-6));
        }
    }

    #[test]
    fn test_ramp_gradient() {
        // 沿 w 方向线性增长, 内部梯度模为斜率, 二阶量为 0.
        let data = Array3::from_shape_fn((1, 16, 24), |(_, _, w)| w as f32 * 0.1);
        let v = VolumeBuffer::from_array(data, Calibration::unit());
        let d = DerivativeEngine::new(1.0).unwrap().compute(&v).unwrap();
        assert!((d.gradient_norm[(0, 8, 12)] - 0.1).abs() < 1e-5);
        assert!(d.laplacian[(0, 8, 12)].abs() < 1e-5);
        assert!(d.hessian[(0, 8, 12)].abs() < 1e-5);
    }

    #[test]
    fn test_bright_spot_has_negative_laplacian_at_center() {
        // 亮斑中心是极大值: 拉普拉斯为负 (被截为 0), Hessian 行列式为正 (被截为 0).
        let data = Array3::from_shape_fn((1, 21, 21), |(_, h, w)| {
            let r2 = (h as f32 - 10.0).powi(2) + (w as f32 - 10.0).powi(2);
            (-r2 / 18.0).exp()
        });
        let v = VolumeBuffer::from_array(data, Calibration::unit());
        let d = DerivativeEngine::new(1.0).unwrap().compute(&v).unwrap();
        assert_eq!(d.laplacian[(0, 10, 10)], 0.0);
        assert_eq!(d.hessian[(0, 10, 10)], 0.0);
        // 远离中心处曲率为正.
        assert!(d.laplacian[(0, 10, 18)] > 0.0);
        assert!(d.gradient_norm[(0, 10, 13)] > d.gradient_norm[(0, 10, 10)]);
    }
}
