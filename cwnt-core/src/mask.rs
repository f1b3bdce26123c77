//! "皇冠" 软掩膜.
//!
//! `M = 0.5 * (tanh(γ - (α·Gnorm + β·L + ε·H) / δ) + 1)`, 取值于 `[0, 1]`.
//! 细胞核边界处三项导数量较大, 掩膜接近 0, 相乘后相邻细胞核被分开.

use std::time::Instant;

use log::debug;
use ndarray::{Axis, Zip};

use crate::consts::keys;
use crate::derivative::Derivatives;
use crate::error::{ConfigIssue, SegmentResult};
use crate::exec::for_each_slice;
use crate::VolumeBuffer;

/// 掩膜函数的五个系数.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskCoefficients {
    gamma: f64,
    alpha: f64,
    beta: f64,
    epsilon: f64,
    delta: f64,
}

impl MaskCoefficients {
    /// 创建系数. 全部须为有限数, 且 `delta != 0`. 返回发现的全部问题.
    pub fn new(
        gamma: f64,
        alpha: f64,
        beta: f64,
        epsilon: f64,
        delta: f64,
    ) -> Result<Self, Vec<ConfigIssue>> {
        let mut issues: Vec<ConfigIssue> = [
            (keys::GAMMA, gamma),
            (keys::ALPHA, alpha),
            (keys::BETA, beta),
            (keys::EPSILON, epsilon),
            (keys::DELTA, delta),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_finite())
        .map(|(key, value)| ConfigIssue::OutOfRange {
            key,
            value,
            constraint: "finite",
        })
        .collect();
        if delta == 0.0 {
            issues.push(ConfigIssue::OutOfRange {
                key: keys::DELTA,
                value: delta,
                constraint: "!= 0",
            });
        }
        if issues.is_empty() {
            Ok(Self {
                gamma,
                alpha,
                beta,
                epsilon,
                delta,
            })
        } else {
            Err(issues)
        }
    }

    /// 计算单个体素的掩膜值.
    #[inline]
    pub fn eval(&self, gradient_norm: f32, laplacian: f32, hessian: f32) -> f32 {
        let s = self.alpha * gradient_norm as f64
            + self.beta * laplacian as f64
            + self.epsilon * hessian as f64;
        (0.5 * ((self.gamma - s / self.delta).tanh() + 1.0)) as f32
    }
}

/// 流程第四阶段.
#[derive(Debug, Clone, Copy)]
pub struct MaskBuilder {
    coefficients: MaskCoefficients,
}

impl MaskBuilder {
    /// 以给定系数创建.
    #[inline]
    pub fn new(coefficients: MaskCoefficients) -> Self {
        Self { coefficients }
    }

    /// 由导数量计算掩膜.
    pub fn build(&self, d: &Derivatives) -> SegmentResult<VolumeBuffer> {
        let t = Instant::now();
        let mut mask = d.gradient_norm.try_zeros_like("mask")?;
        let (g, l, h) = (d.gradient_norm.data(), d.laplacian.data(), d.hessian.data());
        let c = self.coefficients;
        for_each_slice(mask.data_mut(), |z, dst| {
            Zip::from(dst)
                .and(g.index_axis(Axis(0), z))
                .and(l.index_axis(Axis(0), z))
                .and(h.index_axis(Axis(0), z))
                .for_each(|out, &gn, &lp, &hs| *out = c.eval(gn, lp, hs));
        });
        debug!("mask: {} voxels in {:?}", mask.size(), t.elapsed());
        Ok(mask)
    }

    /// 掩膜与滤波图像逐体素相乘.
    pub fn apply(filtered: &VolumeBuffer, mask: &VolumeBuffer) -> SegmentResult<VolumeBuffer> {
        debug_assert_eq!(filtered.shape(), mask.shape());
        let mut masked = filtered.try_zeros_like("masked image")?;
        let (f, m) = (filtered.data(), mask.data());
        for_each_slice(masked.data_mut(), |z, dst| {
            Zip::from(dst)
                .and(f.index_axis(Axis(0), z))
                .and(m.index_axis(Axis(0), z))
                .for_each(|out, &pixel, &weight| *out = pixel * weight);
        });
        Ok(masked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Calibration;
    use ndarray::Array3;

    fn unit() -> MaskCoefficients {
        MaskCoefficients::new(1.0, 1.0, 1.0, 1.0, 1.0).unwrap()
    }

    #[test]
    fn test_delta_zero_rejected() {
        let e = MaskCoefficients::new(1.0, 1.0, 1.0, 1.0, 0.0).unwrap_err();
        assert_eq!(e.len(), 1);
        let e = MaskCoefficients::new(f64::NAN, 1.0, f64::INFINITY, 1.0, 0.0).unwrap_err();
        assert_eq!(e.len(), 3);
    }

    #[test]
    fn test_mask_range_and_monotonicity() {
        let c = unit();
        let flat = c.eval(0.0, 0.0, 0.0);
        assert!((flat as f64 - 0.5 * (1f64.tanh() + 1.0)).abs() < 1e-6);
        let edge = c.eval(5.0, 1.0, 1.0);
        assert!(edge < flat);
        assert!(edge >= 0.0 && flat <= 1.0);
    }

    #[test]
    fn test_apply_multiplies() {
        let f = VolumeBuffer::from_array(Array3::from_elem((2, 2, 2), 10.0), Calibration::unit());
        let m = VolumeBuffer::from_array(
            Array3::from_shape_fn((2, 2, 2), |(z, _, _)| z as f32 * 0.5),
            Calibration::unit(),
        );
        let out = MaskBuilder::apply(&f, &m).unwrap();
        assert_eq!(out[(0, 1, 1)], 0.0);
        assert_eq!(out[(1, 0, 1)], 5.0);
    }

    #[test]
    fn test_build_from_derivatives() {
        let zeros = VolumeBuffer::from_array(Array3::zeros((1, 3, 3)), Calibration::unit());
        let mut g = zeros.clone();
        g[(0, 1, 1)] = 10.0;
        let d = Derivatives {
            gradient_norm: g,
            laplacian: zeros.clone(),
            hessian: zeros,
        };
        let m = MaskBuilder::new(unit()).build(&d).unwrap();
        assert!(m[(0, 1, 1)] < 1e-6);
        assert!((m[(0, 0, 0)] - unit().eval(0.0, 0.0, 0.0)).abs() < 1e-7);
    }
}
