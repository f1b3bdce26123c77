//! 可分离高斯卷积与中心差分.

use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};

/// 计算高斯半核 `k[0..n]`, 其中 `k[0]` 为中心权重.
///
/// 半核长度为 `max(2, floor(3σ + 0.5) + 1)`, 并归一化使完整核 (中心加两侧) 之和为 1.
/// `sigma <= 0` 时返回单位核 `[1.0]`.
pub fn gaussian_half_kernel(sigma: f64) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let size = ((3.0 * sigma + 0.5) as usize + 1).max(2);
    let s2 = sigma * sigma;
    let mut k: Vec<f64> = (0..size)
        .map(|x| (-0.5 * (x * x) as f64 / s2).exp())
        .collect();
    let total = k[0] + 2.0 * k[1..].iter().sum::<f64>();
    k.iter_mut().for_each(|v| *v /= total);
    k.into_iter().map(|v| v as f32).collect()
}

/// 边界复制: 把越界索引夹到 `[0, len)` 内.
#[inline]
pub(crate) fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// 沿 `axis` 方向用对称半核 `half` 对 `src` 做一维卷积, 结果写入 `dst`.
/// 边界以复制边缘像素的方式延拓.
fn convolve_axis(src: ArrayView2<f32>, mut dst: ArrayViewMut2<f32>, half: &[f32], axis: Axis) {
    debug_assert_eq!(src.dim(), dst.dim());
    let len = src.len_of(axis) as isize;
    for (src_lane, mut dst_lane) in src.lanes(axis).into_iter().zip(dst.lanes_mut(axis)) {
        for i in 0..len {
            let mut acc = half[0] * src_lane[i as usize];
            for (k, &wk) in half.iter().enumerate().skip(1) {
                let k = k as isize;
                let lo = src_lane[clamp_index(i - k, len as usize)];
                let hi = src_lane[clamp_index(i + k, len as usize)];
                acc += wk * (lo + hi);
            }
            dst_lane[i as usize] = acc;
        }
    }
}

/// 用对称半核 `half` 对 2D 切片做可分离卷积 (先 `w` 方向, 后 `h` 方向).
pub fn smooth_slice(src: ArrayView2<f32>, dst: ArrayViewMut2<f32>, half: &[f32]) {
    if half.len() == 1 {
        let mut dst = dst;
        dst.assign(&src);
        return;
    }
    let mut tmp = Array2::<f32>::zeros(src.dim());
    convolve_axis(src, tmp.view_mut(), half, Axis(1));
    convolve_axis(tmp.view(), dst, half, Axis(0));
}

/// 中心差分 `(f(i + 1) - f(i - 1)) / 2`, 边界复制. 返回 `(d/dx, d/dy)`,
/// 即分别沿 `w` 与 `h` 方向的偏导.
pub fn central_difference(src: ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
    let (h, w) = src.dim();
    let dx = Array2::from_shape_fn((h, w), |(i, j)| {
        let l = src[(i, clamp_index(j as isize - 1, w))];
        let r = src[(i, clamp_index(j as isize + 1, w))];
        (r - l) * 0.5
    });
    let dy = Array2::from_shape_fn((h, w), |(i, j)| {
        let u = src[(clamp_index(i as isize - 1, h), j)];
        let d = src[(clamp_index(i as isize + 1, h), j)];
        (d - u) * 0.5
    });
    (dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_kernel_is_normalized() {
        for sigma in [0.5, 1.0, 2.3] {
            let k = gaussian_half_kernel(sigma);
            let total: f32 = k[0] + 2.0 * k[1..].iter().sum::<f32>();
            assert!(f32_eq(total, 1.0));
            assert!(k.windows(2).all(|p| p[0] > p[1]));
        }
        assert_eq!(gaussian_half_kernel(0.5).len(), 3);
        assert_eq!(gaussian_half_kernel(0.0), vec![1.0]);
    }

    #[test]
    fn test_smoothing_keeps_constant() {
        let src = Array2::<f32>::from_elem((7, 5), 3.0);
        let mut dst = Array2::<f32>::zeros((7, 5));
        smooth_slice(src.view(), dst.view_mut(), &gaussian_half_kernel(1.5));
        assert!(dst.iter().all(|&v| f32_eq(v, 3.0)));
    }

    #[test]
    fn test_smoothing_preserves_mass_of_centered_impulse() {
        let mut src = Array2::<f32>::zeros((21, 21));
        src[(10, 10)] = 1.0;
        let mut dst = Array2::<f32>::zeros((21, 21));
        smooth_slice(src.view(), dst.view_mut(), &gaussian_half_kernel(1.0));
        assert!(f32_eq(dst.sum(), 1.0));
        assert!(f32_eq(dst[(9, 10)], dst[(11, 10)]));
        assert!(f32_eq(dst[(10, 9)], dst[(9, 10)]));
    }

    #[test]
    fn test_central_difference_of_ramp() {
        let src = Array2::from_shape_fn((4, 6), |(i, j)| (2 * j + i) as f32);
        let (dx, dy) = central_difference(src.view());
        assert!(f32_eq(dx[(2, 2)], 2.0));
        assert!(f32_eq(dy[(2, 2)], 1.0));
        // 边界复制, 只有一侧有差
        assert!(f32_eq(dx[(0, 0)], 1.0));
        assert!(f32_eq(dy[(0, 0)], 0.5));
    }
}
