//! 3x3 中值滤波.

use ndarray::{ArrayView2, ArrayViewMut2};
use ordered_float::OrderedFloat;

use super::kernel::clamp_index;

/// 对 2D 切片做 3x3 中值滤波, 结果写入 `dst`. 边界以复制边缘像素的方式延拓.
pub fn median3x3(src: ArrayView2<f32>, mut dst: ArrayViewMut2<f32>) {
    debug_assert_eq!(src.dim(), dst.dim());
    let (h, w) = src.dim();
    let mut window = [OrderedFloat(0.0f32); 9];
    for ((i, j), out) in dst.indexed_iter_mut() {
        let mut n = 0;
        for di in -1..=1isize {
            let ii = clamp_index(i as isize + di, h);
            for dj in -1..=1isize {
                let jj = clamp_index(j as isize + dj, w);
                window[n] = OrderedFloat(src[(ii, jj)]);
                n += 1;
            }
        }
        window.sort_unstable();
        *out = window[4].into_inner();
    }
}
