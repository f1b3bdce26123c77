//! 逐切片并行执行.
//!
//! 各阶段把输出缓冲区按 z 方向切片划分, 每个切片交给一个工作线程.
//! 工作函数只读取自己切片对应的输入, 不共享可变状态, 因此无需加锁.
//! 启用 `rayon` feature 时并行执行, 否则顺序执行.

use ndarray::{ArrayViewMut2, ArrayViewMut3, Axis};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 对 `dst` 的每个水平可变切片实施 `op` 操作. 该操作会同时携带 z 方向索引信息.
#[cfg(feature = "rayon")]
pub(crate) fn for_each_slice<T, F>(mut dst: ArrayViewMut3<'_, T>, op: F)
where
    T: Send + Sync,
    F: Fn(usize, ArrayViewMut2<T>) + Sync + Send,
{
    dst.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(z, s)| op(z, s));
}

/// 对 `dst` 的每个水平可变切片实施 `op` 操作. 该操作会同时携带 z 方向索引信息.
#[cfg(not(feature = "rayon"))]
pub(crate) fn for_each_slice<T, F>(mut dst: ArrayViewMut3<'_, T>, op: F)
where
    T: Send + Sync,
    F: Fn(usize, ArrayViewMut2<T>) + Sync + Send,
{
    dst.axis_iter_mut(Axis(0))
        .enumerate()
        .for_each(|(z, s)| op(z, s));
}

/// 同时对三个同形状缓冲区的对应切片实施 `op` 操作.
#[cfg(feature = "rayon")]
pub(crate) fn for_each_slice3<T, F>(
    mut a: ArrayViewMut3<'_, T>,
    mut b: ArrayViewMut3<'_, T>,
    mut c: ArrayViewMut3<'_, T>,
    op: F,
) where
    T: Send + Sync,
    F: Fn(usize, ArrayViewMut2<T>, ArrayViewMut2<T>, ArrayViewMut2<T>) + Sync + Send,
{
    debug_assert_eq!(a.dim(), b.dim());
    debug_assert_eq!(a.dim(), c.dim());
    a.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(b.axis_iter_mut(Axis(0)))
        .zip(c.axis_iter_mut(Axis(0)))
        .enumerate()
        .for_each(|(z, ((sa, sb), sc))| op(z, sa, sb, sc));
}

/// 同时对三个同形状缓冲区的对应切片实施 `op` 操作.
#[cfg(not(feature = "rayon"))]
pub(crate) fn for_each_slice3<T, F>(
    mut a: ArrayViewMut3<'_, T>,
    mut b: ArrayViewMut3<'_, T>,
    mut c: ArrayViewMut3<'_, T>,
    op: F,
) where
    T: Send + Sync,
    F: Fn(usize, ArrayViewMut2<T>, ArrayViewMut2<T>, ArrayViewMut2<T>) + Sync + Send,
{
    debug_assert_eq!(a.dim(), b.dim());
    debug_assert_eq!(a.dim(), c.dim());
    itertools::izip!(
        a.axis_iter_mut(Axis(0)),
        b.axis_iter_mut(Axis(0)),
        c.axis_iter_mut(Axis(0))
    )
    .enumerate()
    .for_each(|(z, (sa, sb, sc))| op(z, sa, sb, sc));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_every_slice_visited_once() {
        let mut a = Array3::<u32>::zeros((6, 2, 3));
        for_each_slice(a.view_mut(), |z, mut s| s.fill(z as u32 + 1));
        for z in 0..6 {
            assert!(a.index_axis(Axis(0), z).iter().all(|&v| v == z as u32 + 1));
        }
    }

    #[test]
    fn test_three_buffers_stay_aligned() {
        let mut a = Array3::<f32>::zeros((4, 2, 2));
        let mut b = a.clone();
        let mut c = a.clone();
        for_each_slice3(a.view_mut(), b.view_mut(), c.view_mut(), |z, mut x, mut y, mut w| {
            x.fill(z as f32);
            y.fill(2.0 * z as f32);
            w.fill(3.0 * z as f32);
        });
        assert_eq!(a[(3, 1, 1)], 3.0);
        assert_eq!(b[(3, 1, 1)], 6.0);
        assert_eq!(c[(3, 1, 1)], 9.0);
    }
}
