//! 合成体模. 用于测试与消融实验.

use ndarray::Array3;

use super::Pixel;
use crate::Idx3d;

/// 在 `(z, h, w)` 形状的空白体数据中绘制若干实心球.
///
/// # 参数
///
/// 1. `centers` 以 `(z, h, w)` 给出球心.
/// 2. 到球心的欧氏距离不超过 `radius` 的体素被置为 `value`.
/// 3. 超出数据范围的部分会被裁掉.
pub fn spheres<T: Pixel>(shape: Idx3d, centers: &[Idx3d], radius: usize, value: T) -> Array3<T> {
    let mut out = Array3::from_elem(shape, T::default());
    let r2 = (radius * radius) as i64;
    for &(cz, ch, cw) in centers {
        let (cz, ch, cw) = (cz as i64, ch as i64, cw as i64);
        out.indexed_iter_mut()
            .filter(|((z, h, w), _)| {
                let (dz, dh, dw) = (*z as i64 - cz, *h as i64 - ch, *w as i64 - cw);
                dz * dz + dh * dh + dw * dw <= r2
            })
            .for_each(|(_, v)| *v = value);
    }
    out
}

/// 两个半径为 11 的球沿 `w` 方向相接, 组成 "8" 字形.
///
/// 体数据宽 50, 高 40, 深 40; 球心位于 `(x, y, z) = (15, 20, 20)` 与 `(35, 20, 20)`.
pub fn touching_pair<T: Pixel>(value: T) -> Array3<T> {
    spheres((40, 40, 50), &[(20, 20, 15), (20, 20, 35)], 11, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_voxel_sphere() {
        let a = spheres((3, 3, 3), &[(1, 1, 1)], 0, 1u8);
        assert_eq!(a.iter().filter(|&&v| v == 1).count(), 1);
    }

    #[test]
    fn test_radius_one_is_diamond() {
        let a = spheres((3, 3, 3), &[(1, 1, 1)], 1, 1u8);
        assert_eq!(a.iter().filter(|&&v| v == 1).count(), 7);
    }

    #[test]
    fn test_touching_pair_symmetry() {
        let a = touching_pair(1u8);
        assert_eq!(a.dim(), (40, 40, 50));
        assert_eq!(a[(20, 20, 15)], 1);
        assert_eq!(a[(20, 20, 25)], 1);
        assert_eq!(a[(20, 20, 0)], 0);
        let left = a.indexed_iter().filter(|&((_, _, w), &v)| v == 1 && w < 25).count();
        let right = a.indexed_iter().filter(|&((_, _, w), &v)| v == 1 && w > 25).count();
        assert_eq!(left, right);
    }
}
