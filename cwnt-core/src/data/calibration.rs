//! 物理标定.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Idx3d;

/// 单个体素的物理尺寸 `(sx, sy, sz)`.
///
/// 标定附着在源体数据上, 在整个流程中只读, 用于把体素个数换算为物理体积/半径,
/// 以及计算聚类时的物理距离.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    x: f64,
    y: f64,
    z: f64,
}

impl Calibration {
    /// 创建标定. 三个分量都必须是有限正数, 否则返回 `None`.
    pub fn new(x: f64, y: f64, z: f64) -> Option<Self> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        (ok(x) && ok(y) && ok(z)).then_some(Self { x, y, z })
    }

    /// 各向同性的单位标定.
    #[inline]
    pub const fn unit() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
    }

    /// 物理 `x` (宽度 `w`) 方向分辨率.
    #[inline]
    pub const fn x(&self) -> f64 {
        self.x
    }

    /// 物理 `y` (高度 `h`) 方向分辨率.
    #[inline]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// 物理 `z` (相邻切片) 方向分辨率.
    #[inline]
    pub const fn z(&self) -> f64 {
        self.z
    }

    /// 按照 `[z, h, w]` 的顺序获取分辨率, 与体数据的轴顺序一致.
    #[inline]
    pub const fn pix_dim(&self) -> [f64; 3] {
        [self.z, self.y, self.x]
    }

    /// 获取体素的物理体积.
    #[inline]
    pub fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }

    /// 将体素索引 `(z, h, w)` 转换为物理坐标 `[x, y, z]`.
    #[inline]
    pub fn to_physical(&self, (z, h, w): Idx3d) -> [f64; 3] {
        [w as f64 * self.x, h as f64 * self.y, z as f64 * self.z]
    }
}

impl Default for Calibration {
    #[inline]
    fn default() -> Self {
        Self::unit()
    }
}
