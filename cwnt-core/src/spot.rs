//! 最终输出: 细胞核.

use std::f64::consts::PI;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 检测到的细胞核. 创建后不可变.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spot {
    position: [f64; 3],
    radius: f64,
    quality: f64,
}

impl Spot {
    /// 由物理坐标 `[x, y, z]`, 半径与质量创建.
    #[inline]
    pub const fn new(position: [f64; 3], radius: f64, quality: f64) -> Self {
        Self {
            position,
            radius,
            quality,
        }
    }

    /// 由物理坐标与物理体积创建, 半径取等效球半径.
    #[inline]
    pub fn from_volume(position: [f64; 3], volume: f64, quality: f64) -> Self {
        Self::new(position, radius_from_volume(volume), quality)
    }

    /// 物理坐标 `[x, y, z]`.
    #[inline]
    pub const fn position(&self) -> [f64; 3] {
        self.position
    }

    /// 物理 `x` 坐标.
    #[inline]
    pub const fn x(&self) -> f64 {
        self.position[0]
    }

    /// 物理 `y` 坐标.
    #[inline]
    pub const fn y(&self) -> f64 {
        self.position[1]
    }

    /// 物理 `z` 坐标.
    #[inline]
    pub const fn z(&self) -> f64 {
        self.position[2]
    }

    /// 等效球半径.
    #[inline]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// 质量. 未分裂的连通域为 1, n 路分裂的子核为 `1/n`, 退化连通域为 0.
    #[inline]
    pub const fn quality(&self) -> f64 {
        self.quality
    }

    /// 与另一个细胞核中心的物理距离.
    pub fn distance_to(&self, other: &Spot) -> f64 {
        self.position
            .iter()
            .zip(other.position.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl fmt::Display for Spot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.position;
        write!(
            f,
            "Spot(x = {x:.3}, y = {y:.3}, z = {z:.3}, r = {:.3}, q = {:.3})",
            self.radius, self.quality
        )
    }
}

/// 等效球半径 `(3V / 4π)^(1/3)`.
#[inline]
pub fn radius_from_volume(volume: f64) -> f64 {
    (3.0 * volume / (4.0 * PI)).cbrt()
}

/// 球体积 `4πr³ / 3`.
#[inline]
pub fn volume_from_radius(radius: f64) -> f64 {
    4.0 * PI * radius.powi(3) / 3.0
}
