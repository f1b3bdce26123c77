//! 合成时间序列: 两个逐帧相互靠近的球.
//!
//! 第一帧两球相距 `start_gap` 个体素 (球心距离减去两倍半径), 之后每帧靠近 `step` 个体素,
//! 间距为负表示两球相交. 用于观察分裂阶段在 "分离, 相切, 融合" 三种情形下的表现.

use cwnt_core::{phantom, Calibration, Idx3d, VolumeBuffer};

/// 序列参数.
#[derive(Debug, Clone, Copy)]
pub struct DriftingPair {
    /// 每帧的形状 `(z, h, w)`.
    pub shape: Idx3d,

    /// 球半径 (体素).
    pub radius: usize,

    /// 第一帧两球表面间距.
    pub start_gap: isize,

    /// 每帧靠近的距离.
    pub step: isize,

    /// 帧数.
    pub frames: usize,

    /// 球内像素值.
    pub value: u16,
}

impl Default for DriftingPair {
    fn default() -> Self {
        Self {
            shape: (24, 32, 64),
            radius: 7,
            start_gap: 6,
            step: 1,
            frames: 12,
            value: 1200,
        }
    }
}

impl DriftingPair {
    /// 第 `t` 帧两球的球心距离. 不小于 0.
    pub fn center_distance(&self, t: usize) -> usize {
        let d = 2 * self.radius as isize + self.start_gap - self.step * t as isize;
        d.max(0) as usize
    }

    /// 第 `t` 帧两球的球心, `(z, h, w)` 组织, 沿 `w` 方向对称分布.
    pub fn centers(&self, t: usize) -> [Idx3d; 2] {
        let (z, h, w) = self.shape;
        let d = self.center_distance(t);
        let cw = w / 2;
        let left = cw.saturating_sub(d / 2);
        let right = (left + d).min(w.saturating_sub(1));
        [(z / 2, h / 2, left), (z / 2, h / 2, right)]
    }

    /// 生成第 `t` 帧.
    pub fn frame(&self, t: usize) -> VolumeBuffer {
        let pixels = phantom::spheres(self.shape, &self.centers(t), self.radius, self.value);
        VolumeBuffer::from_pixels(pixels.view(), Calibration::unit())
    }

    /// 生成整个序列.
    pub fn generate(&self) -> Vec<VolumeBuffer> {
        (0..self.frames).map(|t| self.frame(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_approaches() {
        let s = DriftingPair::default();
        assert_eq!(s.center_distance(0), 20);
        assert_eq!(s.center_distance(6), 14);
        let [a, b] = s.centers(6);
        assert_eq!(b.2 - a.2, 14);
        assert_eq!((a.0, a.1), (12, 16));
    }

    #[test]
    fn test_frames_have_shape() {
        let s = DriftingPair {
            frames: 3,
            ..Default::default()
        };
        let frames = s.generate();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.shape() == s.shape));
        assert!(frames[0].data().iter().any(|&v| v == 1200.0));
    }
}
