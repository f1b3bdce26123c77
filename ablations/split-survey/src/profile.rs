//! 单个分裂参数下的运行统计.

use cwnt_core::prelude::*;
use std::time::Duration;

/// 质量直方图的分档: 1, (0, 1), 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct QualityBins {
    /// 未分裂.
    pub whole: u64,

    /// 分裂产生的子核.
    pub split: u64,

    /// 退化连通域.
    pub degenerate: u64,
}

impl QualityBins {
    /// 计入一个细胞核.
    #[inline]
    pub fn count(&mut self, spot: &Spot) {
        match spot.quality() {
            q if q >= 1.0 => self.whole += 1,
            q if q > 0.0 => self.split += 1,
            _ => self.degenerate += 1,
        }
    }
}

/// ablation 数据统计.
#[derive(Clone, Debug, Default)]
pub struct Profile {
    /// 每帧的细胞核个数. 失败的帧为 `None`.
    per_frame: Vec<Option<usize>>,

    /// 全部细胞核的质量分档.
    quality: QualityBins,

    /// 全部帧的分割耗时之和.
    segment_time: Duration,

    /// 最耗时的一帧.
    most: Option<Duration>,

    /// 每帧细胞核之间的最小物理距离. 不足两个细胞核的帧为 `None`.
    nearest: Vec<Option<f64>>,

    /// 整个任务的自然时间.
    real_time: Duration,
}

impl Profile {
    /// 记录一帧的结果.
    pub fn record(&mut self, frame: &SegmentResult<FrameResult>) {
        match frame {
            Ok(r) => {
                r.spots.iter().for_each(|s| self.quality.count(s));
                self.per_frame.push(Some(r.spots.len()));
                self.nearest.push(nearest_pair(&r.spots));
                self.segment_time += r.elapsed;
                self.most = Some(self.most.map_or(r.elapsed, |m| m.max(r.elapsed)));
            }
            Err(e) => {
                log::warn!("frame {} failed: {e}", self.per_frame.len());
                self.per_frame.push(None);
                self.nearest.push(None);
            }
        }
    }

    /// 结束计时.
    #[inline]
    pub fn finish(mut self, real_time: Duration) -> Self {
        self.real_time = real_time;
        self
    }

    /// 每帧的细胞核个数.
    #[inline]
    pub fn per_frame(&self) -> &[Option<usize>] {
        &self.per_frame
    }

    /// 每帧细胞核之间的最小距离.
    #[inline]
    pub fn nearest(&self) -> &[Option<f64>] {
        &self.nearest
    }

    /// 失败的帧数.
    pub fn failed(&self) -> usize {
        self.per_frame.iter().filter(|n| n.is_none()).count()
    }

    /// 质量分档.
    #[inline]
    pub fn quality(&self) -> QualityBins {
        self.quality
    }

    /// 以微秒为单位获得平均每帧分割时间. 没有成功的帧时返回 `None`.
    pub fn avg_segment_time_us(&self) -> Option<f64> {
        match self.per_frame.len() - self.failed() {
            0 => None,
            n => Some(self.segment_time.as_micros() as f64 / n as f64),
        }
    }

    /// 最耗时的一帧.
    #[inline]
    pub fn most_time_consuming(&self) -> Option<Duration> {
        self.most
    }

    /// 整个任务的自然时间 (微秒).
    #[inline]
    pub fn real_time_us(&self) -> u64 {
        self.real_time.as_micros() as u64
    }
}

/// 两两之间最小的中心距离.
fn nearest_pair(spots: &[Spot]) -> Option<f64> {
    spots
        .iter()
        .enumerate()
        .flat_map(|(i, a)| spots[i + 1..].iter().map(move |b| a.distance_to(b)))
        .min_by(f64::total_cmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_pair() {
        let spots = [
            Spot::new([0.0, 0.0, 0.0], 1.0, 1.0),
            Spot::new([10.0, 0.0, 0.0], 1.0, 1.0),
            Spot::new([0.0, 3.0, 4.0], 1.0, 1.0),
        ];
        assert_eq!(nearest_pair(&spots), Some(5.0));
        assert_eq!(nearest_pair(&spots[..1]), None);
        assert_eq!(nearest_pair(&[]), None);
    }
}
