//! 体素位置直方图与峰计数.

use crate::Idx3d;

/// 在包围盒 `[min, max]` 内, 分别统计 `(z, h, w)` 三个方向上的体素位置直方图.
///
/// 如果存在越出包围盒的坐标, 则程序 panic.
pub fn position_histograms(positions: &[Idx3d], min: Idx3d, max: Idx3d) -> [Vec<u32>; 3] {
    let mut hist = [
        vec![0u32; max.0 - min.0 + 1],
        vec![0u32; max.1 - min.1 + 1],
        vec![0u32; max.2 - min.2 + 1],
    ];
    for &(z, h, w) in positions {
        hist[0][z - min.0] += 1;
        hist[1][h - min.1] += 1;
        hist[2][w - min.2] += 1;
    }
    hist
}

/// 计数直方图 `h` 中的峰.
///
/// 从左往右扫描: 上升过程中第一次下降记一个峰, 持平不改变状态 (平台保护).
/// 最后一级若严格高于倒数第二级, 也记一个峰. 长度不超过 1 的直方图没有峰.
pub fn count_peaks(h: &[u32]) -> usize {
    if h.len() <= 1 {
        return 0;
    }
    let mut peaks = 0;
    let mut was_going_up = true;
    for pair in h.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if cur < prev && was_going_up {
            peaks += 1;
            was_going_up = false;
        } else if cur > prev {
            was_going_up = true;
        } else if cur < prev {
            was_going_up = false;
        }
    }
    if h[h.len() - 1] > h[h.len() - 2] {
        peaks += 1;
    }
    peaks
}

/// 估计连通域应分裂成的个数: 各方向峰数之积, 只计入峰数大于 1 的方向.
pub fn estimate_split_count(histograms: &[Vec<u32>; 3]) -> usize {
    histograms
        .iter()
        .map(|h| count_peaks(h))
        .filter(|&n| n > 1)
        .product()
}
