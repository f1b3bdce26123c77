//! k-means++ 聚类.
//!
//! 播种: 第一个中心均匀随机选取, 之后每个中心以到最近已选中心距离平方为权重随机选取.
//! 之后做标准 Lloyd 迭代, 直到分配不再变化.

use rand::Rng;

use crate::consts::KMEANS_MAX_ITERATIONS;

/// 三维物理坐标.
pub type Point = [f64; 3];

/// 一个聚类: 成员在输入中的下标, 以及成员的质心.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// 成员下标, 升序.
    pub members: Vec<usize>,

    /// 成员质心.
    pub centroid: Point,
}

#[inline]
fn dist2(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// 最近中心的下标与距离平方. 等距时取下标较小者.
fn nearest(p: &Point, centers: &[Point]) -> (usize, f64) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, dist2(p, c)))
        .fold((0, f64::INFINITY), |best, cur| {
            if cur.1 < best.1 {
                cur
            } else {
                best
            }
        })
}

fn seed<R: Rng>(points: &[Point], k: usize, rng: &mut R) -> Vec<Point> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);
    let mut d2: Vec<f64> = points.iter().map(|p| dist2(p, &centers[0])).collect();

    while centers.len() < k {
        let total: f64 = d2.iter().sum();
        let chosen = if total > 0.0 {
            let r = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            d2.iter()
                .position(|&d| {
                    acc += d;
                    acc >= r && d > 0.0
                })
                .unwrap_or_else(|| d2.iter().rposition(|&d| d > 0.0).unwrap_or(0))
        } else {
            rng.gen_range(0..points.len())
        };
        let c = points[chosen];
        centers.push(c);
        for (d, p) in d2.iter_mut().zip(points.iter()) {
            *d = d.min(dist2(p, &c));
        }
    }
    centers
}

fn centroid_of(points: &[Point], members: &[usize]) -> Point {
    let n = members.len() as f64;
    let mut c = [0.0; 3];
    for &i in members {
        for (acc, v) in c.iter_mut().zip(points[i].iter()) {
            *acc += v;
        }
    }
    c.map(|v| v / n)
}

/// 把 `points` 聚成 `k` 类.
///
/// # 注意
///
/// 1. 调用方须保证 `0 < k < points.len()`, 否则程序 panic.
/// 2. 迭代中出现空类时, 用离其所属中心最远的点重新播种该类.
/// 3. 返回的聚类都非空.
pub fn kmeans_pp<R: Rng>(points: &[Point], k: usize, rng: &mut R) -> Vec<Cluster> {
    assert!(k > 0 && k < points.len(), "k-means++ needs 0 < k < n");
    let mut centers = seed(points, k, rng);
    let mut assignment = vec![usize::MAX; points.len()];

    for _ in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for (a, p) in assignment.iter_mut().zip(points.iter()) {
            let (i, _) = nearest(p, &centers);
            if *a != i {
                *a = i;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut members = vec![Vec::new(); k];
        for (i, &a) in assignment.iter().enumerate() {
            members[a].push(i);
        }
        for (c, m) in centers.iter_mut().zip(members.iter()) {
            if !m.is_empty() {
                *c = centroid_of(points, m);
            }
        }
        for empty in (0..k).filter(|&c| members[c].is_empty()) {
            let far = (0..points.len())
                .max_by(|&a, &b| {
                    let da = dist2(&points[a], &centers[assignment[a]]);
                    let db = dist2(&points[b], &centers[assignment[b]]);
                    da.total_cmp(&db)
                })
                .unwrap_or(0);
            centers[empty] = points[far];
        }
    }

    let mut members = vec![Vec::new(); k];
    for (i, &a) in assignment.iter().enumerate() {
        members[a].push(i);
    }
    members
        .into_iter()
        .filter(|m| !m.is_empty())
        .map(|m| Cluster {
            centroid: centroid_of(points, &m),
            members: m,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn blob(cx: f64, n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| [cx + (i % 3) as f64 * 0.1, (i / 3 % 3) as f64 * 0.1, (i / 9) as f64 * 0.1])
            .collect()
    }

    #[test]
    fn test_two_well_separated_groups() {
        let mut pts = blob(0.0, 27);
        pts.extend(blob(10.0, 27));
        let mut rng = StdRng::seed_from_u64(7);
        let mut clusters = kmeans_pp(&pts, 2, &mut rng);
        clusters.sort_by(|a, b| a.centroid[0].total_cmp(&b.centroid[0]));
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, (0..27).collect::<Vec<_>>());
        assert_eq!(clusters[1].members, (27..54).collect::<Vec<_>>());
        assert!((clusters[0].centroid[0] - 0.1).abs() < 1e-9);
        assert!((clusters[1].centroid[0] - 10.1).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_result() {
        let pts: Vec<Point> = (0..60)
            .map(|i| [(i * 7 % 13) as f64, (i * 5 % 11) as f64, (i % 4) as f64])
            .collect();
        let a = kmeans_pp(&pts, 3, &mut StdRng::seed_from_u64(1));
        let b = kmeans_pp(&pts, 3, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
        assert_eq!(a.iter().map(|c| c.members.len()).sum::<usize>(), 60);
    }

    #[test]
    fn test_seeding_never_duplicates_centers() {
        // 只有三个不同位置, 选三个中心时必须各取一个.
        let pts: Vec<Point> = [[0.0; 3], [0.0; 3], [5.0, 0.0, 0.0], [5.0, 0.0, 0.0], [0.0, 9.0, 0.0]]
            .to_vec();
        for s in 0..20 {
            let c = seed(&pts, 3, &mut StdRng::seed_from_u64(s));
            assert!(c[0] != c[1] && c[1] != c[2] && c[0] != c[2]);
        }
    }
}
