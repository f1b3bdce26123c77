//! 3D 6-连通域标记.

use std::collections::VecDeque;
use std::time::Instant;

use log::debug;
use ndarray::ArrayView3;

use crate::consts::BACKGROUND;
use crate::data::try_zeros;
use crate::error::SegmentResult;
use crate::{LabelGenerator, LabelVolume};

/// 标记 `binary` 中所有 6-连通 (仅共面相邻) 的前景连通域.
///
/// 按行优先顺序遇到每个连通域的第一个体素时从 `generator` 取一个新标签,
/// 然后以广度优先方式填充整个连通域. 背景为 0.
pub fn label_components(
    binary: ArrayView3<bool>,
    generator: &LabelGenerator,
) -> SegmentResult<LabelVolume> {
    let t = Instant::now();
    let mut labels = LabelVolume::from_array(try_zeros(binary.dim(), "component labeling")?);
    let mut queue = VecDeque::new();
    let mut count = 0usize;

    for (pos, &fg) in binary.indexed_iter() {
        if !fg || labels[pos] != BACKGROUND {
            continue;
        }
        let label = generator.next_label();
        count += 1;
        labels[pos] = label;
        queue.push_back(pos);
        while let Some(cur) = queue.pop_front() {
            for n in labels.diamond_neighbours(cur) {
                if binary[n] && labels[n] == BACKGROUND {
                    labels[n] = label;
                    queue.push_back(n);
                }
            }
        }
    }

    debug!("labeling: {count} components in {:?}", t.elapsed());
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::collections::BTreeSet;

    #[test]
    fn test_two_disjoint_blobs() {
        let mut b = Array3::from_elem((4, 5, 6), false);
        for w in 0..2 {
            b[(1, 1, w)] = true;
        }
        b[(2, 1, 1)] = true;
        b[(3, 4, 5)] = true;
        b[(2, 4, 5)] = true;
        let g = LabelGenerator::new();
        let lv = label_components(b.view(), &g).unwrap();
        assert_eq!(lv.labels(), BTreeSet::from([1, 2]));
        assert_eq!(lv.count(1), 3);
        assert_eq!(lv.count(2), 2);
        assert_eq!(lv[(0, 0, 0)], 0);
        assert_eq!(g.peek(), 3);
    }

    #[test]
    fn test_diagonal_contact_is_not_connected() {
        let mut b = Array3::from_elem((3, 3, 3), false);
        b[(0, 0, 0)] = true;
        b[(1, 1, 1)] = true;
        b[(2, 2, 1)] = true;
        let lv = label_components(b.view(), &LabelGenerator::new()).unwrap();
        assert_eq!(lv.labels().len(), 3);

        let mut b = Array3::from_elem((1, 2, 2), false);
        b[(0, 0, 0)] = true;
        b[(0, 1, 1)] = true;
        let lv = label_components(b.view(), &LabelGenerator::new()).unwrap();
        assert_eq!(lv.labels().len(), 2);
    }

    #[test]
    fn test_continues_shared_generator() {
        let mut b = Array3::from_elem((1, 1, 3), false);
        b[(0, 0, 0)] = true;
        b[(0, 0, 2)] = true;
        let g = LabelGenerator::starting_at(40);
        let lv = label_components(b.view(), &g).unwrap();
        assert_eq!(lv.labels(), BTreeSet::from([40, 41]));
        assert_eq!(g.next_label(), 42);
    }

    #[test]
    fn test_u_shape_is_one_component() {
        // 在行优先扫描中两臂先分开出现, 随后在底部相连.
        let mut b = Array3::from_elem((1, 4, 3), false);
        for h in 0..4 {
            b[(0, h, 0)] = true;
            b[(0, h, 2)] = true;
        }
        b[(0, 3, 1)] = true;
        let lv = label_components(b.view(), &LabelGenerator::new()).unwrap();
        assert_eq!(lv.labels(), BTreeSet::from([1]));
        assert_eq!(lv.count(1), 9);
    }
}
