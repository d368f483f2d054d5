// ==========================================
// Peeps 排课系统 - 活动排列生成
// ==========================================
// 活动数由 reduce_overlap 封顶（默认 7 → 5040 个排列），全量枚举，不做剪枝
// 排列按下标即时生成，不预先物化整个排列表
// ==========================================

use std::ops::Range;

/// 第 k 个排列（按输入顺序的字典序，k 即 permutation_index）
///
/// k 超出 n! 时按 k mod n! 处理；空输入返回空排列
pub fn nth_permutation(ids: &[u32], k: usize) -> Vec<u32> {
    let mut pool = ids.to_vec();
    let mut rest = k % permutation_count(ids.len());
    let mut out = Vec::with_capacity(ids.len());

    for remaining in (0..ids.len()).rev() {
        let block = permutation_count(remaining);
        let pick = rest / block;
        rest %= block;
        out.push(pool.remove(pick));
    }
    out
}

/// n! （溢出时饱和）
pub fn permutation_count(n: usize) -> usize {
    (1..=n).fold(1usize, |acc, k| acc.saturating_mul(k))
}

/// 把 [0, total) 切成至多 workers 个连续区间
pub fn chunk_ranges(total: usize, workers: usize) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, total);
    let size = total.div_ceil(workers);
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn test_nth_permutation_order() {
        assert_eq!(nth_permutation(&[1, 2, 3], 0), vec![1, 2, 3]);
        assert_eq!(nth_permutation(&[1, 2, 3], 1), vec![1, 3, 2]);
        assert_eq!(nth_permutation(&[1, 2, 3], 5), vec![3, 2, 1]);
        assert_eq!(nth_permutation(&[1, 2, 3], 6), vec![1, 2, 3]);
        assert!(nth_permutation(&[], 0).is_empty());
    }

    #[test]
    fn test_nth_permutation_matches_itertools() {
        let ids = [4, 9, 2, 7];
        let expected: Vec<Vec<u32>> = ids.iter().copied().permutations(ids.len()).collect();
        let generated: Vec<Vec<u32>> = (0..permutation_count(ids.len()))
            .map(|k| nth_permutation(&ids, k))
            .collect();
        assert_eq!(generated, expected);
    }

    #[test]
    fn test_permutation_count() {
        assert_eq!(permutation_count(0), 1);
        assert_eq!(permutation_count(7), 5040);
        assert_eq!(permutation_count(100), usize::MAX);
    }

    #[test]
    fn test_chunk_ranges_cover_everything() {
        let ranges = chunk_ranges(10, 3);
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);

        let ranges = chunk_ranges(2, 8);
        assert_eq!(ranges, vec![0..1, 1..2]);

        assert!(chunk_ranges(0, 4).is_empty());
    }
}
