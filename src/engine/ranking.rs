// ==========================================
// Peeps 排课系统 - 候选序列去重与排名
// ==========================================
// 排名指标（全部降序）:
// 1) num_unique_attendees
// 2) priority_fulfilled
// 3) normalized_utilization
// 4) total_attendees（仅作为最终决胜）
// 前三项并列的序列全部作为候选，交给调用方选择
// ==========================================

use crate::domain::sequence::EventSequence;
use itertools::Itertools;
use std::cmp::Ordering;

/// 利用率比较容差
/// 利用率比较精度: 先量化到该粒度再比较，保证比较关系可传递
const UTILIZATION_QUANTUM: f64 = 1e-9;

/// 去重（保留每个结构键的第一次出现，输入顺序即优先顺序）
pub fn deduplicate(sequences: Vec<EventSequence>) -> Vec<EventSequence> {
    sequences.into_iter().unique_by(|s| s.key()).collect()
}

/// 排名比较: 越好越靠前
pub fn compare(a: &EventSequence, b: &EventSequence) -> Ordering {
    let (ma, mb) = (a.metrics(), b.metrics());
    mb.num_unique_attendees
        .cmp(&ma.num_unique_attendees)
        .then(mb.priority_fulfilled.cmp(&ma.priority_fulfilled))
        .then(cmp_utilization(mb.normalized_utilization, ma.normalized_utilization))
        .then(mb.total_attendees.cmp(&ma.total_attendees))
}

fn utilization_key(value: f64) -> f64 {
    (value / UTILIZATION_QUANTUM).round()
}

fn cmp_utilization(a: f64, b: f64) -> Ordering {
    utilization_key(a).total_cmp(&utilization_key(b))
}

/// 前三项指标是否并列
fn tied_on_leading_metrics(a: &EventSequence, b: &EventSequence) -> bool {
    let (ma, mb) = (a.metrics(), b.metrics());
    ma.num_unique_attendees == mb.num_unique_attendees
        && ma.priority_fulfilled == mb.priority_fulfilled
        && cmp_utilization(ma.normalized_utilization, mb.normalized_utilization) == Ordering::Equal
}

/// 去重 + 排名 + 取并列第一组
///
/// 无有效活动的序列不参与排名。返回的候选按完整指标（含 total_attendees）排好序，
/// 稳定排序保证同分时维持输入顺序。
pub fn top_candidates(sequences: Vec<EventSequence>) -> Vec<EventSequence> {
    let mut unique: Vec<EventSequence> = deduplicate(sequences)
        .into_iter()
        .filter(EventSequence::has_valid_events)
        .collect();
    if unique.is_empty() {
        return unique;
    }

    unique.sort_by(compare);
    let tied = unique
        .iter()
        .take_while(|s| tied_on_leading_metrics(s, &unique[0]))
        .count();
    unique.truncate(tied);
    unique
}

// ==========================================
// Selection - 排名结果
// ==========================================
#[derive(Debug, Clone)]
pub enum Selection {
    /// 没有任何可行序列
    Empty,
    /// 唯一最优，自动选中
    Selected(Box<EventSequence>),
    /// 多个并列候选，需要外部选择
    Tied(Vec<EventSequence>),
}

impl Selection {
    pub fn from_candidates(mut candidates: Vec<EventSequence>) -> Self {
        match candidates.len() {
            0 => Selection::Empty,
            1 => match candidates.pop() {
                Some(only) => Selection::Selected(Box::new(only)),
                None => Selection::Empty,
            },
            _ => Selection::Tied(candidates),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Selection::Empty => 0,
            Selection::Selected(_) => 1,
            Selection::Tied(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty)
    }

    /// 全部候选（只读）
    pub fn candidates(&self) -> Vec<&EventSequence> {
        match self {
            Selection::Empty => Vec::new(),
            Selection::Selected(s) => vec![s.as_ref()],
            Selection::Tied(c) => c.iter().collect(),
        }
    }

    /// 取出指定候选（Selected 时只接受 0）
    pub fn choose(self, index: usize) -> Option<EventSequence> {
        match self {
            Selection::Empty => None,
            Selection::Selected(s) => (index == 0).then(|| *s),
            Selection::Tied(mut c) => (index < c.len()).then(|| c.swap_remove(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassConfig;
    use crate::domain::event::Event;
    use crate::domain::peep::Peep;
    use crate::domain::types::Role;
    use chrono::NaiveDate;

    fn roster(n: usize) -> Vec<Peep> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { Role::Leader } else { Role::Follower };
                let mut p = Peep::new(i.to_string(), format!("Peep {}", i), role);
                p.index = i;
                p.priority = i as u32;
                p.responded = true;
                p.event_limit = 1;
                p.begin_run();
                p
            })
            .collect()
    }

    /// 构造一个已 finalize 的序列: events 为 (活动ID, leader 下标, follower 下标)
    fn sequence(events: &[(u32, &[usize], &[usize])], perm: usize) -> EventSequence {
        let peeps = roster(16);
        let date = NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();

        let built: Vec<Event> = events
            .iter()
            .map(|(id, leaders, followers)| {
                let mut e = Event::new(*id, date, 90, &ClassConfig::default()).unwrap();
                for l in leaders.iter() {
                    e.add_attendee(*l, Role::Leader).unwrap();
                }
                for f in followers.iter() {
                    e.add_attendee(*f, Role::Follower).unwrap();
                }
                e
            })
            .collect();

        let mut seq = EventSequence::new(built, peeps).with_origin(4, perm);
        for pos in 0..events.len() {
            let ids: Vec<usize> = seq.events[pos]
                .assignment_order()
                .iter()
                .map(|(i, _)| *i)
                .collect();
            for i in ids {
                seq.peeps[i].num_events += 1;
                seq.peeps[i].reset_for_success();
            }
            seq.mark_valid(pos);
        }
        seq.finalize();
        seq
    }

    #[test]
    fn test_deduplicate_collapses_same_rosters() {
        let a = sequence(&[(1, &[0, 2, 4, 6], &[1, 3, 5, 7])], 0);
        let b = sequence(&[(1, &[6, 4, 2, 0], &[7, 5, 3, 1])], 1);
        let c = sequence(&[(2, &[0, 2, 4, 6], &[1, 3, 5, 7])], 2);

        let unique = deduplicate(vec![a, b, c]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].permutation_index, 0);
        assert_eq!(unique[1].permutation_index, 2);
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let pool = vec![
            sequence(&[(1, &[0, 2, 4, 6], &[1, 3, 5, 7])], 0),
            sequence(&[(1, &[0, 2, 4, 6], &[1, 3, 5, 7])], 1),
            sequence(&[(1, &[8, 10, 12, 14], &[9, 11, 13, 15])], 2),
        ];
        let once = deduplicate(pool);
        let once_keys: Vec<_> = once.iter().map(|s| s.key()).collect();
        let twice = deduplicate(once);
        let twice_keys: Vec<_> = twice.iter().map(|s| s.key()).collect();
        assert_eq!(once_keys, twice_keys);
    }

    #[test]
    fn test_top_candidates_prefers_higher_priority_fulfilled() {
        // 人数相同，第二个序列覆盖的 priority 更高
        let low = sequence(&[(1, &[0, 2, 4, 6], &[1, 3, 5, 7])], 0);
        let high = sequence(&[(1, &[8, 10, 12, 14], &[9, 11, 13, 15])], 1);

        let top = top_candidates(vec![low, high]);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].permutation_index, 1);
    }

    #[test]
    fn test_top_candidates_keeps_ties() {
        // 同一批人，不同活动: 前三项指标完全相同
        let a = sequence(&[(1, &[0, 2, 4, 6], &[1, 3, 5, 7])], 0);
        let b = sequence(&[(2, &[0, 2, 4, 6], &[1, 3, 5, 7])], 1);

        let top = top_candidates(vec![a, b]);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].permutation_index, 0);

        match Selection::from_candidates(top) {
            Selection::Tied(c) => assert_eq!(c.len(), 2),
            other => panic!("expected tie, got {:?}", other.len()),
        }
    }

    #[test]
    fn test_unique_attendees_dominates() {
        let small = sequence(&[(1, &[8, 10, 12, 14], &[9, 11, 13, 15])], 0);
        let big = sequence(
            &[(1, &[0, 2, 4, 6], &[1, 3, 5, 7]), (2, &[8, 10, 12, 14], &[9, 11, 13, 15])],
            1,
        );
        let top = top_candidates(vec![small, big]);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].metrics().num_unique_attendees, 16);
    }

    #[test]
    fn test_empty_sequences_are_excluded() {
        let empty = EventSequence::new(Vec::new(), roster(2));
        assert!(top_candidates(vec![empty]).is_empty());
        assert!(Selection::from_candidates(Vec::new()).is_empty());
    }

    #[test]
    fn test_selection_choose() {
        let only = sequence(&[(1, &[0, 2, 4, 6], &[1, 3, 5, 7])], 4);
        let selection = Selection::from_candidates(vec![only]);
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.clone().choose(0).map(|s| s.permutation_index), Some(4));
        assert!(selection.choose(1).is_none());
    }

    #[test]
    fn test_utilization_comparison_is_transitive() {
        let (a, b, c) = (0.5, 0.5 + 0.7e-9, 0.5 + 1.4e-9);
        let ab = cmp_utilization(a, b);
        let bc = cmp_utilization(b, c);
        let ac = cmp_utilization(a, c);
        // a ≤ b ≤ c 时 a ≤ c，且相等关系可传递
        assert_ne!(ab, Ordering::Greater);
        assert_ne!(bc, Ordering::Greater);
        assert_ne!(ac, Ordering::Greater);
        if ab == Ordering::Equal && bc == Ordering::Equal {
            assert_eq!(ac, Ordering::Equal);
        }

        // 浮点累加误差视为并列
        assert_eq!(cmp_utilization(0.1 + 0.2, 0.3), Ordering::Equal);
        assert_eq!(cmp_utilization(0.4, 0.5), Ordering::Less);
    }
}
