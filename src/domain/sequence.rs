// ==========================================
// Peeps 排课系统 - 候选排课序列
// ==========================================
// 一个 EventSequence = 一种活动处理顺序 + 一个容量目标下的完整分配结果
// 存储: events/peeps 为本序列独占的值快照，活动名单通过下标引用 peeps
// 红线: 指标只有在 finalize() 之后才有意义
// ==========================================

use crate::domain::event::Event;
use crate::domain::peep::Peep;
use crate::domain::types::Role;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

/// 去重键: (活动ID, 排序后的 leader ID, 排序后的 follower ID)，按活动ID升序
pub type SequenceKey = Vec<(u32, Vec<String>, Vec<String>)>;

// ==========================================
// SequenceMetrics - 序列评分指标
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SequenceMetrics {
    pub num_unique_attendees: usize, // 至少分到一场的人数
    pub priority_fulfilled: u64,     // 分到场次者的运行前优先级之和
    pub normalized_utilization: f64, // 各有效活动 已填/最大 名额的平均
    pub total_attendees: usize,      // 已填名额总数（同一人多场重复计）
    pub system_weight: u64,          // 运行后优先级之和（越低越公平）
}

/// 非主角色分配记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffPrimaryAssignment {
    pub event_id: u32,
    pub peep_id: String,
    pub assigned_role: Role,
}

// ==========================================
// EventSequence
// ==========================================
#[derive(Debug, Clone)]
pub struct EventSequence {
    pub events: Vec<Event>, // 按处理顺序
    pub peeps: Vec<Peep>,   // 名册 (arena)
    queue: Vec<usize>,      // 优先级队列（名册下标，队首最优先）
    valid_events: Vec<usize>, // 有效活动在 events 中的位置（按处理顺序）

    // ===== 来源 =====
    pub target_max: u32,
    pub permutation_index: usize,

    metrics: SequenceMetrics,
    finalized: bool,
}

impl EventSequence {
    /// 创建序列
    ///
    /// 初始优先级队列按参与者 index 升序（上期 finalize 的输出顺序）
    pub fn new(events: Vec<Event>, peeps: Vec<Peep>) -> Self {
        let mut queue: Vec<usize> = (0..peeps.len()).collect();
        queue.sort_by_key(|i| peeps[*i].index);

        Self {
            events,
            peeps,
            queue,
            valid_events: Vec::new(),
            target_max: 0,
            permutation_index: 0,
            metrics: SequenceMetrics::default(),
            finalized: false,
        }
    }

    /// 记录该序列来自哪个容量目标 / 哪个排列
    pub fn with_origin(mut self, target_max: u32, permutation_index: usize) -> Self {
        self.target_max = target_max;
        self.permutation_index = permutation_index;
        self
    }

    // ==========================================
    // 队列 / 有效活动
    // ==========================================

    pub fn queue(&self) -> &[usize] {
        &self.queue
    }

    /// 将参与者移到队尾（本序列后续活动中优先级最低）
    pub fn move_to_back(&mut self, peep_idx: usize) {
        if let Some(pos) = self.queue.iter().position(|p| *p == peep_idx) {
            self.queue.remove(pos);
            self.queue.push(peep_idx);
        }
    }

    pub fn mark_valid(&mut self, event_pos: usize) {
        if !self.valid_events.contains(&event_pos) {
            self.valid_events.push(event_pos);
        }
    }

    pub fn valid_event_positions(&self) -> &[usize] {
        &self.valid_events
    }

    /// 有效活动（按处理顺序）
    pub fn valid_events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.valid_events.iter().filter_map(|pos| self.events.get(*pos))
    }

    pub fn valid_event_ids(&self) -> Vec<u32> {
        self.valid_events().map(|e| e.id).collect()
    }

    pub fn has_valid_events(&self) -> bool {
        !self.valid_events.is_empty()
    }

    /// 按当前队列顺序遍历参与者
    pub fn peeps_by_priority(&self) -> impl Iterator<Item = &Peep> + '_ {
        self.queue.iter().filter_map(|i| self.peeps.get(*i))
    }

    pub fn peep_id(&self, peep_idx: usize) -> Option<&str> {
        self.peeps.get(peep_idx).map(|p| p.id.as_str())
    }

    // ==========================================
    // 收尾与指标
    // ==========================================

    /// 收尾
    ///
    /// 1) 分到场次: 累加 total_attended
    /// 2) 未分到但已回复: priority + 1；未回复: 不变
    /// 3) 按 priority 降序重排（同 priority 保持当前队列顺序）并重新编号 index，作为下期初始队列
    /// 4) 计算各项指标
    pub fn finalize(&mut self) {
        let mut metrics = SequenceMetrics::default();

        for peep in self.peeps.iter_mut() {
            if peep.num_events > 0 {
                peep.total_attended += peep.num_events;
                metrics.num_unique_attendees += 1;
                metrics.total_attendees += peep.num_events as usize;
                metrics.priority_fulfilled += u64::from(peep.original_priority);
            } else if peep.responded {
                peep.priority += 1;
            }
            metrics.system_weight += u64::from(peep.priority);
        }

        // 稳定排序: 同 priority 保持当前队列顺序（已分到场次的人此前已移到队尾）
        let mut order = self.queue.clone();
        order.sort_by_key(|i| Reverse(self.peeps[*i].priority));
        for (new_index, idx) in order.iter().enumerate() {
            self.peeps[*idx].index = new_index;
        }
        self.queue = order;

        let valid_count = self.valid_events.len();
        if valid_count > 0 {
            let sum: f64 = self.valid_events().map(|e| e.utilization()).sum();
            metrics.normalized_utilization = sum / valid_count as f64;
        }

        self.metrics = metrics;
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn metrics(&self) -> &SequenceMetrics {
        &self.metrics
    }

    /// 去重键（与活动处理顺序、名单加入顺序、候补名单无关）
    pub fn key(&self) -> SequenceKey {
        let ids = |list: &[usize]| {
            let mut v: Vec<String> = list
                .iter()
                .filter_map(|i| self.peep_id(*i).map(str::to_string))
                .collect();
            v.sort();
            v
        };

        let mut key: SequenceKey = self
            .valid_events()
            .map(|e| (e.id, ids(e.leaders()), ids(e.followers())))
            .collect();
        key.sort_by_key(|(id, _, _)| *id);
        key
    }

    /// 被安排到非主角色的记录
    pub fn off_primary_assignments(&self) -> Vec<OffPrimaryAssignment> {
        let mut out = Vec::new();
        for event in self.valid_events() {
            for (idx, role) in event.assignment_order() {
                if let Some(peep) = self.peeps.get(*idx) {
                    if peep.role != *role {
                        out.push(OffPrimaryAssignment {
                            event_id: event.id,
                            peep_id: peep.id.clone(),
                            assigned_role: *role,
                        });
                    }
                }
            }
        }
        out
    }

    /// 名单展示行，如 "Leaders(4): Ann, Bo, ..."
    pub fn roster_line(&self, event: &Event, role: Role) -> String {
        let names: Vec<&str> = event
            .attendees(role)
            .iter()
            .filter_map(|i| self.peeps.get(*i))
            .map(|p| p.label())
            .collect();
        let title = match role {
            Role::Leader => "Leaders",
            Role::Follower => "Followers",
        };
        format!("{}({}): {}", title, names.len(), names.join(", "))
    }
}

impl fmt::Display for EventSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.valid_event_ids().iter().map(u32::to_string).collect();
        write!(
            f,
            "EventSequence: valid events: {{ {} }}, unique_peeps {}/{}, system_weight {}",
            ids.join(", "),
            self.metrics.num_unique_attendees,
            self.peeps.len(),
            self.metrics.system_weight
        )?;
        for event in self.valid_events() {
            write!(f, "\n\t{}", event)?;
            write!(f, "\n\t  {}", self.roster_line(event, Role::Leader))?;
            write!(f, "\n\t  {}", self.roster_line(event, Role::Follower))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassConfig;
    use chrono::NaiveDate;

    fn event(id: u32) -> Event {
        let date = NaiveDate::from_ymd_opt(2025, 3, 21)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        Event::new(id, date, 90, &ClassConfig::default()).unwrap()
    }

    fn peep(id: &str, role: Role, priority: u32, index: usize) -> Peep {
        let mut p = Peep::new(id, format!("Peep {}", id), role);
        p.priority = priority;
        p.index = index;
        p.responded = true;
        p.event_limit = 2;
        p.begin_run();
        p
    }

    #[test]
    fn test_new_sequence_queue_follows_index() {
        let peeps = vec![
            peep("a", Role::Leader, 0, 2),
            peep("b", Role::Leader, 0, 0),
            peep("c", Role::Follower, 0, 1),
        ];
        let seq = EventSequence::new(vec![], peeps);
        assert_eq!(seq.queue(), &[1, 2, 0]);
        assert_eq!(*seq.metrics(), SequenceMetrics::default());
        assert!(!seq.is_finalized());
    }

    #[test]
    fn test_move_to_back() {
        let peeps = vec![
            peep("a", Role::Leader, 0, 0),
            peep("b", Role::Leader, 0, 1),
            peep("c", Role::Follower, 0, 2),
        ];
        let mut seq = EventSequence::new(vec![], peeps);
        seq.move_to_back(0);
        assert_eq!(seq.queue(), &[1, 2, 0]);
    }

    #[test]
    fn test_finalize_updates_priorities_and_metrics() {
        let mut peeps = vec![
            peep("1", Role::Leader, 3, 0),
            peep("2", Role::Follower, 5, 1),
            peep("3", Role::Leader, 2, 2),
            peep("4", Role::Follower, 1, 3),
        ];
        // 4 未回复
        peeps[3].responded = false;

        let mut e = event(1);
        e.add_attendee(0, Role::Leader).unwrap();
        e.add_attendee(1, Role::Follower).unwrap();

        let mut seq = EventSequence::new(vec![e], peeps);
        for idx in [0, 1] {
            let date = seq.events[0].date;
            seq.peeps[idx].record_assignment(date);
            seq.peeps[idx].reset_for_success();
        }
        seq.mark_valid(0);
        seq.finalize();

        let m = seq.metrics();
        assert_eq!(m.num_unique_attendees, 2);
        assert_eq!(m.priority_fulfilled, 8);
        assert_eq!(m.total_attendees, 2);
        // 90 分钟 max_role = 5 → 2 / 10
        assert!((m.normalized_utilization - 0.2).abs() < 1e-9);

        assert_eq!(seq.peeps[0].priority, 0);
        assert_eq!(seq.peeps[1].priority, 0);
        assert_eq!(seq.peeps[2].priority, 3); // 已回复未分到: +1
        assert_eq!(seq.peeps[3].priority, 1); // 未回复: 不变
        assert_eq!(m.system_weight, 4);

        assert_eq!(seq.peeps[0].total_attended, 1);
        assert_eq!(seq.peeps[2].total_attended, 0);
    }

    #[test]
    fn test_finalize_sorts_by_priority_then_index() {
        let peeps = vec![
            peep("1", Role::Leader, 1, 0),
            peep("2", Role::Leader, 5, 1),
            peep("3", Role::Leader, 3, 2),
            peep("4", Role::Leader, 3, 3),
        ];
        let mut seq = EventSequence::new(vec![], peeps);
        seq.finalize();

        let order: Vec<&str> = seq.peeps_by_priority().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["2", "3", "4", "1"]);
        assert_eq!(seq.peeps[1].index, 0);
        assert_eq!(seq.peeps[2].index, 1);
        assert_eq!(seq.peeps[3].index, 2);
        assert_eq!(seq.peeps[0].index, 3);
    }

    #[test]
    fn test_finalize_ties_keep_queue_order() {
        let peeps = vec![
            peep("1", Role::Leader, 0, 0),
            peep("2", Role::Follower, 0, 1),
            peep("3", Role::Leader, 0, 2),
        ];
        let mut e = event(1);
        e.add_attendee(0, Role::Leader).unwrap();
        e.add_attendee(1, Role::Follower).unwrap();

        let mut seq = EventSequence::new(vec![e], peeps);
        // 3 未回复，priority 保持 0，与已分到场次的 1、2 并列
        seq.peeps[2].responded = false;
        for idx in [0, 1] {
            let date = seq.events[0].date;
            seq.peeps[idx].record_assignment(date);
            seq.peeps[idx].reset_for_success();
            seq.move_to_back(idx);
        }
        seq.mark_valid(0);
        seq.finalize();

        let order: Vec<&str> = seq.peeps_by_priority().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["3", "1", "2"]);
        assert_eq!(seq.peeps[2].index, 0);
        assert_eq!(seq.peeps[0].index, 1);
        assert_eq!(seq.peeps[1].index, 2);
    }

    #[test]
    fn test_key_ignores_insertion_order() {
        let peeps = vec![
            peep("1", Role::Leader, 0, 0),
            peep("2", Role::Leader, 0, 1),
            peep("3", Role::Follower, 0, 2),
            peep("4", Role::Leader, 0, 3),
        ];

        let mut e1 = event(1);
        e1.add_attendee(0, Role::Leader).unwrap();
        e1.add_attendee(1, Role::Leader).unwrap();
        e1.add_attendee(2, Role::Follower).unwrap();

        let mut e2 = event(1);
        e2.add_attendee(2, Role::Follower).unwrap();
        e2.add_attendee(1, Role::Leader).unwrap();
        e2.add_attendee(0, Role::Leader).unwrap();
        e2.add_alternate(3, Role::Leader).unwrap();

        let mut a = EventSequence::new(vec![e1], peeps.clone());
        a.mark_valid(0);
        let mut b = EventSequence::new(vec![e2], peeps);
        b.mark_valid(0);

        assert_eq!(a.key(), b.key());
        assert_eq!(
            a.key(),
            vec![(1, vec!["1".to_string(), "2".to_string()], vec!["3".to_string()])]
        );
    }

    #[test]
    fn test_key_distinguishes_roles_and_events() {
        let peeps = vec![peep("1", Role::Leader, 0, 0), peep("2", Role::Follower, 0, 1)];

        let mut as_leader = event(1);
        as_leader.add_attendee(0, Role::Leader).unwrap();
        let mut as_follower = event(1);
        as_follower.add_attendee(0, Role::Follower).unwrap();
        let mut other_event = event(2);
        other_event.add_attendee(0, Role::Leader).unwrap();

        let build = |e: Event| {
            let mut s = EventSequence::new(vec![e], peeps.clone());
            s.mark_valid(0);
            s.key()
        };

        let k1 = build(as_leader);
        let k2 = build(as_follower);
        let k3 = build(other_event);
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_off_primary_assignments() {
        let peeps = vec![peep("1", Role::Follower, 0, 0), peep("2", Role::Follower, 0, 1)];
        let mut e = event(1);
        e.add_attendee(0, Role::Leader).unwrap();
        e.add_attendee(1, Role::Follower).unwrap();

        let mut seq = EventSequence::new(vec![e], peeps);
        seq.mark_valid(0);

        let off = seq.off_primary_assignments();
        assert_eq!(off.len(), 1);
        assert_eq!(off[0].peep_id, "1");
        assert_eq!(off[0].assigned_role, Role::Leader);
    }
}
