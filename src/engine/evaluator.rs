// ==========================================
// Peeps 排课系统 - 序列评估引擎
// ==========================================
// 职责: 给定一个活动顺序 + 名册快照 + 容量目标，贪心分配并产出一个 EventSequence
// 流程（逐场活动）:
// 1) 按优先级队列遍历参与者: 主角色 → (SwitchIfPrimaryFull) 副角色 → 主角色候补
// 2) SwitchIfNeeded: 欠员角色从对侧候补中补人
// 3) 达到绝对最少人数 → 平衡角色 → 仍不达标则尝试降档
// 4) 达标: 记录分配、重置优先级、移到队尾；不达标: 清空名单
// 全部活动处理完后: 校验候补 → finalize
// 红线: 每个排列使用独立的名册/活动副本
// ==========================================

use crate::config::ClassConfig;
use crate::domain::event::Event;
use crate::domain::peep::Peep;
use crate::domain::sequence::EventSequence;
use crate::domain::types::{Role, SwitchPreference};
use crate::engine::error::{ScheduleError, ScheduleResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

// ==========================================
// SequenceEvaluator
// ==========================================
#[derive(Debug, Clone)]
pub struct SequenceEvaluator {
    config: Arc<ClassConfig>,
    enable_switch_if_needed: bool,
}

impl SequenceEvaluator {
    /// 构造函数
    ///
    /// # 参数
    /// - config: 时长档位表（只读共享）
    /// - enable_switch_if_needed: 关闭时 SwitchIfNeeded 等同 PrimaryOnly
    pub fn new(config: Arc<ClassConfig>, enable_switch_if_needed: bool) -> Self {
        Self {
            config,
            enable_switch_if_needed,
        }
    }

    pub fn class_config(&self) -> &ClassConfig {
        &self.config
    }

    /// 为一个排列构造独立的序列并评估
    ///
    /// # 参数
    /// - events_by_id: 基准活动（不会被修改）
    /// - peeps: 基准名册（不会被修改）
    /// - order: 活动处理顺序
    /// - target_max: 本轮每角色容量目标
    /// - permutation_index: 排列下标
    pub fn evaluate_permutation(
        &self,
        events_by_id: &HashMap<u32, Event>,
        peeps: &[Peep],
        order: &[u32],
        target_max: u32,
        permutation_index: usize,
    ) -> ScheduleResult<EventSequence> {
        let events = order
            .iter()
            .filter_map(|id| events_by_id.get(id).cloned())
            .collect();
        let mut sequence =
            EventSequence::new(events, peeps.to_vec()).with_origin(target_max, permutation_index);
        self.evaluate(&mut sequence)?;
        Ok(sequence)
    }

    /// 评估序列（就地修改并 finalize）
    pub fn evaluate(&self, sequence: &mut EventSequence) -> ScheduleResult<()> {
        for pos in 0..sequence.events.len() {
            self.evaluate_event(sequence, pos)?;
        }

        // 后续活动可能让早先的候补失去资格
        for pos in sequence.valid_event_positions().to_vec() {
            sequence.events[pos].validate_alternates(&sequence.peeps);
        }

        sequence.finalize();
        Ok(())
    }

    fn evaluate_event(&self, sequence: &mut EventSequence, pos: usize) -> ScheduleResult<()> {
        let queue = sequence.queue().to_vec();
        let target_max = sequence.target_max;

        let event = &mut sequence.events[pos];
        let peeps = &sequence.peeps;

        let effective_max = effective_capacity(event, target_max);
        self.fill_from_queue(event, peeps, &queue, effective_max)?;
        if self.enable_switch_if_needed {
            promote_switch_if_needed(event, peeps, effective_max)?;
        }

        if event.meets_absolute_min(self.config.abs_min_role()) {
            event.balance_roles()?;
            if !event.meets_min() {
                let from = event.duration_minutes();
                if event.downgrade_duration(&self.config)? {
                    debug!(event_id = event.id, from, to = event.duration_minutes(), "活动降档");
                }
            }
        } else if event.meets_min() {
            // 短时长活动在绝对最少人数以下也可能达标，仍需平衡
            event.balance_roles()?;
        }

        if !event.meets_min() {
            trace!(event_id = event.id, "活动未达最少人数，作废");
            event.clear_participants();
            return Ok(());
        }

        let date = event.date;
        let assigned: Vec<usize> = event.assignment_order().iter().map(|(idx, _)| *idx).collect();
        for idx in assigned {
            let peep = sequence
                .peeps
                .get_mut(idx)
                .ok_or(ScheduleError::UnknownParticipant(idx))?;
            peep.record_assignment(date);
            peep.reset_for_success();
            sequence.move_to_back(idx);
        }
        sequence.mark_valid(pos);
        Ok(())
    }

    /// 按队列顺序把参与者放入正式名单或候补名单
    fn fill_from_queue(
        &self,
        event: &mut Event,
        peeps: &[Peep],
        queue: &[usize],
        effective_max: usize,
    ) -> ScheduleResult<()> {
        for &idx in queue {
            let peep = peeps.get(idx).ok_or(ScheduleError::UnknownParticipant(idx))?;
            if !peep.can_attend(event) {
                continue;
            }

            let primary = peep.role;
            let secondary = primary.opposite();

            if event.num_attendees(primary) < effective_max {
                event.add_attendee(idx, primary)?;
            } else if peep.switch_pref == SwitchPreference::SwitchIfPrimaryFull
                && event.num_attendees(secondary) < effective_max
            {
                event.add_attendee(idx, secondary)?;
                trace!(event_id = event.id, peep_id = %peep.id, role = %secondary, "主角色已满，安排到副角色");
            } else {
                event.add_alternate(idx, primary)?;
            }
        }
        Ok(())
    }
}

/// 本轮有效容量: min(容量目标, 当前时长 max_role)
pub fn effective_capacity(event: &Event, target_max: u32) -> usize {
    if target_max == 0 {
        return event.max_role() as usize;
    }
    target_max.min(event.max_role()) as usize
}

/// 欠员角色从对侧 SwitchIfNeeded 候补中按候补顺序补人，
/// 直到达到当前时长 min_role 或达到有效容量
fn promote_switch_if_needed(event: &mut Event, peeps: &[Peep], effective_max: usize) -> ScheduleResult<()> {
    for role in Role::ALL {
        let min_role = event.min_role() as usize;
        if event.num_attendees(role) >= min_role {
            continue;
        }

        let opposite = role.opposite();
        let eligible: Vec<usize> = event
            .alternates(opposite)
            .iter()
            .copied()
            .filter(|idx| {
                peeps
                    .get(*idx)
                    .is_some_and(|p| p.switch_pref == SwitchPreference::SwitchIfNeeded)
            })
            .collect();

        for idx in eligible {
            if event.num_attendees(role) >= min_role || event.num_attendees(role) >= effective_max {
                break;
            }
            event.remove_alternate(idx, opposite)?;
            event.add_attendee(idx, role)?;
            trace!(event_id = event.id, peep_idx = idx, role = %role, "SwitchIfNeeded 候补转入欠员角色");
        }
    }
    Ok(())
}
