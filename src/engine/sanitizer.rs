// ==========================================
// Peeps 排课系统 - 活动预筛选引擎
// ==========================================
// 职责:
// 1) sanitize: 剔除按主角色可用人数无法达到绝对最少人数的活动
// 2) reduce_overlap: 活动数超过上限时，按参与者重叠度迭代剔除
// 红线: 只看可用性，不做任何分配
// ==========================================

use crate::config::ClassConfig;
use crate::domain::event::Event;
use crate::domain::peep::Peep;
use crate::domain::types::Role;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// 预筛选结果
#[derive(Debug, Clone)]
pub struct SanitizeOutcome {
    pub kept: Vec<Event>,
    pub removed_ids: Vec<u32>,
}

// ==========================================
// EventSanitizer
// ==========================================
pub struct EventSanitizer {
    abs_min_role: u32,
}

impl EventSanitizer {
    pub fn new(config: &ClassConfig) -> Self {
        Self {
            abs_min_role: config.abs_min_role(),
        }
    }

    /// 剔除无法凑齐最少人数的活动
    ///
    /// 按主角色统计该活动的可用人数，任一角色 < abs_min_role 即剔除。
    /// 这里不考虑场次上限和间隔，只回答“理论上能否开课”。
    #[instrument(skip_all, fields(events = events.len(), peeps = peeps.len()))]
    pub fn sanitize(&self, events: Vec<Event>, peeps: &[Peep]) -> SanitizeOutcome {
        let mut kept = Vec::with_capacity(events.len());
        let mut removed_ids = Vec::new();

        for event in events {
            let available = |role: Role| {
                peeps
                    .iter()
                    .filter(|p| p.role == role && p.availability.contains(&event.id))
                    .count()
            };
            let leaders = available(Role::Leader);
            let followers = available(Role::Follower);

            if leaders >= self.abs_min_role as usize && followers >= self.abs_min_role as usize {
                kept.push(event);
            } else {
                debug!(event_id = event.id, leaders, followers, "活动可用人数不足，剔除");
                removed_ids.push(event.id);
            }
        }

        SanitizeOutcome { kept, removed_ids }
    }

    /// 重叠度削减
    ///
    /// 每轮对剩余活动两两计算“同时可参加两场”的人数，累加为每场的重叠分，
    /// 剔除重叠分最高的活动；并列时剔除可用者当前优先级之和最低的一场
    /// （仍并列则取列表中靠前者）。重复直到活动数 <= max_events。
    #[instrument(skip_all, fields(events = events.len(), max_events = max_events))]
    pub fn reduce_overlap(&self, mut events: Vec<Event>, peeps: &[Peep], max_events: usize) -> Vec<Event> {
        if events.len() <= max_events {
            return events;
        }
        warn!(
            count = events.len(),
            max_events, "有效活动过多，按重叠度削减"
        );

        let availability: Vec<HashSet<u32>> = peeps
            .iter()
            .map(|p| p.availability.iter().copied().collect())
            .collect();

        while events.len() > max_events {
            let scores = overlap_scores(&events, &availability);
            let Some(remove_pos) = self.pick_removal(&events, &scores, peeps) else {
                break;
            };
            let removed = events.remove(remove_pos);
            debug!(
                event_id = removed.id,
                date = %removed.date,
                remaining = events.len(),
                "剔除高重叠活动"
            );
        }

        events
    }

    fn pick_removal(&self, events: &[Event], scores: &HashMap<u32, usize>, peeps: &[Peep]) -> Option<usize> {
        let max_overlap = scores.values().copied().max()?;
        let candidates: Vec<usize> = events
            .iter()
            .positions(|e| scores.get(&e.id).copied().unwrap_or(0) == max_overlap)
            .collect();

        if candidates.len() == 1 {
            return candidates.first().copied();
        }

        debug!(max_overlap, tied = candidates.len(), "重叠分并列，按优先级权重决定");
        candidates
            .into_iter()
            .min_by_key(|pos| priority_weight(&events[*pos], peeps))
    }
}

/// 每场活动的重叠分
pub fn overlap_scores(events: &[Event], availability: &[HashSet<u32>]) -> HashMap<u32, usize> {
    let mut scores: HashMap<u32, usize> = events.iter().map(|e| (e.id, 0)).collect();

    for (a, b) in events.iter().tuple_combinations() {
        let shared = availability
            .iter()
            .filter(|set| set.contains(&a.id) && set.contains(&b.id))
            .count();
        *scores.entry(a.id).or_insert(0) += shared;
        *scores.entry(b.id).or_insert(0) += shared;
    }

    scores
}

/// 活动的优先级权重: 可参加者当前 priority 之和
pub fn priority_weight(event: &Event, peeps: &[Peep]) -> u64 {
    peeps
        .iter()
        .filter(|p| p.availability.contains(&event.id))
        .map(|p| u64::from(p.priority))
        .sum()
}
