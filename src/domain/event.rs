// ==========================================
// Peeps 排课系统 - 活动领域模型
// ==========================================
// 职责: 单场活动的正式名单/候补名单管理、角色平衡、降档、候补校验
// 存储: 名单中只保存参与者在名册 (arena) 中的下标，复制成本低
// 不变量: 平衡后 leaders.len() == followers.len()，且落在当前时长 [min_role, max_role] 内
// ==========================================

use crate::config::{ClassConfig, DurationTier};
use crate::domain::peep::Peep;
use crate::domain::types::Role;
use crate::engine::error::{ScheduleError, ScheduleResult};
use chrono::NaiveDateTime;
use std::collections::VecDeque;
use std::fmt;

/// 活动日期的文本格式（输入/输出文件、取消列表均使用）
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

// ==========================================
// Event - 活动
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: u32,
    pub date: NaiveDateTime,
    duration_minutes: u32,
    tier: DurationTier,

    // ===== 正式名单（按加入顺序） =====
    leaders: Vec<usize>,
    followers: Vec<usize>,

    // ===== 候补名单（位置即优先级） =====
    alt_leaders: VecDeque<usize>,
    alt_followers: VecDeque<usize>,

    // 加入顺序审计 (参与者下标, 实际角色)
    assignment_order: Vec<(usize, Role)>,
}

impl Event {
    /// 创建活动
    ///
    /// # 参数
    /// - id: 活动ID
    /// - date: 开始时间
    /// - duration_minutes: 时长（必须在档位表中）
    /// - config: 时长档位表
    pub fn new(
        id: u32,
        date: NaiveDateTime,
        duration_minutes: u32,
        config: &ClassConfig,
    ) -> ScheduleResult<Self> {
        let tier = *config
            .tier(duration_minutes)
            .ok_or(ScheduleError::UnknownDuration(duration_minutes))?;

        Ok(Self {
            id,
            date,
            duration_minutes,
            tier,
            leaders: Vec::new(),
            followers: Vec::new(),
            alt_leaders: VecDeque::new(),
            alt_followers: VecDeque::new(),
            assignment_order: Vec::new(),
        })
    }

    // ==========================================
    // 只读属性
    // ==========================================

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn min_role(&self) -> u32 {
        self.tier.min_role
    }

    pub fn max_role(&self) -> u32 {
        self.tier.max_role
    }

    pub fn price(&self) -> f64 {
        self.tier.price
    }

    pub fn leaders(&self) -> &[usize] {
        &self.leaders
    }

    pub fn followers(&self) -> &[usize] {
        &self.followers
    }

    pub fn attendees(&self, role: Role) -> &[usize] {
        match role {
            Role::Leader => &self.leaders,
            Role::Follower => &self.followers,
        }
    }

    pub fn alternates(&self, role: Role) -> &VecDeque<usize> {
        match role {
            Role::Leader => &self.alt_leaders,
            Role::Follower => &self.alt_followers,
        }
    }

    /// 加入顺序（跨角色）
    pub fn assignment_order(&self) -> &[(usize, Role)] {
        &self.assignment_order
    }

    pub fn num_attendees(&self, role: Role) -> usize {
        self.attendees(role).len()
    }

    pub fn total_attendees(&self) -> usize {
        self.leaders.len() + self.followers.len()
    }

    /// 参与者在本活动中的正式角色
    pub fn role_of(&self, peep_idx: usize) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| self.attendees(*role).contains(&peep_idx))
    }

    pub fn is_attendee(&self, peep_idx: usize) -> bool {
        self.role_of(peep_idx).is_some()
    }

    pub fn is_alternate(&self, peep_idx: usize) -> bool {
        self.alt_leaders.contains(&peep_idx) || self.alt_followers.contains(&peep_idx)
    }

    /// 人均价格（四舍五入到整数；无人时为整场价格）
    pub fn price_per_person(&self) -> f64 {
        let total = self.total_attendees();
        if total == 0 {
            return self.tier.price;
        }
        (self.tier.price / total as f64).round()
    }

    /// 名额利用率: 已填名额 / 最大名额
    pub fn utilization(&self) -> f64 {
        let max_slots = 2 * self.tier.max_role;
        if max_slots == 0 {
            return 0.0;
        }
        self.total_attendees() as f64 / f64::from(max_slots)
    }

    // ==========================================
    // 名额判定
    // ==========================================

    /// 指定角色是否已满（当前时长的 max_role）
    pub fn is_full(&self, role: Role) -> bool {
        self.num_attendees(role) >= self.tier.max_role as usize
    }

    /// 两个角色是否都已满
    pub fn is_full_overall(&self) -> bool {
        Role::ALL.into_iter().all(|role| self.is_full(role))
    }

    /// 指定角色是否达到当前时长的最少人数
    pub fn meets_min_role(&self, role: Role) -> bool {
        self.num_attendees(role) >= self.tier.min_role as usize
    }

    /// 两个角色是否都达到当前时长的最少人数
    pub fn meets_min(&self) -> bool {
        Role::ALL.into_iter().all(|role| self.meets_min_role(role))
    }

    /// 两个角色是否都达到绝对最少人数（与时长无关）
    pub fn meets_absolute_min(&self, abs_min_role: u32) -> bool {
        Role::ALL
            .into_iter()
            .all(|role| self.num_attendees(role) >= abs_min_role as usize)
    }

    // ==========================================
    // 正式名单维护
    // ==========================================

    /// 加入正式名单（追加到该角色末尾）
    ///
    /// # 错误
    /// - DuplicateAttendee: 已在任一角色的正式名单中
    /// - RoleCapacityExceeded: 该角色已达当前时长的 max_role
    pub fn add_attendee(&mut self, peep_idx: usize, role: Role) -> ScheduleResult<()> {
        if self.is_attendee(peep_idx) {
            return Err(ScheduleError::DuplicateAttendee {
                event_id: self.id,
                peep_idx,
            });
        }
        if self.is_full(role) {
            return Err(ScheduleError::RoleCapacityExceeded {
                event_id: self.id,
                role,
                max_role: self.tier.max_role,
            });
        }

        self.attendees_mut(role).push(peep_idx);
        self.assignment_order.push((peep_idx, role));
        Ok(())
    }

    /// 从正式名单移除
    fn remove_attendee(&mut self, peep_idx: usize, role: Role) -> ScheduleResult<()> {
        let list = self.attendees_mut(role);
        let pos = list.iter().position(|p| *p == peep_idx);
        match pos {
            Some(pos) => {
                list.remove(pos);
                self.assignment_order.retain(|(p, _)| *p != peep_idx);
                Ok(())
            }
            None => Err(ScheduleError::NotAnAttendee {
                event_id: self.id,
                peep_idx,
                role,
            }),
        }
    }

    // ==========================================
    // 候补名单维护
    // ==========================================

    /// 加入候补名单末尾
    ///
    /// # 错误
    /// - DuplicateAttendee: 已在正式名单中
    /// - DuplicateAlternate: 已在任一角色的候补名单中
    pub fn add_alternate(&mut self, peep_idx: usize, role: Role) -> ScheduleResult<()> {
        if self.is_attendee(peep_idx) {
            return Err(ScheduleError::DuplicateAttendee {
                event_id: self.id,
                peep_idx,
            });
        }
        if self.is_alternate(peep_idx) {
            return Err(ScheduleError::DuplicateAlternate {
                event_id: self.id,
                peep_idx,
            });
        }
        self.alternates_mut(role).push_back(peep_idx);
        Ok(())
    }

    /// 加入候补名单最前（被降级的参与者保留其优先位置）
    fn insert_alternate_front(&mut self, peep_idx: usize, role: Role) -> ScheduleResult<()> {
        if self.is_alternate(peep_idx) {
            return Err(ScheduleError::DuplicateAlternate {
                event_id: self.id,
                peep_idx,
            });
        }
        self.alternates_mut(role).push_front(peep_idx);
        Ok(())
    }

    /// 从候补名单移除
    pub fn remove_alternate(&mut self, peep_idx: usize, role: Role) -> ScheduleResult<()> {
        let list = self.alternates_mut(role);
        match list.iter().position(|p| *p == peep_idx) {
            Some(pos) => {
                list.remove(pos);
                Ok(())
            }
            None => Err(ScheduleError::NotAnAlternate {
                event_id: self.id,
                peep_idx,
                role,
            }),
        }
    }

    /// 候补转正（同一角色）
    pub fn promote_alternate(&mut self, peep_idx: usize, role: Role) -> ScheduleResult<()> {
        self.remove_alternate(peep_idx, role)?;
        self.add_attendee(peep_idx, role)
    }

    /// 正式成员降为候补，放在候补名单最前
    pub fn demote_to_alternate_front(&mut self, peep_idx: usize, role: Role) -> ScheduleResult<()> {
        self.remove_attendee(peep_idx, role)?;
        self.insert_alternate_front(peep_idx, role)
    }

    /// 清空全部名单（活动作废）
    pub fn clear_participants(&mut self) {
        self.leaders.clear();
        self.followers.clear();
        self.alt_leaders.clear();
        self.alt_followers.clear();
        self.assignment_order.clear();
    }

    // ==========================================
    // 平衡 / 降档 / 候补校验
    // ==========================================

    /// 角色平衡
    ///
    /// 人数多的一方从末尾（最后加入、优先级最低）依次降为候补名单最前，
    /// 直到两边人数相等。
    pub fn balance_roles(&mut self) -> ScheduleResult<()> {
        while self.leaders.len() != self.followers.len() {
            let larger = if self.leaders.len() > self.followers.len() {
                Role::Leader
            } else {
                Role::Follower
            };

            let last = match self.attendees(larger).last() {
                Some(p) => *p,
                None => break,
            };
            self.demote_to_alternate_front(last, larger)?;
        }

        if self.leaders.len() != self.followers.len() {
            return Err(ScheduleError::UnbalancedRoles {
                event_id: self.id,
                leaders: self.leaders.len(),
                followers: self.followers.len(),
            });
        }
        Ok(())
    }

    /// 降档
    ///
    /// 前置条件: 已平衡，且未达到当前时长的最少人数。
    /// 按时长升序扫描，选择第一个允许降档、且 [min_role, max_role] 覆盖当前每角色人数的档位。
    ///
    /// # 返回
    /// - Ok(true): 已降档
    /// - Ok(false): 没有合适档位，时长不变
    pub fn downgrade_duration(&mut self, config: &ClassConfig) -> ScheduleResult<bool> {
        if self.leaders.len() != self.followers.len() {
            return Err(ScheduleError::UnbalancedRoles {
                event_id: self.id,
                leaders: self.leaders.len(),
                followers: self.followers.len(),
            });
        }
        if self.meets_min() {
            return Err(ScheduleError::DowngradeNotUnderfilled {
                event_id: self.id,
                duration_minutes: self.duration_minutes,
            });
        }

        let count = self.leaders.len() as u32;
        let target = config.iter().find(|(duration, tier)| {
            *duration < self.duration_minutes
                && tier.allow_downgrade
                && tier.min_role <= count
                && count <= tier.max_role
        });

        match target {
            Some((duration, tier)) => {
                self.duration_minutes = duration;
                self.tier = *tier;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 按参与者当前状态剔除已不合格的候补
    ///
    /// 例如: 之后的活动已把该参与者排满，或产生了间隔冲突
    pub fn validate_alternates(&mut self, peeps: &[Peep]) {
        let date = self.date;
        let id = self.id;
        let still_eligible = |idx: &usize| {
            peeps
                .get(*idx)
                .map(|p| p.can_attend_at(id, date))
                .unwrap_or(false)
        };
        self.alt_leaders.retain(|idx| still_eligible(idx));
        self.alt_followers.retain(|idx| still_eligible(idx));
    }

    fn attendees_mut(&mut self, role: Role) -> &mut Vec<usize> {
        match role {
            Role::Leader => &mut self.leaders,
            Role::Follower => &mut self.followers,
        }
    }

    fn alternates_mut(&mut self, role: Role) -> &mut VecDeque<usize> {
        match role {
            Role::Leader => &mut self.alt_leaders,
            Role::Follower => &mut self.alt_followers,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event {} on {} ({}min)",
            self.id,
            self.date.format("%A %B %-d - %-I%P"),
            self.duration_minutes
        )
    }
}
