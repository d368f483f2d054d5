// ==========================================
// Peeps 排课系统 - 参与者领域模型
// ==========================================
// 不变量:
// - num_events <= event_limit
// - assigned_event_dates 两两间隔 >= min_interval_days
// 生命周期: 每次排课运行构造一次；每个排列评估使用独立副本
// ==========================================

use crate::domain::event::Event;
use crate::domain::types::{Role, SwitchPreference};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_true() -> bool {
    true
}

// ==========================================
// Peep - 参与者
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peep {
    // ===== 身份 =====
    pub id: String,
    #[serde(alias = "name")]
    pub full_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role, // 主角色

    // ===== 排课属性 =====
    #[serde(default)]
    pub switch_pref: SwitchPreference,
    #[serde(default)]
    pub availability: Vec<u32>, // 可参加的活动ID
    #[serde(default)]
    pub event_limit: u32, // 本期最多参加场次
    #[serde(default)]
    pub min_interval_days: u32, // 两场之间最少间隔天数

    // ===== 公平性状态 =====
    #[serde(default)]
    pub priority: u32, // 越大越优先
    #[serde(default)]
    pub index: usize, // 优先级队列序号
    #[serde(default)]
    pub total_attended: u32, // 历史累计参加次数
    #[serde(default)]
    pub responded: bool, // 本期是否提交了问卷
    #[serde(default = "default_true")]
    pub active: bool, // 是否为在册成员
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_joined: Option<String>, // 成员表原样保留

    // ===== 运行期状态（不序列化） =====
    #[serde(skip)]
    pub original_priority: u32, // 本次运行开始时的优先级快照
    #[serde(skip)]
    pub num_events: u32, // 本次运行已分配场次
    #[serde(skip)]
    pub assigned_event_dates: Vec<NaiveDateTime>,
}

impl Peep {
    /// 创建参与者（其余字段取默认值）
    ///
    /// # 参数
    /// - id: 唯一ID
    /// - full_name: 全名
    /// - role: 主角色
    pub fn new(id: impl Into<String>, full_name: impl Into<String>, role: Role) -> Self {
        let full_name = full_name.into();
        Self {
            id: id.into(),
            display_name: full_name.clone(),
            full_name,
            email: None,
            role,
            switch_pref: SwitchPreference::PrimaryOnly,
            availability: Vec::new(),
            event_limit: 0,
            min_interval_days: 0,
            priority: 0,
            index: 0,
            total_attended: 0,
            responded: false,
            active: true,
            date_joined: None,
            original_priority: 0,
            num_events: 0,
            assigned_event_dates: Vec::new(),
        }
    }

    /// 开始新一次排课运行
    ///
    /// 清空运行期状态，并记录 original_priority 快照
    pub fn begin_run(&mut self) {
        self.original_priority = self.priority;
        self.num_events = 0;
        self.assigned_event_dates.clear();
    }

    /// 是否可以参加指定活动
    ///
    /// 规则:
    /// 1) 活动在可参加列表中
    /// 2) 未达到本期场次上限
    /// 3) 与每个已分配日期的间隔（按自然日）>= min_interval_days
    pub fn can_attend(&self, event: &Event) -> bool {
        self.can_attend_at(event.id, event.date)
    }

    /// 同 can_attend，只需要活动ID与时间
    pub fn can_attend_at(&self, event_id: u32, date: NaiveDateTime) -> bool {
        if !self.availability.contains(&event_id) {
            return false;
        }

        if self.num_events >= self.event_limit {
            return false;
        }

        let event_day = date.date();
        self.assigned_event_dates.iter().all(|assigned| {
            let gap = (event_day - assigned.date()).num_days().unsigned_abs();
            gap >= u64::from(self.min_interval_days)
        })
    }

    /// 记录一次成功分配
    pub fn record_assignment(&mut self, date: NaiveDateTime) {
        self.num_events += 1;
        self.assigned_event_dates.push(date);
    }

    /// 成功分配后重置优先级
    ///
    /// 移到队尾由 EventSequence 负责（队列顺序属于序列，不属于个人）
    pub fn reset_for_success(&mut self) {
        self.priority = 0;
    }

    /// 展示用名字（优先 display_name，否则取全名第一个词）
    pub fn label(&self) -> &str {
        if !self.display_name.trim().is_empty() {
            return self.display_name.trim();
        }
        self.full_name.split_whitespace().next().unwrap_or(&self.id)
    }

    /// 是否可以被安排到非主角色
    pub fn may_switch(&self) -> bool {
        self.switch_pref != SwitchPreference::PrimaryOnly
    }
}

impl fmt::Display for Peep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            Role::Leader => "L",
            Role::Follower => "F",
        };
        write!(
            f,
            "Peep({:>3}): p: {}, limit: {}, role: {}, a: {:?}",
            self.id, self.priority, self.event_limit, role, self.availability
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassConfig;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn event(id: u32, date: NaiveDateTime) -> Event {
        Event::new(id, date, 120, &ClassConfig::default()).unwrap()
    }

    fn peep(min_interval_days: u32, availability: Vec<u32>) -> Peep {
        let mut p = Peep::new("1", "Pat Peep", Role::Leader);
        p.availability = availability;
        p.event_limit = 5;
        p.priority = 1;
        p.min_interval_days = min_interval_days;
        p
    }

    #[test]
    fn test_can_attend_requires_availability() {
        let p = peep(0, vec![2]);
        assert!(!p.can_attend(&event(1, at(1, 17))));
        assert!(p.can_attend(&event(2, at(1, 17))));
    }

    #[test]
    fn test_can_attend_respects_event_limit() {
        let mut p = peep(0, vec![1, 2]);
        p.event_limit = 1;
        p.record_assignment(at(1, 17));
        assert!(!p.can_attend(&event(2, at(20, 17))));
    }

    #[test]
    fn test_zero_interval_allows_same_day() {
        let mut p = peep(0, vec![1, 2]);
        p.record_assignment(at(1, 17));
        assert!(p.can_attend(&event(2, at(1, 19))));
    }

    #[test]
    fn test_one_interval_day_blocks_same_day() {
        let mut p = peep(1, vec![1, 2, 3]);
        p.record_assignment(at(1, 17));
        assert!(!p.can_attend(&event(2, at(1, 19))));
        assert!(p.can_attend(&event(3, at(2, 19))));
    }

    #[test]
    fn test_seven_interval_days_uses_calendar_days() {
        let mut p = peep(7, vec![4, 5, 6]);
        p.record_assignment(at(1, 17));
        // 6 天: 拒绝
        assert!(!p.can_attend(&event(5, at(6, 17))));
        // 正好 7 天: 允许
        assert!(p.can_attend(&event(4, at(8, 17))));
        // 7 天但时间更早: 仍按自然日计算，允许
        assert!(p.can_attend(&event(6, at(8, 13))));
    }

    #[test]
    fn test_interval_checked_in_both_directions() {
        let mut p = peep(7, vec![1, 5]);
        p.record_assignment(at(6, 17));
        // 3/1 在 3/6 之前 5 天，违反间隔
        assert!(!p.can_attend(&event(1, at(1, 17))));

        let mut q = peep(7, vec![1]);
        q.record_assignment(at(8, 17));
        assert!(q.can_attend(&event(1, at(1, 17))));
    }

    #[test]
    fn test_reset_for_success_and_begin_run() {
        let mut p = peep(0, vec![1]);
        p.priority = 4;
        p.begin_run();
        assert_eq!(p.original_priority, 4);

        p.record_assignment(at(1, 17));
        p.reset_for_success();
        assert_eq!(p.priority, 0);
        assert_eq!(p.num_events, 1);
        assert_eq!(p.original_priority, 4);

        p.begin_run();
        assert_eq!(p.num_events, 0);
        assert!(p.assigned_event_dates.is_empty());
        assert_eq!(p.original_priority, 0);
    }

    #[test]
    fn test_label_prefers_display_name() {
        let mut p = Peep::new("7", "Alice Alpha", Role::Follower);
        assert_eq!(p.label(), "Alice Alpha");
        p.display_name = String::new();
        assert_eq!(p.label(), "Alice");
        p.display_name = "Ali".to_string();
        assert_eq!(p.label(), "Ali");
    }
}
