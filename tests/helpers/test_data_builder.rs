// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use peeps_scheduler::config::ClassConfig;
use peeps_scheduler::domain::types::{Role, SwitchPreference};
use peeps_scheduler::domain::{Event, Peep};

/// 2025 年 3 月的某天 18:00
pub fn march(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(18, 0, 0)
        .unwrap()
}

// ==========================================
// Peep 构建器
// ==========================================

pub struct PeepBuilder {
    peep: Peep,
}

impl PeepBuilder {
    pub fn new(id: &str, role: Role) -> Self {
        let mut peep = Peep::new(id, format!("Peep {}", id), role);
        peep.display_name = format!("P{}", id);
        peep.email = Some(format!("peep{}@example.com", id));
        peep.event_limit = 1;
        peep.responded = true;
        Self { peep }
    }

    pub fn name(mut self, full_name: &str) -> Self {
        self.peep.full_name = full_name.to_string();
        self.peep.display_name = full_name.split_whitespace().next().unwrap_or(full_name).to_string();
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.peep.email = Some(email.to_string());
        self
    }

    pub fn availability(mut self, events: &[u32]) -> Self {
        self.peep.availability = events.to_vec();
        self
    }

    pub fn event_limit(mut self, limit: u32) -> Self {
        self.peep.event_limit = limit;
        self
    }

    pub fn min_interval_days(mut self, days: u32) -> Self {
        self.peep.min_interval_days = days;
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.peep.priority = priority;
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.peep.index = index;
        self
    }

    pub fn switch_pref(mut self, pref: SwitchPreference) -> Self {
        self.peep.switch_pref = pref;
        self
    }

    pub fn total_attended(mut self, total: u32) -> Self {
        self.peep.total_attended = total;
        self
    }

    pub fn not_responded(mut self) -> Self {
        self.peep.responded = false;
        self.peep.availability.clear();
        self
    }

    pub fn build(self) -> Peep {
        self.peep
    }
}

/// 构造名册: leaders 个 Leader 在前，followers 个 Follower 在后，index 依次递增，
/// 全部可参加 availability 中的活动
pub fn roster(leaders: usize, followers: usize, availability: &[u32]) -> Vec<Peep> {
    let roles = std::iter::repeat(Role::Leader)
        .take(leaders)
        .chain(std::iter::repeat(Role::Follower).take(followers));

    roles
        .enumerate()
        .map(|(i, role)| {
            PeepBuilder::new(&i.to_string(), role)
                .availability(availability)
                .index(i)
                .build()
        })
        .collect()
}

// ==========================================
// Event 构建器
// ==========================================

pub struct EventBuilder {
    id: u32,
    date: NaiveDateTime,
    duration_minutes: u32,
}

impl EventBuilder {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            date: march(id.clamp(1, 28)),
            duration_minutes: 120,
        }
    }

    pub fn day(mut self, day: u32) -> Self {
        self.date = march(day);
        self
    }

    pub fn date(mut self, date: NaiveDateTime) -> Self {
        self.date = date;
        self
    }

    pub fn duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    pub fn build(self) -> Event {
        Event::new(self.id, self.date, self.duration_minutes, &ClassConfig::default()).unwrap()
    }
}
