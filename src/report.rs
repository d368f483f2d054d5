// ==========================================
// Peeps 排课系统 - 可参加性报告
// ==========================================
// 排课前的快速概览:
// - 每场活动按主角色统计可参加的人（以及愿意换角补位的人）
// - 回复了但没有任何可参加活动的人
// - 在册但未回复的人
// 只负责计算，输出由调用方决定
// ==========================================

use crate::domain::event::{Event, DATE_FORMAT};
use crate::domain::peep::Peep;
use crate::domain::types::Role;
use crate::importer::CancellationSummary;
use serde::Serialize;
use std::fmt;

/// 单场活动的可参加情况
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventAvailability {
    pub event_id: u32,
    pub date: String,
    pub leaders: Vec<String>,
    pub followers: Vec<String>,
    pub leader_fill: Vec<String>,   // 主角色为 Follower、愿意换到 Leader
    pub follower_fill: Vec<String>, // 主角色为 Leader、愿意换到 Follower
}

impl EventAvailability {
    pub fn count(&self, role: Role) -> usize {
        match role {
            Role::Leader => self.leaders.len(),
            Role::Follower => self.followers.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub events: Vec<EventAvailability>, // 按日期排序
    pub responders: usize,
    pub available: usize,
    pub no_availability: Vec<String>,
    pub non_responders: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellations: Option<CancellationSummary>,
}

impl AvailabilityReport {
    pub fn build(events: &[Event], peeps: &[Peep]) -> Self {
        let mut sorted: Vec<&Event> = events.iter().collect();
        sorted.sort_by_key(|e| (e.date, e.id));

        let event_rows = sorted
            .into_iter()
            .map(|event| {
                let names = |role: Role, fill: bool| -> Vec<String> {
                    peeps
                        .iter()
                        .filter(|p| p.responded && p.availability.contains(&event.id))
                        .filter(|p| if fill { p.role != role && p.may_switch() } else { p.role == role })
                        .map(|p| p.label().to_string())
                        .collect()
                };
                EventAvailability {
                    event_id: event.id,
                    date: event.date.format(DATE_FORMAT).to_string(),
                    leaders: names(Role::Leader, false),
                    followers: names(Role::Follower, false),
                    leader_fill: names(Role::Leader, true),
                    follower_fill: names(Role::Follower, true),
                }
            })
            .collect();

        let responders: Vec<&Peep> = peeps.iter().filter(|p| p.responded).collect();
        let mut no_availability: Vec<String> = responders
            .iter()
            .filter(|p| p.availability.is_empty())
            .map(|p| p.label().to_string())
            .collect();
        no_availability.sort();

        let mut non_responders: Vec<String> = peeps
            .iter()
            .filter(|p| p.active && !p.responded)
            .map(|p| p.label().to_string())
            .collect();
        non_responders.sort();

        Self {
            events: event_rows,
            responders: responders.len(),
            available: responders.len() - no_availability.len(),
            no_availability,
            non_responders,
            cancellations: None,
        }
    }

    pub fn with_cancellations(mut self, summary: Option<CancellationSummary>) -> Self {
        self.cancellations = summary.filter(|s| !s.is_empty());
        self
    }
}

impl fmt::Display for AvailabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "AVAILABILITY REPORT")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(
            f,
            "responders: {}, available: {}, no availability: {}, did not respond: {}",
            self.responders,
            self.available,
            self.no_availability.len(),
            self.non_responders.len()
        )?;

        if let Some(cancelled) = &self.cancellations {
            if !cancelled.cancelled_events.is_empty() {
                writeln!(f, "\nCancelled events: {:?}", cancelled.cancelled_events)?;
            }
            for (id, entry) in &cancelled.cancelled_availability {
                writeln!(f, "  - {} ({}) cancelled {:?}", entry.name, id, entry.events)?;
            }
        }

        for row in &self.events {
            writeln!(f, "\n[{}] {}", row.event_id, row.date)?;
            writeln!(
                f,
                "    Leaders  ({}): {} ( + {})",
                row.leaders.len(),
                row.leaders.join(", "),
                row.leader_fill.join(", ")
            )?;
            writeln!(
                f,
                "    Followers({}): {} ( + {})",
                row.followers.len(),
                row.followers.join(", "),
                row.follower_fill.join(", ")
            )?;
        }

        writeln!(f, "\nNo availability:")?;
        for name in &self.no_availability {
            writeln!(f, "  - {}", name)?;
        }
        writeln!(f, "\nDid not respond:")?;
        for name in &self.non_responders {
            writeln!(f, "  - {}", name)?;
        }
        Ok(())
    }
}
