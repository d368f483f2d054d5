// ==========================================
// Peeps 排课系统 - 取消列表
// ==========================================
// cancellations.json:
// {
//   "cancelled_events": ["Sunday March 2 - 5pm", ...],
//   "cancelled_availability": [
//     { "email": "a@example.com", "events": ["Friday March 7 - 6pm"] }
//   ]
// }
// 规则:
// - 取消的活动从活动列表移除，并从所有人的可参加列表移除
// - 个人取消只影响该邮箱对应的参与者
// - 引用不存在的活动/邮箱、邮箱重复、个人取消了本来就没报的活动均为错误
// ==========================================

use crate::domain::peep::Peep;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::period_loader::{parse_event_date, EventRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
struct CancellationsFile {
    #[serde(default)]
    cancelled_events: Vec<String>,
    #[serde(default)]
    cancelled_availability: Vec<AvailabilityCancellation>,
}

#[derive(Debug, Clone, Deserialize)]
struct AvailabilityCancellation {
    email: String,
    #[serde(default)]
    events: Vec<String>,
}

/// 单个参与者被取消的时间
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelledAvailability {
    pub name: String,     // 展示名
    pub events: Vec<u32>, // 活动ID（升序）
}

/// 应用取消后的摘要（供可参加性报告展示）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CancellationSummary {
    pub cancelled_events: Vec<u32>,
    /// 参与者ID -> 被取消的时间
    pub cancelled_availability: BTreeMap<String, CancelledAvailability>,
}

impl CancellationSummary {
    pub fn is_empty(&self) -> bool {
        self.cancelled_events.is_empty() && self.cancelled_availability.is_empty()
    }
}

/// 已解析的取消列表
#[derive(Debug, Clone, Default)]
pub struct Cancellations {
    events: HashSet<NaiveDateTime>,
    /// 小写邮箱 -> 取消的活动时间
    availability: HashMap<String, HashSet<NaiveDateTime>>,
}

impl Cancellations {
    pub fn from_file(path: &Path, year: i32) -> ImportResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw, year)
    }

    pub fn parse(raw: &str, year: i32) -> ImportResult<Self> {
        let file: CancellationsFile = serde_json::from_str(raw)?;

        let events = file
            .cancelled_events
            .iter()
            .map(|s| parse_event_date(s, year))
            .collect::<ImportResult<HashSet<_>>>()?;

        let mut availability = HashMap::new();
        for entry in file.cancelled_availability {
            let email = normalize_email(&entry.email);
            let dates = entry
                .events
                .iter()
                .map(|s| parse_event_date(s, year))
                .collect::<ImportResult<HashSet<_>>>()?;
            if availability.insert(email.clone(), dates).is_some() {
                return Err(ImportError::DuplicateCancelledEmail(email));
            }
        }

        Ok(Self { events, availability })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.availability.is_empty()
    }

    /// 应用到活动列表与名册
    pub fn apply(&self, events: &mut Vec<EventRecord>, peeps: &mut [Peep]) -> ImportResult<CancellationSummary> {
        let by_date: HashMap<NaiveDateTime, u32> = events.iter().map(|e| (e.date, e.id)).collect();
        let lookup = |date: &NaiveDateTime| {
            by_date
                .get(date)
                .copied()
                .ok_or_else(|| ImportError::UnknownCancelledEvent(date.to_string()))
        };

        let mut cancelled_ids = self.events.iter().map(lookup).collect::<ImportResult<Vec<u32>>>()?;
        cancelled_ids.sort_unstable();

        let mut per_peep = BTreeMap::new();
        for (email, dates) in &self.availability {
            let peep = peeps
                .iter_mut()
                .find(|p| p.email.as_deref().map(normalize_email).as_deref() == Some(email.as_str()))
                .ok_or_else(|| ImportError::UnknownCancelledEmail(email.clone()))?;

            let mut ids = dates.iter().map(lookup).collect::<ImportResult<Vec<u32>>>()?;
            ids.sort_unstable();
            if let Some(missing) = ids.iter().find(|id| !peep.availability.contains(id)) {
                return Err(ImportError::CancelledAvailabilityNotListed {
                    email: email.clone(),
                    event_id: *missing,
                });
            }
            peep.availability.retain(|id| !ids.contains(id));
            per_peep.insert(
                peep.id.clone(),
                CancelledAvailability {
                    name: peep.label().to_string(),
                    events: ids,
                },
            );
        }

        events.retain(|e| !cancelled_ids.contains(&e.id));
        for peep in peeps.iter_mut() {
            peep.availability.retain(|id| !cancelled_ids.contains(id));
        }

        info!(
            cancelled_events = cancelled_ids.len(),
            cancelled_availability = per_peep.len(),
            "已应用取消列表"
        );

        Ok(CancellationSummary {
            cancelled_events: cancelled_ids,
            cancelled_availability: per_peep,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
