// ==========================================
// Peeps 排课系统 - 结果输出
// ==========================================
// 输出到期次目录:
// - results.json         选中序列的活动名单、候补、指标、收尾后名册
// - members_updated.csv  下期使用的成员表（priority/index/total_attended 已更新）
// ==========================================

use crate::domain::event::Event;
use crate::domain::peep::Peep;
use crate::domain::sequence::{EventSequence, OffPrimaryAssignment};
use crate::domain::types::Role;
use crate::importer::csv_loader::MemberRecord;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::period_loader::date_format;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const RESULTS_FILE: &str = "results.json";
pub const MEMBERS_UPDATED_FILE: &str = "members_updated.csv";

// ==========================================
// results.json 结构
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRef {
    pub id: String,
    pub name: String,
    pub role: Role, // 本场实际角色
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResult {
    pub id: u32,
    #[serde(with = "date_format")]
    pub date: NaiveDateTime,
    pub duration_minutes: u32,
    pub price_per_person: f64,
    pub attendees: Vec<ParticipantRef>, // 按加入顺序
    pub alternates: Vec<ParticipantRef>, // 先 Leader 候补后 Follower 候补，各自按队列顺序
    pub leaders_string: String,
    pub followers_string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub run_id: String,
    pub target_max: u32,
    pub permutation_index: usize,
    pub valid_events: Vec<EventResult>,
    pub num_unique_attendees: usize,
    pub priority_fulfilled: u64,
    pub normalized_utilization: f64,
    pub total_attendees: usize,
    pub system_weight: u64,
    #[serde(default)]
    pub off_primary: Vec<OffPrimaryAssignment>,
    pub peeps: Vec<Peep>, // 收尾后名册，按新 index 排序
}

impl ScheduleReport {
    pub fn from_sequence(run_id: impl Into<String>, sequence: &EventSequence) -> Self {
        let metrics = sequence.metrics();
        Self {
            run_id: run_id.into(),
            target_max: sequence.target_max,
            permutation_index: sequence.permutation_index,
            valid_events: sequence
                .valid_events()
                .map(|event| event_result(sequence, event))
                .collect(),
            num_unique_attendees: metrics.num_unique_attendees,
            priority_fulfilled: metrics.priority_fulfilled,
            normalized_utilization: metrics.normalized_utilization,
            total_attendees: metrics.total_attendees,
            system_weight: metrics.system_weight,
            off_primary: sequence.off_primary_assignments(),
            peeps: sequence.peeps_by_priority().cloned().collect(),
        }
    }
}

fn event_result(sequence: &EventSequence, event: &Event) -> EventResult {
    let participant = |idx: usize, role: Role| {
        sequence.peeps.get(idx).map(|p| ParticipantRef {
            id: p.id.clone(),
            name: p.full_name.clone(),
            role,
        })
    };

    let attendees = event
        .assignment_order()
        .iter()
        .filter_map(|(idx, role)| participant(*idx, *role))
        .collect();
    let alternates = Role::ALL
        .iter()
        .flat_map(|role| event.alternates(*role).iter().map(move |idx| (*idx, *role)))
        .filter_map(|(idx, role)| participant(idx, role))
        .collect();

    EventResult {
        id: event.id,
        date: event.date,
        duration_minutes: event.duration_minutes(),
        price_per_person: event.price_per_person(),
        attendees,
        alternates,
        leaders_string: sequence.roster_line(event, Role::Leader),
        followers_string: sequence.roster_line(event, Role::Follower),
    }
}

// ==========================================
// ResultWriter
// ==========================================
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    pub fn members_path(&self) -> PathBuf {
        self.dir.join(MEMBERS_UPDATED_FILE)
    }

    /// 写出 results.json 与 members_updated.csv
    pub fn write(&self, report: &ScheduleReport) -> ImportResult<()> {
        self.write_results(report)?;
        self.write_members_csv(&report.peeps)?;
        Ok(())
    }

    pub fn write_results(&self, report: &ScheduleReport) -> ImportResult<PathBuf> {
        let path = self.results_path();
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json).map_err(|e| write_error(&path, e))?;
        info!(path = %path.display(), events = report.valid_events.len(), "已写出排课结果");
        Ok(path)
    }

    /// 按传入顺序写出成员表（列与 members.csv 相同，可直接作为下期输入）
    pub fn write_members_csv(&self, peeps: &[Peep]) -> ImportResult<PathBuf> {
        let path = self.members_path();
        let mut writer = csv::Writer::from_path(&path)?;
        for peep in peeps {
            writer.serialize(MemberRecord::from(peep))?;
        }
        writer.flush().map_err(|e| write_error(&path, e))?;
        info!(path = %path.display(), members = peeps.len(), "已写出成员表");
        Ok(path)
    }

    /// 读回 results.json
    pub fn read_results(path: &Path) -> ImportResult<ScheduleReport> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn write_error(path: &Path, err: std::io::Error) -> ImportError {
    ImportError::FileWriteError(format!("{}: {}", path.display(), err))
}
