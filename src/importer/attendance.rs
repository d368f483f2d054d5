// ==========================================
// Peeps 排课系统 - 实际出勤回写
// ==========================================
// 输入: <期次目录>/actual_attendance.json  实际出勤（结构同 results.json，可手工修改）
//       <期次目录>/members.csv             本期开始时的成员表
//       <期次目录>/responses.csv           可选，用于判断谁提交了问卷
// 输出: <期次目录>/members_updated.csv     下期成员表
// 规则: 只计实际出勤者（候补不计）；出勤者优先级归零并移到队尾，
//       其余已提交问卷者优先级 +1
// ==========================================

use crate::domain::peep::Peep;
use crate::domain::sequence::EventSequence;
use crate::importer::cancellations::normalize_email;
use crate::importer::csv_loader::{load_members, load_responses, responded_emails, MEMBERS_FILE, RESPONSES_FILE};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::period_loader::date_format;
use crate::importer::result_writer::ResultWriter;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ACTUAL_ATTENDANCE_FILE: &str = "actual_attendance.json";

// ==========================================
// 文件结构（其余字段忽略）
// ==========================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceFile {
    #[serde(default)]
    pub valid_events: Vec<AttendedEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendedEvent {
    pub id: u32,
    #[serde(with = "date_format")]
    pub date: NaiveDateTime,
    #[serde(default)]
    pub attendees: Vec<AttendeeRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendeeRef {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

/// 手工编辑的文件里 id 可能写成数字
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("无效的参与者ID: {}", other))),
    }
}

impl AttendanceFile {
    pub fn from_file(path: &Path) -> ImportResult<Self> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// 按实际出勤更新成员表
///
/// # 参数
/// - attendance: 实际出勤
/// - members: 本期开始时的成员表
/// - responded: 提交了问卷的邮箱（小写）
///
/// # 返回
/// 更新后的成员表，按新 index 排序
pub fn apply_attendance(
    attendance: &AttendanceFile,
    mut members: Vec<Peep>,
    responded: &HashSet<String>,
) -> ImportResult<Vec<Peep>> {
    for peep in members.iter_mut() {
        peep.begin_run();
        peep.responded = peep
            .email
            .as_deref()
            .map(normalize_email)
            .is_some_and(|e| responded.contains(&e));
    }

    let mut sequence = EventSequence::new(Vec::new(), members);
    for event in &attendance.valid_events {
        for attendee in &event.attendees {
            let idx = sequence
                .peeps
                .iter()
                .position(|p| p.id == attendee.id)
                .ok_or_else(|| ImportError::UnknownAttendee(attendee.id.clone()))?;

            let peep = &mut sequence.peeps[idx];
            peep.record_assignment(event.date);
            peep.reset_for_success();
            sequence.move_to_back(idx);
        }
        debug!(event_id = event.id, attendees = event.attendees.len(), "已计入出勤");
    }

    sequence.finalize();
    Ok(sequence.peeps_by_priority().cloned().collect())
}

/// apply-results 子命令
///
/// actual_attendance.json 与 members.csv 必须存在；responses.csv 缺失时视为无人提交问卷
///
/// # 返回
/// 写出的 members_updated.csv 路径
pub fn apply_results(period_dir: &Path, results_file: &str) -> ImportResult<PathBuf> {
    let attendance = AttendanceFile::from_file(&period_dir.join(results_file))?;

    let members_path = period_dir.join(MEMBERS_FILE);
    if !members_path.exists() {
        return Err(ImportError::FileNotFound(members_path.display().to_string()));
    }
    let members = load_members(&members_path)?;

    let responses_path = period_dir.join(RESPONSES_FILE);
    let responded = if responses_path.exists() {
        responded_emails(&load_responses(&responses_path)?)
    } else {
        warn!(path = %responses_path.display(), "未找到问卷文件，所有成员按未提交处理");
        HashSet::new()
    };

    let updated = apply_attendance(&attendance, members, &responded)?;
    let path = ResultWriter::new(period_dir).write_members_csv(&updated)?;
    info!(
        events = attendance.valid_events.len(),
        members = updated.len(),
        "实际出勤已回写成员表"
    );
    Ok(path)
}
