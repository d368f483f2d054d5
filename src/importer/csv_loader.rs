// ==========================================
// Peeps 排课系统 - 成员表 / 问卷 CSV 导入
// ==========================================
// 输入: <期次目录>/members.csv   成员表（上期 members_updated.csv）
//       <期次目录>/responses.csv 问卷导出
// 输出: PeriodFile（即 output.json 的内容）
// 规则:
// - 表头与取值去掉首尾空白，弯引号统一为直引号
// - "Name" 以 "Event:" 开头的行定义活动（需 "Event Duration"）；
//   没有活动行时，按问卷中出现的日期生成活动（默认最长时长）
// - 问卷按邮箱匹配成员；未知邮箱、未激活成员、未知日期均为错误
// ==========================================

use crate::config::ClassConfig;
use crate::domain::peep::Peep;
use crate::domain::types::{Role, SwitchPreference};
use crate::importer::cancellations::normalize_email;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::period_loader::{parse_event_date, EventRecord, PeriodFile};
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

pub const MEMBERS_FILE: &str = "members.csv";
pub const RESPONSES_FILE: &str = "responses.csv";

pub const MEMBER_COLUMNS: [&str; 9] = [
    "id",
    "Name",
    "Display Name",
    "Email Address",
    "Role",
    "Index",
    "Priority",
    "Total Attended",
    "Active",
];

pub const RESPONSE_COLUMNS: [&str; 6] = [
    "Name",
    "Email Address",
    "Primary Role",
    "Secondary Role",
    "Max Sessions",
    "Availability",
];

const EVENT_ROW_PREFIX: &str = "Event:";

// ==========================================
// 行结构
// ==========================================

/// members.csv / members_updated.csv 的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Display Name", default)]
    pub display_name: String,
    #[serde(rename = "Email Address", default)]
    pub email: String,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "Priority")]
    pub priority: u32,
    #[serde(rename = "Total Attended")]
    pub total_attended: u32,
    #[serde(rename = "Active")]
    pub active: String,
    #[serde(rename = "Date Joined", default)]
    pub date_joined: String,
}

impl From<&Peep> for MemberRecord {
    fn from(peep: &Peep) -> Self {
        Self {
            id: peep.id.clone(),
            name: peep.full_name.clone(),
            display_name: peep.label().to_string(),
            email: peep.email.clone().unwrap_or_default(),
            role: peep.role.as_str().to_string(),
            index: peep.index,
            priority: peep.priority,
            total_attended: peep.total_attended,
            active: peep.active.to_string(),
            date_joined: peep.date_joined.clone().unwrap_or_default(),
        }
    }
}

impl MemberRecord {
    /// 转为参与者（本期问卷字段取默认值）
    pub fn into_peep(self) -> ImportResult<Peep> {
        let role = Role::parse(&self.role).ok_or_else(|| ImportError::InvalidFieldValue {
            row: self.id.clone(),
            field: "Role".to_string(),
            value: self.role.clone(),
        })?;
        let active = parse_flag(&self.active).ok_or_else(|| ImportError::InvalidFieldValue {
            row: self.id.clone(),
            field: "Active".to_string(),
            value: self.active.clone(),
        })?;

        let mut peep = Peep::new(self.id, self.name, role);
        if !self.display_name.is_empty() {
            peep.display_name = self.display_name;
        }
        peep.email = (!self.email.is_empty()).then_some(self.email);
        peep.index = self.index;
        peep.priority = self.priority;
        peep.total_attended = self.total_attended;
        peep.active = active;
        peep.date_joined = (!self.date_joined.is_empty()).then_some(self.date_joined);
        Ok(peep)
    }
}

/// responses.csv 的一行（活动定义行与问卷行共用）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseRow {
    #[serde(rename = "Timestamp", default)]
    pub timestamp: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Email Address", default)]
    pub email: String,
    #[serde(rename = "Primary Role", default)]
    pub primary_role: String,
    #[serde(rename = "Secondary Role", default)]
    pub secondary_role: String,
    #[serde(rename = "Max Sessions", default)]
    pub max_sessions: String,
    #[serde(rename = "Availability", default)]
    pub availability: String,
    #[serde(rename = "Event Duration", default)]
    pub event_duration: String,
    #[serde(rename = "Min Interval Days", default)]
    pub min_interval_days: String,
}

impl ResponseRow {
    fn is_event_row(&self) -> bool {
        self.name.starts_with(EVENT_ROW_PREFIX)
    }

    /// 可参加日期原文（逗号分隔）
    fn available_dates(&self) -> Vec<&str> {
        self.availability
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// output.json 中的问卷摘要
#[derive(Debug, Clone, Serialize)]
struct ResponseSummary<'a> {
    timestamp: &'a str,
    name: &'a str,
    role: Role,
    switch_pref: SwitchPreference,
    max_sessions: u32,
    available_dates: Vec<&'a str>,
}

// ==========================================
// 读取
// ==========================================

/// 读取 CSV 并按表头反序列化
///
/// 缺少 required 中任一列即报错
pub fn read_rows<T: DeserializeOwned>(path: &Path, required: &[&str]) -> ImportResult<Vec<T>> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns {
            file: path.display().to_string(),
            columns: missing.join(", "),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record: csv::StringRecord = record?.iter().map(normalize_quotes).collect();
        rows.push(record.deserialize(Some(&headers))?);
    }
    debug!(path = %path.display(), rows = rows.len(), "读取 CSV");
    Ok(rows)
}

/// 读取成员表
///
/// 校验: 邮箱（小写）不重复；在册成员必须有邮箱
pub fn load_members(path: &Path) -> ImportResult<Vec<Peep>> {
    let records: Vec<MemberRecord> = read_rows(path, &MEMBER_COLUMNS)?;
    let peeps = records
        .into_iter()
        .map(MemberRecord::into_peep)
        .collect::<ImportResult<Vec<Peep>>>()?;

    let mut seen = HashSet::new();
    for peep in &peeps {
        match peep.email.as_deref().map(normalize_email).filter(|e| !e.is_empty()) {
            Some(email) => {
                if !seen.insert(email.clone()) {
                    return Err(ImportError::DuplicateEmail(email));
                }
            }
            None if peep.active => return Err(ImportError::MissingEmail(peep.full_name.clone())),
            None => {}
        }
    }
    Ok(peeps)
}

pub fn load_responses(path: &Path) -> ImportResult<Vec<ResponseRow>> {
    read_rows(path, &RESPONSE_COLUMNS)
}

/// 问卷中出现的邮箱（小写）
pub fn responded_emails(rows: &[ResponseRow]) -> HashSet<String> {
    rows.iter()
        .filter(|r| !r.is_event_row())
        .map(|r| normalize_email(&r.email))
        .filter(|e| !e.is_empty())
        .collect()
}

// ==========================================
// 构造期次数据
// ==========================================

/// 成员表 + 问卷 → output.json 内容
///
/// # 参数
/// - members: 成员表（按 index 顺序即上期队列）
/// - rows: 问卷行
/// - year: 问卷日期所在年份
/// - config: 时长档位表
pub fn build_period_file(
    mut members: Vec<Peep>,
    rows: &[ResponseRow],
    year: i32,
    config: &ClassConfig,
) -> ImportResult<PeriodFile> {
    let events = extract_events(rows, year, config)?;
    let by_date: BTreeMap<NaiveDateTime, u32> = events.iter().map(|e| (e.date, e.id)).collect();

    let mut responses = Vec::new();
    for row in rows.iter().filter(|r| !r.is_event_row() && !r.name.is_empty()) {
        let email = normalize_email(&row.email);
        if email.is_empty() {
            return Err(ImportError::MissingEmail(row.name.clone()));
        }

        let peep = members
            .iter_mut()
            .find(|p| p.email.as_deref().map(normalize_email).as_deref() == Some(email.as_str()))
            .ok_or_else(|| ImportError::UnknownResponder(email.clone()))?;
        if !peep.active {
            return Err(ImportError::InactiveResponder(format!("{} (ID {})", peep.full_name, peep.id)));
        }

        let invalid = |field: &str, value: &str| ImportError::InvalidFieldValue {
            row: row.name.clone(),
            field: field.to_string(),
            value: value.to_string(),
        };

        peep.role = Role::parse(&row.primary_role).ok_or_else(|| invalid("Primary Role", &row.primary_role))?;
        peep.switch_pref = if row.secondary_role.is_empty() {
            SwitchPreference::PrimaryOnly
        } else {
            SwitchPreference::parse(&row.secondary_role)
                .ok_or_else(|| invalid("Secondary Role", &row.secondary_role))?
        };
        peep.event_limit = row
            .max_sessions
            .parse()
            .map_err(|_| invalid("Max Sessions", &row.max_sessions))?;
        peep.min_interval_days = if row.min_interval_days.is_empty() {
            0
        } else {
            row.min_interval_days
                .parse()
                .map_err(|_| invalid("Min Interval Days", &row.min_interval_days))?
        };
        peep.responded = true;

        let dates = row.available_dates();
        for raw in &dates {
            let date = parse_event_date(raw, year)?;
            let event_id = by_date.get(&date).ok_or_else(|| ImportError::UnknownAvailabilityDate {
                name: row.name.clone(),
                date: (*raw).to_string(),
            })?;
            if !peep.availability.contains(event_id) {
                peep.availability.push(*event_id);
            }
        }

        responses.push(serde_json::to_value(ResponseSummary {
            timestamp: &row.timestamp,
            name: &row.name,
            role: peep.role,
            switch_pref: peep.switch_pref,
            max_sessions: peep.event_limit,
            available_dates: dates,
        })?);
    }

    info!(
        members = members.len(),
        events = events.len(),
        responses = responses.len(),
        "问卷已转换为期次数据"
    );

    Ok(PeriodFile {
        peeps: members,
        events,
        responses,
    })
}

/// 活动定义
///
/// 有 "Event:" 行时按行序编号 0..；否则按问卷日期升序编号，时长取最长档位
fn extract_events(rows: &[ResponseRow], year: i32, config: &ClassConfig) -> ImportResult<Vec<EventRecord>> {
    let event_rows: Vec<&ResponseRow> = rows.iter().filter(|r| r.is_event_row()).collect();

    if event_rows.is_empty() {
        let mut dates = Vec::new();
        for row in rows {
            for raw in row.available_dates() {
                dates.push(parse_event_date(raw, year)?);
            }
        }
        dates.sort();
        dates.dedup();
        return Ok(dates
            .into_iter()
            .zip(0u32..)
            .map(|(date, id)| EventRecord {
                id,
                date,
                duration_minutes: config.longest_duration(),
            })
            .collect());
    }

    let mut events: Vec<EventRecord> = Vec::new();
    for (row, id) in event_rows.into_iter().zip(0u32..) {
        let raw = row.name.trim_start_matches(EVENT_ROW_PREFIX).trim();
        if raw.is_empty() {
            return Err(ImportError::MalformedEventRow(row.name.clone()));
        }
        let date = parse_event_date(raw, year)?;

        let duration: u32 = row
            .event_duration
            .parse()
            .map_err(|_| ImportError::InvalidFieldValue {
                row: row.name.clone(),
                field: "Event Duration".to_string(),
                value: row.event_duration.clone(),
            })?;
        if config.tier(duration).is_none() {
            return Err(ImportError::UnknownDuration {
                event_id: id,
                duration_minutes: duration,
            });
        }
        if events.iter().any(|e| e.date == date) {
            return Err(ImportError::MalformedEventRow(row.name.clone()));
        }

        events.push(EventRecord {
            id,
            date,
            duration_minutes: Some(duration),
        });
    }
    Ok(events)
}

/// "TRUE" / "false" / "1" / "yes"
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" | "" => Some(false),
        _ => None,
    }
}

/// 弯引号 → 直引号
fn normalize_quotes(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
}
