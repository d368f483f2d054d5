// ==========================================
// Peeps 排课系统 - 期次数据加载
// ==========================================
// 输入: <期次目录>/output.json  { peeps, events, responses }
//       <期次目录>/cancellations.json（可选）
//       或 members.csv + responses.csv（convert_csv 先转换为 output.json）
// 输出: 校验后的名册（按 index 排序）+ 活动列表（Event，默认最长时长）
// ==========================================

use crate::config::ClassConfig;
use crate::domain::event::{Event, DATE_FORMAT};
use crate::domain::peep::Peep;
use crate::importer::cancellations::{CancellationSummary, Cancellations};
use crate::importer::csv_loader::{self, MEMBERS_FILE, RESPONSES_FILE};
use crate::importer::error::{ImportError, ImportResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const PERIOD_INPUT_FILE: &str = "output.json";
pub const CANCELLATIONS_FILE: &str = "cancellations.json";

// ==========================================
// 文件结构
// ==========================================

/// output.json 中的活动记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: u32,
    #[serde(with = "date_format")]
    pub date: NaiveDateTime,
    #[serde(default)]
    pub duration_minutes: Option<u32>, // 缺省取最长档位
}

/// output.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodFile {
    #[serde(default)]
    pub peeps: Vec<Peep>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
    #[serde(default)]
    pub responses: Vec<serde_json::Value>, // 问卷原始摘要，仅透传计数
}

/// 加载结果
#[derive(Debug, Clone)]
pub struct PeriodData {
    pub peeps: Vec<Peep>,
    pub events: Vec<Event>,
    pub response_count: usize,
    pub cancellations: Option<CancellationSummary>,
}

// ==========================================
// PeriodLoader
// ==========================================
pub struct PeriodLoader {
    dir: PathBuf,
}

impl PeriodLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.join(PERIOD_INPUT_FILE)
    }

    pub fn cancellations_path(&self) -> PathBuf {
        self.dir.join(CANCELLATIONS_FILE)
    }

    pub fn members_path(&self) -> PathBuf {
        self.dir.join(MEMBERS_FILE)
    }

    pub fn responses_path(&self) -> PathBuf {
        self.dir.join(RESPONSES_FILE)
    }

    /// members.csv + responses.csv → output.json
    ///
    /// 问卷日期不带年份，年份取目录名前 4 位数字（如 "2025-03"），取不到时用当前年份
    pub fn convert_csv(&self, config: &ClassConfig) -> ImportResult<PathBuf> {
        let members = csv_loader::load_members(&self.members_path())?;
        let rows = csv_loader::load_responses(&self.responses_path())?;
        let year = folder_year(&self.dir).unwrap_or_else(|| chrono::Local::now().year());

        let file = csv_loader::build_period_file(members, &rows, year, config)?;
        let path = self.input_path();
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&path, json)
            .map_err(|e| ImportError::FileWriteError(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), year, "已由 CSV 生成期次数据");
        Ok(path)
    }

    /// 读取并校验期次数据
    ///
    /// 存在 cancellations.json 时先应用取消，再构造活动
    pub fn load(&self, config: &ClassConfig) -> ImportResult<PeriodData> {
        let path = self.input_path();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(&path)?;
        let mut file: PeriodFile = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            peeps = file.peeps.len(),
            events = file.events.len(),
            "读取期次数据"
        );

        let cancellations_path = self.cancellations_path();
        let cancellations = if cancellations_path.exists() {
            let year = period_year(&file.events);
            let cancellations = Cancellations::from_file(&cancellations_path, year)?;
            Some(cancellations.apply(&mut file.events, &mut file.peeps)?)
        } else {
            None
        };

        let mut data = build_period(file, config)?;
        data.cancellations = cancellations;
        Ok(data)
    }
}

/// 校验并构造名册与活动
///
/// 校验: 活动ID唯一、参与者ID唯一、可参加列表只引用已知活动、时长在档位表中
pub fn build_period(file: PeriodFile, config: &ClassConfig) -> ImportResult<PeriodData> {
    let mut event_ids = HashSet::new();
    for record in &file.events {
        if !event_ids.insert(record.id) {
            return Err(ImportError::DuplicateEventId(record.id));
        }
    }

    let mut peep_ids = HashSet::new();
    for peep in &file.peeps {
        if !peep_ids.insert(peep.id.as_str()) {
            return Err(ImportError::DuplicatePeepId(peep.id.clone()));
        }
        if let Some(unknown) = peep.availability.iter().find(|id| !event_ids.contains(*id)) {
            return Err(ImportError::UnknownEventInAvailability {
                peep_id: peep.id.clone(),
                event_id: *unknown,
            });
        }
    }

    let default_duration = config.longest_duration().unwrap_or(0);
    let events = file
        .events
        .iter()
        .map(|record| {
            let duration = record.duration_minutes.unwrap_or(default_duration);
            Event::new(record.id, record.date, duration, config).map_err(|_| ImportError::UnknownDuration {
                event_id: record.id,
                duration_minutes: duration,
            })
        })
        .collect::<ImportResult<Vec<Event>>>()?;

    let mut peeps = file.peeps;
    peeps.sort_by_key(|p| p.index);
    if !is_sorted_by_priority(&peeps) {
        warn!("名册 index 顺序与 priority 不一致，按 index 继续");
    }

    Ok(PeriodData {
        peeps,
        events,
        response_count: file.responses.len(),
        cancellations: None,
    })
}

/// 按 index 排好的名册中 priority 是否非递增
fn is_sorted_by_priority(peeps: &[Peep]) -> bool {
    peeps.windows(2).all(|w| w[0].priority >= w[1].priority)
}

/// 期次年份: 取第一场活动的年份，没有活动时取当前年份
fn period_year(events: &[EventRecord]) -> i32 {
    events
        .iter()
        .map(|e| e.date.year())
        .min()
        .unwrap_or_else(|| chrono::Local::now().year())
}

/// 目录名前 4 位数字作为年份
pub fn folder_year(dir: &Path) -> Option<i32> {
    let name = dir.file_name()?.to_str()?;
    name.get(..4)?.parse().ok()
}

// ==========================================
// 日期解析
// ==========================================

/// 解析活动日期
///
/// 接受两种写法:
/// - "2025-03-02 17:00"（DATE_FORMAT）
/// - 问卷写法 "Sunday March 2 - 5pm"，可带括号备注，年份由调用方给出
pub fn parse_event_date(raw: &str, year: i32) -> ImportResult<NaiveDateTime> {
    let invalid = || ImportError::DateFormatError {
        field: "date".to_string(),
        value: raw.to_string(),
    };

    let s = raw.split('(').next().unwrap_or_default().trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, DATE_FORMAT) {
        return Ok(dt);
    }

    let (day_part, time_part) = s.split_once(" - ").ok_or_else(invalid)?;
    let date = NaiveDate::parse_from_str(&format!("{} {}", day_part.trim(), year), "%A %B %d %Y")
        .map_err(|_| invalid())?;
    let time = parse_clock(time_part.trim()).ok_or_else(invalid)?;
    Ok(date.and_time(time))
}

/// "5pm" / "5:30PM" / "11am"
fn parse_clock(s: &str) -> Option<NaiveTime> {
    let lower = s.to_ascii_lowercase();
    let (digits, pm) = if let Some(d) = lower.strip_suffix("pm") {
        (d.trim(), true)
    } else if let Some(d) = lower.strip_suffix("am") {
        (d.trim(), false)
    } else {
        return None;
    };

    let (hour, minute) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None => (digits.parse::<u32>().ok()?, 0),
    };
    if !(1..=12).contains(&hour) {
        return None;
    }

    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// serde: NaiveDateTime <-> "YYYY-MM-DD HH:MM"
pub mod date_format {
    use crate::domain::event::DATE_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Role;

    fn record(id: u32, date: &str, duration: Option<u32>) -> EventRecord {
        EventRecord {
            id,
            date: NaiveDateTime::parse_from_str(date, DATE_FORMAT).unwrap(),
            duration_minutes: duration,
        }
    }

    fn peep(id: &str, index: usize, priority: u32, availability: Vec<u32>) -> Peep {
        let mut p = Peep::new(id, format!("Peep {}", id), Role::Leader);
        p.index = index;
        p.priority = priority;
        p.availability = availability;
        p
    }

    #[test]
    fn test_build_period_defaults_to_longest_duration() {
        let file = PeriodFile {
            peeps: vec![peep("b", 1, 0, vec![1]), peep("a", 0, 2, vec![1, 2])],
            events: vec![record(1, "2025-03-02 17:00", None), record(2, "2025-03-09 17:00", Some(90))],
            responses: Vec::new(),
        };

        let data = build_period(file, &ClassConfig::default()).unwrap();
        assert_eq!(data.events[0].duration_minutes(), 120);
        assert_eq!(data.events[1].duration_minutes(), 90);
        assert_eq!(data.peeps[0].id, "a");
        assert_eq!(data.peeps[1].id, "b");
    }

    #[test]
    fn test_build_period_rejects_unknown_availability() {
        let file = PeriodFile {
            peeps: vec![peep("a", 0, 0, vec![9])],
            events: vec![record(1, "2025-03-02 17:00", None)],
            responses: Vec::new(),
        };
        let err = build_period(file, &ClassConfig::default()).unwrap_err();
        assert!(matches!(err, ImportError::UnknownEventInAvailability { event_id: 9, .. }));
    }

    #[test]
    fn test_build_period_rejects_duplicates_and_bad_duration() {
        let dup_events = PeriodFile {
            events: vec![record(1, "2025-03-02 17:00", None), record(1, "2025-03-03 17:00", None)],
            ..PeriodFile::default()
        };
        assert!(matches!(
            build_period(dup_events, &ClassConfig::default()),
            Err(ImportError::DuplicateEventId(1))
        ));

        let dup_peeps = PeriodFile {
            peeps: vec![peep("a", 0, 0, vec![]), peep("a", 1, 0, vec![])],
            ..PeriodFile::default()
        };
        assert!(matches!(
            build_period(dup_peeps, &ClassConfig::default()),
            Err(ImportError::DuplicatePeepId(_))
        ));

        let bad_duration = PeriodFile {
            events: vec![record(1, "2025-03-02 17:00", Some(45))],
            ..PeriodFile::default()
        };
        assert!(matches!(
            build_period(bad_duration, &ClassConfig::default()),
            Err(ImportError::UnknownDuration { duration_minutes: 45, .. })
        ));
    }

    #[test]
    fn test_parse_event_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 2)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        assert_eq!(parse_event_date("2025-03-02 17:00", 1999).unwrap(), expected);
        assert_eq!(parse_event_date("Sunday March 2 - 5pm", 2025).unwrap(), expected);
        assert_eq!(parse_event_date("Sunday March 2 - 5PM (beginner)", 2025).unwrap(), expected);

        let half = parse_event_date("Sunday March 2 - 5:30pm", 2025).unwrap();
        assert_eq!(half.format(DATE_FORMAT).to_string(), "2025-03-02 17:30");

        assert!(parse_event_date("Funday March 2 - 5pm", 2025).is_err());
        assert!(parse_event_date("Sunday March 2 - 13pm", 2025).is_err());
        assert!(parse_event_date("tomorrow", 2025).is_err());
    }

    #[test]
    fn test_period_file_json_shape() {
        let json = r#"{
            "peeps": [{
                "id": "7",
                "name": "Alice Alpha",
                "email": "alice@example.com",
                "role": "Follower",
                "switch_pref": "SWITCH_IF_PRIMARY_FULL",
                "availability": [1],
                "event_limit": 2,
                "priority": 3,
                "index": 0,
                "responded": true
            }],
            "events": [{ "id": 1, "date": "2025-03-02 17:00" }],
            "responses": [{ "name": "Alice Alpha" }]
        }"#;

        let file: PeriodFile = serde_json::from_str(json).unwrap();
        let data = build_period(file, &ClassConfig::default()).unwrap();
        assert_eq!(data.response_count, 1);
        assert_eq!(data.peeps[0].full_name, "Alice Alpha");
        assert_eq!(data.peeps[0].role, Role::Follower);
        assert!(data.peeps[0].active);
        assert_eq!(data.events[0].date.format(DATE_FORMAT).to_string(), "2025-03-02 17:00");
    }

    #[test]
    fn test_folder_year() {
        assert_eq!(folder_year(Path::new("data/2025-03")), Some(2025));
        assert_eq!(folder_year(Path::new("/tmp/2024_november/")), Some(2024));
        assert_eq!(folder_year(Path::new("data/march")), None);
        assert_eq!(folder_year(Path::new("25")), None);
    }
}
