// ==========================================
// Peeps 排课系统 - 导入/导出模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 范围: 期次目录读写、JSON/CSV 解析、输入数据校验、配置读取
// ==========================================

use thiserror::Error;

/// 导入/导出模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("文件写入失败: {0}")]
    FileWriteError(String),

    #[error("JSON 解析失败: {0}")]
    JsonParseError(String),

    #[error("CSV 处理失败: {0}")]
    CsvError(String),

    // ===== 数据校验错误 =====
    #[error("日期格式错误 (字段 {field}): 无法识别 {value}")]
    DateFormatError { field: String, value: String },

    #[error("未知的活动时长 (活动 {event_id}): {duration_minutes} 分钟")]
    UnknownDuration { event_id: u32, duration_minutes: u32 },

    #[error("重复的活动ID: {0}")]
    DuplicateEventId(u32),

    #[error("重复的参与者ID: {0}")]
    DuplicatePeepId(String),

    #[error("参与者 {peep_id} 的可参加列表引用了不存在的活动: {event_id}")]
    UnknownEventInAvailability { peep_id: String, event_id: u32 },

    #[error("取消列表引用了不存在的活动: {0}")]
    UnknownCancelledEvent(String),

    #[error("取消列表引用了不存在的邮箱: {0}")]
    UnknownCancelledEmail(String),

    #[error("取消列表中邮箱重复: {0}")]
    DuplicateCancelledEmail(String),

    #[error("取消列表中 {email} 取消的活动 {event_id} 不在其可参加列表中")]
    CancelledAvailabilityNotListed { email: String, event_id: u32 },

    #[error("{file} 缺少必需列: {columns}")]
    MissingColumns { file: String, columns: String },

    #[error("字段取值无法识别 ({row} / {field}): {value}")]
    InvalidFieldValue {
        row: String,
        field: String,
        value: String,
    },

    #[error("成员表中邮箱重复: {0}")]
    DuplicateEmail(String),

    #[error("在册成员缺少邮箱: {0}")]
    MissingEmail(String),

    #[error("问卷邮箱不在成员表中: {0}")]
    UnknownResponder(String),

    #[error("问卷来自未激活成员: {0}")]
    InactiveResponder(String),

    #[error("{name} 的可参加日期不对应任何活动: {date}")]
    UnknownAvailabilityDate { name: String, date: String },

    #[error("活动定义行格式错误: {0}")]
    MalformedEventRow(String),

    #[error("出勤结果引用了不存在的参与者: {0}")]
    UnknownAttendee(String),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ImportError::FileNotFound(err.to_string()),
            _ => ImportError::FileReadError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::JsonParseError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
