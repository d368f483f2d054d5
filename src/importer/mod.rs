// ==========================================
// Peeps 排课系统 - 导入/导出层
// ==========================================
// 职责: 读取期次目录（output.json + cancellations.json，或 members.csv + responses.csv），
//       写出排课结果（results.json + members_updated.csv），
//       按实际出勤回写成员表（actual_attendance.json）
// 红线: 引擎不直接碰文件，所有文件格式只在本层出现
// ==========================================

pub mod attendance;
pub mod cancellations;
pub mod csv_loader;
pub mod error;
pub mod period_loader;
pub mod result_writer;

// 重导出核心类型
pub use attendance::{apply_attendance, apply_results, AttendanceFile, ACTUAL_ATTENDANCE_FILE};
pub use cancellations::{CancellationSummary, CancelledAvailability, Cancellations};
pub use csv_loader::{build_period_file, load_members, load_responses, MemberRecord, ResponseRow};
pub use error::{ImportError, ImportResult};
pub use period_loader::{folder_year, parse_event_date, EventRecord, PeriodData, PeriodFile, PeriodLoader};
pub use result_writer::{EventResult, ParticipantRef, ResultWriter, ScheduleReport};
