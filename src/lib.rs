// ==========================================
// Peeps 排课系统 - 核心库
// ==========================================
// 双角色（Leader/Follower）月度活动排课
// 系统定位: 给出候选排课方案，并列时由人工选择
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 参与者 / 活动 / 序列
pub mod domain;

// 配置层 - 时长档位与运行配置
pub mod config;

// 引擎层 - 预筛选 / 排列评估 / 排名
pub mod engine;

// 导入/导出层 - 期次目录文件
pub mod importer;

// 可参加性报告
pub mod report;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Role, SwitchPreference};

// 领域实体
pub use domain::{Event, EventSequence, OffPrimaryAssignment, Peep, SequenceMetrics};

// 配置
pub use config::{ClassConfig, DurationTier, SchedulerConfig};

// 引擎
pub use engine::{
    EventSanitizer, ScheduleError, ScheduleOutcome, SchedulePhase, Scheduler, Selection,
    SequenceEvaluator, SweepOutcome,
};

// 导入/导出
pub use importer::{ImportError, PeriodLoader, ResultWriter, ScheduleReport};

pub use report::AvailabilityReport;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "Peeps 排课系统";
