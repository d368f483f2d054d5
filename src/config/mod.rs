// ==========================================
// Peeps 排课系统 - 配置层
// ==========================================
// 职责: 时长档位表 + 单次运行配置
// 红线: 配置对象在运行期间只读，显式传入引擎，不使用全局状态
// ==========================================

pub mod class_config;
pub mod scheduler_config;

// 重导出
pub use class_config::{ClassConfig, DurationTier};
pub use scheduler_config::{config_keys, SchedulerConfig, MAX_EVENTS_LIMIT};
