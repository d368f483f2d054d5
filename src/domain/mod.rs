// ==========================================
// Peeps 排课系统 - 领域模型层
// ==========================================
// 职责: 定义参与者、活动、候选序列及其局部不变量
// 红线: 不含文件读写，不含跨序列的调度逻辑
// ==========================================

pub mod event;
pub mod peep;
pub mod sequence;
pub mod types;

// 重导出核心类型
pub use event::{Event, DATE_FORMAT};
pub use peep::Peep;
pub use sequence::{EventSequence, OffPrimaryAssignment, SequenceKey, SequenceMetrics};
pub use types::{Role, SwitchPreference};
