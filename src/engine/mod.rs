// ==========================================
// Peeps 排课系统 - 引擎层
// ==========================================
// 职责: 预筛选 → 排列 → 序列评估 → 去重排名 → 编排
// 红线: 引擎不做文件读写，不做交互；并列结果交给调用方选择
// ==========================================

pub mod error;
pub mod evaluator;
pub mod orchestrator;
pub mod permutation;
pub mod ranking;
pub mod sanitizer;

// 重导出核心引擎
pub use error::{ScheduleError, ScheduleResult};
pub use evaluator::SequenceEvaluator;
pub use orchestrator::{ScheduleOutcome, SchedulePhase, Scheduler, SweepOutcome, SweepStats};
pub use ranking::{deduplicate, top_candidates, Selection};
pub use sanitizer::{EventSanitizer, SanitizeOutcome};
