// ==========================================
// Peeps 排课系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 结构性不变量被破坏时返回，只中止当前排列的评估，
//       不影响整轮扫描（其他排列/容量目标继续）
// ==========================================

use crate::domain::types::Role;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    // ===== 名额相关 =====
    #[error("角色名额已满 (event={event_id}, role={role}, max={max_role})")]
    RoleCapacityExceeded {
        event_id: u32,
        role: Role,
        max_role: u32,
    },

    #[error("参与者重复报名 (event={event_id}, peep_idx={peep_idx})")]
    DuplicateAttendee { event_id: u32, peep_idx: usize },

    #[error("参与者已在候补名单中 (event={event_id}, peep_idx={peep_idx})")]
    DuplicateAlternate { event_id: u32, peep_idx: usize },

    #[error("参与者不是该角色的正式成员 (event={event_id}, peep_idx={peep_idx}, role={role})")]
    NotAnAttendee {
        event_id: u32,
        peep_idx: usize,
        role: Role,
    },

    #[error("参与者不在该角色的候补名单中 (event={event_id}, peep_idx={peep_idx}, role={role})")]
    NotAnAlternate {
        event_id: u32,
        peep_idx: usize,
        role: Role,
    },

    // ===== 平衡/降档 =====
    #[error("角色人数无法平衡 (event={event_id}, leaders={leaders}, followers={followers})")]
    UnbalancedRoles {
        event_id: u32,
        leaders: usize,
        followers: usize,
    },

    #[error("活动未欠员，无需降档 (event={event_id}, duration={duration_minutes})")]
    DowngradeNotUnderfilled { event_id: u32, duration_minutes: u32 },

    // ===== 配置/引用 =====
    #[error("未知的活动时长: {0} 分钟")]
    UnknownDuration(u32),

    #[error("参与者下标越界: {0}")]
    UnknownParticipant(usize),
}

/// Result 类型别名
pub type ScheduleResult<T> = Result<T, ScheduleError>;
