// ==========================================
// Peeps 排课系统 - 领域类型定义
// ==========================================
// 角色 (Leader/Follower) 与换角偏好
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 舞蹈角色 (Role)
// ==========================================
// 序列化格式: "Leader" / "Follower" (与名单文件一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Leader,   // 领舞
    Follower, // 跟舞
}

impl Role {
    /// 全部角色（固定顺序: Leader 在前）
    pub const ALL: [Role; 2] = [Role::Leader, Role::Follower];

    /// 对立角色
    pub fn opposite(self) -> Role {
        match self {
            Role::Leader => Role::Follower,
            Role::Follower => Role::Leader,
        }
    }

    /// 从字符串解析角色
    ///
    /// 兼容旧表格中的简写: "lead" / "follow"（大小写不敏感）
    ///
    /// # 返回
    /// - Some(Role): 解析成功
    /// - None: 无法识别
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "leader" | "lead" => Some(Role::Leader),
            "follower" | "follow" => Some(Role::Follower),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Leader => "Leader",
            Role::Follower => "Follower",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 换角偏好 (Switch Preference)
// ==========================================
// 决定参与者能否被安排到非主角色
// 序列化格式: SCREAMING_SNAKE_CASE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchPreference {
    #[default]
    PrimaryOnly,         // 只跳主角色
    SwitchIfPrimaryFull, // 主角色满员时可换角
    SwitchIfNeeded,      // 换角能让活动成立时才换角
}

impl SwitchPreference {
    /// 从问卷文本解析换角偏好
    ///
    /// 问卷选项为整句描述，这里按关键字匹配；
    /// 同时接受枚举名本身（PRIMARY_ONLY 等）
    pub fn parse(s: &str) -> Option<SwitchPreference> {
        let v = s.trim().to_lowercase();
        if v.is_empty() {
            return None;
        }

        match v.as_str() {
            "primary_only" => return Some(SwitchPreference::PrimaryOnly),
            "switch_if_primary_full" => return Some(SwitchPreference::SwitchIfPrimaryFull),
            "switch_if_needed" => return Some(SwitchPreference::SwitchIfNeeded),
            _ => {}
        }

        if v.contains("only") && v.contains("primary") {
            Some(SwitchPreference::PrimaryOnly)
        } else if v.contains("full") {
            Some(SwitchPreference::SwitchIfPrimaryFull)
        } else if v.contains("need") {
            Some(SwitchPreference::SwitchIfNeeded)
        } else {
            None
        }
    }
}

impl fmt::Display for SwitchPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchPreference::PrimaryOnly => write!(f, "PRIMARY_ONLY"),
            SwitchPreference::SwitchIfPrimaryFull => write!(f, "SWITCH_IF_PRIMARY_FULL"),
            SwitchPreference::SwitchIfNeeded => write!(f, "SWITCH_IF_NEEDED"),
        }
    }
}
