// ==========================================
// Peeps 排课系统 - 运行配置
// ==========================================
// 职责: 单次排课运行的参数（活动上限、并行、超时、档位表）
// 来源优先级: 默认值 < JSON 配置文件 < 环境变量 < 命令行参数
// ==========================================

use crate::config::class_config::ClassConfig;
use crate::importer::error::ImportError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 活动上限的最大允许值（8! × 4 个容量目标 ≈ 16 万次评估）
pub const MAX_EVENTS_LIMIT: usize = 8;

// ==========================================
// SchedulerConfig - 排课运行配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_events: usize,               // 重叠削减后的活动上限: 7
    pub sequence_choice: usize,          // 并列时选用的候选下标: 0
    pub sweep_timeout_secs: Option<u64>, // 扫描超时（秒），None 表示不限
    pub parallel: bool,                  // 是否并行评估排列: true
    pub enable_switch_if_needed: bool,   // 是否启用 SwitchIfNeeded 候补转角色: true
    pub class_config: ClassConfig,       // 时长档位表
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_events: 7,
            sequence_choice: 0,
            sweep_timeout_secs: None,
            parallel: true,
            enable_switch_if_needed: true,
            class_config: ClassConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// 从 JSON 文件加载（缺失字段取默认值）
    ///
    /// # 参数
    /// - path: 配置文件路径
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ImportError::ConfigReadError {
            key: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config: SchedulerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 应用进程环境变量覆写
    pub fn with_env_overrides(self) -> Result<Self, ImportError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// 应用覆写
    ///
    /// # 参数
    /// - lookup: 键 → 值（未设置返回 None），键名见 config_keys
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ImportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(config_keys::MAX_EVENTS) {
            self.max_events = parse_value(config_keys::MAX_EVENTS, &v)?;
        }
        if let Some(v) = lookup(config_keys::SEQUENCE_CHOICE) {
            self.sequence_choice = parse_value(config_keys::SEQUENCE_CHOICE, &v)?;
        }
        if let Some(v) = lookup(config_keys::SWEEP_TIMEOUT_SECS) {
            // 空串或 0 表示不限时
            let secs: u64 = if v.trim().is_empty() {
                0
            } else {
                parse_value(config_keys::SWEEP_TIMEOUT_SECS, &v)?
            };
            self.sweep_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = lookup(config_keys::PARALLEL) {
            self.parallel = parse_bool(config_keys::PARALLEL, &v)?;
        }
        if let Some(v) = lookup(config_keys::SWITCH_IF_NEEDED) {
            self.enable_switch_if_needed = parse_bool(config_keys::SWITCH_IF_NEEDED, &v)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn sweep_timeout(&self) -> Option<Duration> {
        self.sweep_timeout_secs.map(Duration::from_secs)
    }

    /// 基本校验
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.max_events == 0 {
            return Err(ImportError::ConfigValueError {
                key: config_keys::MAX_EVENTS.to_string(),
                value: "0".to_string(),
                message: "活动上限必须大于 0".to_string(),
            });
        }
        if self.max_events > MAX_EVENTS_LIMIT {
            return Err(ImportError::ConfigValueError {
                key: config_keys::MAX_EVENTS.to_string(),
                value: self.max_events.to_string(),
                message: format!("活动上限不能超过 {}（排列数按阶乘增长）", MAX_EVENTS_LIMIT),
            });
        }
        if self.class_config.is_empty() {
            return Err(ImportError::ConfigValueError {
                key: "class_config".to_string(),
                value: "{}".to_string(),
                message: "时长档位表不能为空".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ImportError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ImportError::ConfigValueError {
            key: key.to_string(),
            value: value.to_string(),
            message: e.to_string(),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ImportError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ImportError::ConfigValueError {
            key: key.to_string(),
            value: value.to_string(),
            message: "期望布尔值 (true/false)".to_string(),
        }),
    }
}

// ==========================================
// 配置键常量（环境变量名）
// ==========================================
pub mod config_keys {
    pub const MAX_EVENTS: &str = "PEEPS_MAX_EVENTS";
    pub const SEQUENCE_CHOICE: &str = "PEEPS_SEQUENCE_CHOICE";
    pub const SWEEP_TIMEOUT_SECS: &str = "PEEPS_SWEEP_TIMEOUT_SECS";
    pub const PARALLEL: &str = "PEEPS_PARALLEL";
    pub const SWITCH_IF_NEEDED: &str = "PEEPS_SWITCH_IF_NEEDED";
}
