// ==========================================
// Peeps 排课系统 - 课程时长档位配置
// ==========================================
// 职责: 时长 → {价格, 每角色最少/最多人数, 是否允许降档}
// 红线: 运行期间只读，通过 Arc 共享，不做全局可变状态
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// DurationTier - 单个时长档位
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationTier {
    pub price: f64,            // 整场价格
    pub min_role: u32,         // 每角色最少人数
    pub max_role: u32,         // 每角色最多人数
    pub allow_downgrade: bool, // 是否可作为降档目标
}

// ==========================================
// ClassConfig - 时长档位表
// ==========================================
// BTreeMap 保证按时长升序遍历（降档扫描依赖此顺序）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassConfig {
    tiers: BTreeMap<u32, DurationTier>,
}

impl Default for ClassConfig {
    /// 参考配置: 60 / 90 / 120 分钟三档
    fn default() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert(
            60,
            DurationTier {
                price: 120.0,
                min_role: 2,
                max_role: 3,
                allow_downgrade: false,
            },
        );
        tiers.insert(
            90,
            DurationTier {
                price: 195.0,
                min_role: 4,
                max_role: 5,
                allow_downgrade: true,
            },
        );
        tiers.insert(
            120,
            DurationTier {
                price: 260.0,
                min_role: 6,
                max_role: 7,
                allow_downgrade: true,
            },
        );
        Self { tiers }
    }
}

impl ClassConfig {
    /// 从档位列表构造
    ///
    /// # 参数
    /// - tiers: (时长分钟, 档位) 列表，重复时长以后者为准
    pub fn from_tiers<I>(tiers: I) -> Self
    where
        I: IntoIterator<Item = (u32, DurationTier)>,
    {
        Self {
            tiers: tiers.into_iter().collect(),
        }
    }

    /// 查询档位
    pub fn tier(&self, duration_minutes: u32) -> Option<&DurationTier> {
        self.tiers.get(&duration_minutes)
    }

    /// 按时长升序遍历全部档位
    pub fn iter(&self) -> impl Iterator<Item = (u32, &DurationTier)> {
        self.tiers.iter().map(|(d, t)| (*d, t))
    }

    /// 最长档位（新活动的默认时长）
    pub fn longest_duration(&self) -> Option<u32> {
        self.tiers.keys().next_back().copied()
    }

    /// 绝对最小每角色人数
    ///
    /// 取所有“允许降档”档位的 min_role 最小值；
    /// 没有任何档位允许降档时退化为全部档位的最小值。
    /// 参考配置下为 4。
    pub fn abs_min_role(&self) -> u32 {
        self.tiers
            .values()
            .filter(|t| t.allow_downgrade)
            .map(|t| t.min_role)
            .min()
            .or_else(|| self.tiers.values().map(|t| t.min_role).min())
            .unwrap_or(0)
    }

    /// 绝对最大每角色人数（全部档位 max_role 最大值，参考配置下为 7）
    pub fn abs_max_role(&self) -> u32 {
        self.tiers.values().map(|t| t.max_role).max().unwrap_or(0)
    }

    /// 容量目标扫描区间 [abs_min, abs_max]
    pub fn capacity_targets(&self) -> std::ops::RangeInclusive<u32> {
        self.abs_min_role()..=self.abs_max_role()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}
