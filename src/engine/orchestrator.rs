// ==========================================
// Peeps 排课系统 - 排课编排器
// ==========================================
// 主流程: Loaded → Sanitized → 容量扫描 [abs_min..=abs_max] → Evaluated → Ranked → Selected
// 终止态: Selected / Ranked(并列待选) / Aborted(无可行活动或无可行序列)
// 并发: 每个 worker 独占名册/活动副本，结果在 join_all 后统一汇总
// ==========================================

use crate::config::{ClassConfig, SchedulerConfig};
use crate::domain::event::Event;
use crate::domain::peep::Peep;
use crate::domain::sequence::EventSequence;
use crate::engine::evaluator::SequenceEvaluator;
use crate::engine::permutation::{chunk_ranges, nth_permutation, permutation_count};
use crate::engine::ranking::{top_candidates, Selection};
use crate::engine::sanitizer::EventSanitizer;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// SchedulePhase - 流程阶段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePhase {
    Loaded,
    Sanitized,
    Evaluated,
    Ranked,   // 多个并列候选，等待外部选择
    Selected, // 唯一最优
    Aborted,  // 无可行结果
}

impl fmt::Display for SchedulePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulePhase::Loaded => "LOADED",
            SchedulePhase::Sanitized => "SANITIZED",
            SchedulePhase::Evaluated => "EVALUATED",
            SchedulePhase::Ranked => "RANKED",
            SchedulePhase::Selected => "SELECTED",
            SchedulePhase::Aborted => "ABORTED",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// SweepOutcome - 容量扫描结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub sequences: Vec<EventSequence>, // 有效序列，按 (容量目标, 排列下标) 排序
    pub evaluated: usize,              // 完成评估的排列数
    pub failed: usize,                 // 因结构性错误中止的排列数
    pub timed_out: bool,               // 是否因超时提前结束（结果为部分结果）
    pub elapsed_ms: u128,
}

impl SweepOutcome {
    fn merge(&mut self, report: WorkerReport) {
        self.sequences.extend(report.sequences);
        self.evaluated += report.evaluated;
        self.failed += report.failed;
        self.timed_out |= report.timed_out;
    }
}

/// 扫描统计（不含序列本身）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub evaluated: usize,
    pub failed: usize,
    pub retained: usize,
    pub timed_out: bool,
    pub elapsed_ms: u128,
}

// ==========================================
// ScheduleOutcome - 一次排课运行的结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    pub run_id: String,
    pub phase: SchedulePhase,
    pub sanitized_out: Vec<u32>,    // 可用人数不足被剔除的活动
    pub overlap_removed: Vec<u32>,  // 重叠削减剔除的活动
    pub candidate_events: Vec<u32>, // 参与扫描的活动
    pub stats: SweepStats,
    pub selection: Selection,
}

/// 扫描输入（各 worker 只读共享）
///
/// 任务下标 j 对应 (targets[j / per_target], 第 j % per_target 个排列)，排列按需生成
struct SweepInput {
    events_by_id: HashMap<u32, Event>,
    peeps: Vec<Peep>,
    event_ids: Vec<u32>,
    targets: Vec<u32>,
    per_target: usize, // 每个容量目标的排列数 (n!)
}

impl SweepInput {
    fn job_count(&self) -> usize {
        self.targets.len().saturating_mul(self.per_target)
    }

    /// 任务下标 → (容量目标, 排列下标)
    fn job(&self, j: usize) -> Option<(u32, usize)> {
        if self.per_target == 0 {
            return None;
        }
        let target = *self.targets.get(j / self.per_target)?;
        Some((target, j % self.per_target))
    }
}

#[derive(Debug, Default)]
struct WorkerReport {
    sequences: Vec<EventSequence>,
    evaluated: usize,
    failed: usize,
    timed_out: bool,
}

/// 预处理结果
struct Prepared {
    run_id: String,
    peeps: Vec<Peep>,
    events: Vec<Event>,
    sanitized_out: Vec<u32>,
    overlap_removed: Vec<u32>,
}

// ==========================================
// Scheduler - 排课编排器
// ==========================================
pub struct Scheduler {
    config: SchedulerConfig,
    class_config: Arc<ClassConfig>,
    evaluator: SequenceEvaluator,
    sanitizer: EventSanitizer,
}

impl Scheduler {
    /// 创建编排器
    ///
    /// # 参数
    /// - config: 运行配置（含时长档位表）
    pub fn new(config: SchedulerConfig) -> Self {
        let class_config = Arc::new(config.class_config.clone());
        Self {
            evaluator: SequenceEvaluator::new(class_config.clone(), config.enable_switch_if_needed),
            sanitizer: EventSanitizer::new(&class_config),
            class_config,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn class_config(&self) -> &ClassConfig {
        &self.class_config
    }

    // ==========================================
    // 完整流程
    // ==========================================

    /// 执行完整排课流程（并行扫描）
    ///
    /// # 参数
    /// - events: 本期活动（默认时长）
    /// - peeps: 名册（priority/index 为上期 finalize 的结果）
    ///
    /// # 返回
    /// 排课结果；无可行方案时 phase = Aborted，不视为错误
    pub async fn schedule(&self, events: Vec<Event>, peeps: Vec<Peep>) -> ScheduleOutcome {
        let prepared = self.prepare(events, peeps);
        if prepared.events.is_empty() {
            return self.abort(prepared);
        }

        let sweep = if self.config.parallel {
            self.run_sweep(prepared.events.clone(), prepared.peeps.clone()).await
        } else {
            self.run_sweep_blocking(&prepared.events, &prepared.peeps)
        };
        self.conclude(prepared, sweep)
    }

    /// 执行完整排课流程（单线程）
    pub fn schedule_blocking(&self, events: Vec<Event>, peeps: Vec<Peep>) -> ScheduleOutcome {
        let prepared = self.prepare(events, peeps);
        if prepared.events.is_empty() {
            return self.abort(prepared);
        }

        let sweep = self.run_sweep_blocking(&prepared.events, &prepared.peeps);
        self.conclude(prepared, sweep)
    }

    fn prepare(&self, events: Vec<Event>, mut peeps: Vec<Peep>) -> Prepared {
        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            events_count = events.len(),
            peeps_count = peeps.len(),
            phase = %SchedulePhase::Loaded,
            "开始排课"
        );

        for peep in peeps.iter_mut() {
            peep.begin_run();
        }

        let sanitized = self.sanitizer.sanitize(events, &peeps);
        let kept_ids: Vec<u32> = sanitized.kept.iter().map(|e| e.id).collect();
        let events = self
            .sanitizer
            .reduce_overlap(sanitized.kept, &peeps, self.config.max_events);

        let remaining: HashSet<u32> = events.iter().map(|e| e.id).collect();
        let overlap_removed: Vec<u32> = kept_ids
            .into_iter()
            .filter(|id| !remaining.contains(id))
            .collect();

        info!(
            run_id = %run_id,
            phase = %SchedulePhase::Sanitized,
            kept = events.len(),
            sanitized_out = sanitized.removed_ids.len(),
            overlap_removed = overlap_removed.len(),
            "活动预筛选完成"
        );

        Prepared {
            run_id,
            peeps,
            events,
            sanitized_out: sanitized.removed_ids,
            overlap_removed,
        }
    }

    fn abort(&self, prepared: Prepared) -> ScheduleOutcome {
        warn!(run_id = %prepared.run_id, "没有可开课的活动");
        ScheduleOutcome {
            run_id: prepared.run_id,
            phase: SchedulePhase::Aborted,
            sanitized_out: prepared.sanitized_out,
            overlap_removed: prepared.overlap_removed,
            candidate_events: Vec::new(),
            stats: SweepStats::default(),
            selection: Selection::Empty,
        }
    }

    fn conclude(&self, prepared: Prepared, sweep: SweepOutcome) -> ScheduleOutcome {
        let stats = SweepStats {
            evaluated: sweep.evaluated,
            failed: sweep.failed,
            retained: sweep.sequences.len(),
            timed_out: sweep.timed_out,
            elapsed_ms: sweep.elapsed_ms,
        };
        info!(
            run_id = %prepared.run_id,
            phase = %SchedulePhase::Evaluated,
            evaluated = stats.evaluated,
            failed = stats.failed,
            retained = stats.retained,
            timed_out = stats.timed_out,
            elapsed_ms = stats.elapsed_ms as u64,
            "容量扫描完成"
        );

        let selection = Selection::from_candidates(top_candidates(sweep.sequences));
        let phase = match &selection {
            Selection::Empty => SchedulePhase::Aborted,
            Selection::Selected(_) => SchedulePhase::Selected,
            Selection::Tied(_) => SchedulePhase::Ranked,
        };

        match &selection {
            Selection::Empty => warn!(run_id = %prepared.run_id, "没有任何序列能开出活动"),
            Selection::Selected(best) => info!(run_id = %prepared.run_id, "自动选中最优序列: {}", best),
            Selection::Tied(c) => info!(run_id = %prepared.run_id, tied = c.len(), "存在并列最优序列"),
        }

        ScheduleOutcome {
            run_id: prepared.run_id,
            phase,
            sanitized_out: prepared.sanitized_out,
            overlap_removed: prepared.overlap_removed,
            candidate_events: prepared.events.iter().map(|e| e.id).collect(),
            stats,
            selection,
        }
    }

    // ==========================================
    // 容量扫描
    // ==========================================

    /// 容量扫描（单线程）
    ///
    /// 对 [abs_min, abs_max] 的每个容量目标评估全部活动排列，
    /// 每个排列使用独立副本；超时后返回已完成部分。
    #[instrument(skip_all, fields(events = events.len(), peeps = peeps.len()))]
    pub fn run_sweep_blocking(&self, events: &[Event], peeps: &[Peep]) -> SweepOutcome {
        let started = Instant::now();
        let deadline = self.config.sweep_timeout().map(|t| started + t);
        let input = self.sweep_input(events.to_vec(), peeps.to_vec());
        let stop = AtomicBool::new(false);

        let report = evaluate_jobs(&self.evaluator, &input, 0..input.job_count(), deadline, &stop);

        let mut outcome = SweepOutcome::default();
        outcome.merge(report);
        finish_sweep(&mut outcome, started);
        outcome
    }

    /// 容量扫描（并行）
    ///
    /// 任务按 (容量目标, 排列) 切块，交给 spawn_blocking worker；
    /// worker 在每个排列前检查截止时间与停止标志，超时后各自返回已完成部分。
    #[instrument(skip_all, fields(events = events.len(), peeps = peeps.len()))]
    pub async fn run_sweep(&self, events: Vec<Event>, peeps: Vec<Peep>) -> SweepOutcome {
        let started = Instant::now();
        let deadline = self.config.sweep_timeout().map(|t| started + t);
        let input = Arc::new(self.sweep_input(events, peeps));
        let stop = Arc::new(AtomicBool::new(false));

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let ranges = chunk_ranges(input.job_count(), workers);
        debug!(jobs = input.job_count(), workers = ranges.len(), "分派扫描任务");

        let handles = ranges.into_iter().map(|range| {
            let evaluator = self.evaluator.clone();
            let input = Arc::clone(&input);
            let stop = Arc::clone(&stop);
            let len = range.len();
            let handle = tokio::task::spawn_blocking(move || {
                evaluate_jobs(&evaluator, &input, range, deadline, &stop)
            });
            async move { (len, handle.await) }
        });

        let mut outcome = SweepOutcome::default();
        for (len, joined) in join_all(handles).await {
            match joined {
                Ok(report) => outcome.merge(report),
                Err(e) => {
                    warn!(error = %e, jobs = len, "扫描 worker 异常退出");
                    outcome.failed += len;
                }
            }
        }

        finish_sweep(&mut outcome, started);
        outcome
    }

    fn sweep_input(&self, events: Vec<Event>, peeps: Vec<Peep>) -> SweepInput {
        let event_ids: Vec<u32> = events.iter().map(|e| e.id).collect();
        let per_target = if event_ids.is_empty() {
            0
        } else {
            permutation_count(event_ids.len())
        };
        debug!(events = event_ids.len(), permutations = per_target, "活动排列数");

        SweepInput {
            events_by_id: events.into_iter().map(|e| (e.id, e)).collect(),
            peeps,
            event_ids,
            targets: self.class_config.capacity_targets().collect(),
            per_target,
        }
    }
}

/// worker 主体: 依次评估 jobs[range]
fn evaluate_jobs(
    evaluator: &SequenceEvaluator,
    input: &SweepInput,
    range: Range<usize>,
    deadline: Option<Instant>,
    stop: &AtomicBool,
) -> WorkerReport {
    let mut report = WorkerReport::default();

    for j in range {
        if stop.load(Ordering::Relaxed) || deadline.is_some_and(|d| Instant::now() >= d) {
            stop.store(true, Ordering::Relaxed);
            report.timed_out = true;
            break;
        }

        let Some((target_max, perm_idx)) = input.job(j) else {
            break;
        };
        let order = nth_permutation(&input.event_ids, perm_idx);
        match evaluator.evaluate_permutation(&input.events_by_id, &input.peeps, &order, target_max, perm_idx) {
            Ok(sequence) => {
                report.evaluated += 1;
                if sequence.has_valid_events() {
                    report.sequences.push(sequence);
                }
            }
            Err(e) => {
                report.evaluated += 1;
                report.failed += 1;
                warn!(target_max, permutation = perm_idx, error = %e, "排列评估中止");
            }
        }
    }

    report
}

fn finish_sweep(outcome: &mut SweepOutcome, started: Instant) {
    // 完成顺序不影响去重时保留哪一个
    outcome
        .sequences
        .sort_by_key(|s| (s.target_max, s.permutation_index));
    outcome.elapsed_ms = started.elapsed().as_millis();

    if outcome.timed_out {
        warn!(
            evaluated = outcome.evaluated,
            retained = outcome.sequences.len(),
            "扫描超时，返回部分结果"
        );
    }
}
