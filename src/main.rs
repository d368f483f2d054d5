// ==========================================
// Peeps 排课系统 - 命令行入口
// ==========================================
// 用法:
//   peeps-scheduler <period_dir> [--max-events N] [--choice K] [--config FILE] [--report-only] [--load-from-csv]
//   peeps-scheduler apply-results <period_dir> [--results-file NAME]
//
// 流程: (CSV → output.json) → 读取期次目录 → 可参加性报告 → 排课 → 写出 results.json / members_updated.csv
// apply-results: 按实际出勤（actual_attendance.json）回写 members_updated.csv
// ==========================================

use anyhow::{bail, Context, Result};
use peeps_scheduler::engine::Selection;
use peeps_scheduler::importer::{apply_results, PeriodLoader, ResultWriter, ScheduleReport, ACTUAL_ATTENDANCE_FILE};
use peeps_scheduler::{logging, AvailabilityReport, Scheduler, SchedulerConfig};
use std::path::PathBuf;
use tracing::{info, warn};

const USAGE: &str = "usage: peeps-scheduler <period_dir> [--max-events N] [--choice K] [--config FILE] [--report-only] [--load-from-csv]
       peeps-scheduler apply-results <period_dir> [--results-file NAME]";

#[derive(Debug, Default)]
struct CliArgs {
    period_dir: PathBuf,
    max_events: Option<usize>,
    choice: Option<usize>,
    config: Option<PathBuf>,
    report_only: bool,
    load_from_csv: bool,
}

#[derive(Debug)]
enum Command {
    Run(CliArgs),
    ApplyResults { period_dir: PathBuf, results_file: String },
}

fn parse_command(args: impl Iterator<Item = String>) -> Result<Command> {
    let mut args = args.peekable();
    if args.peek().map(String::as_str) != Some("apply-results") {
        return parse_args(args).map(Command::Run);
    }
    args.next();

    let mut period_dir = None;
    let mut results_file = ACTUAL_ATTENDANCE_FILE.to_string();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--results-file" => results_file = args.next().context("--results-file 缺少参数")?,
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("未知参数: {}\n{}", other, USAGE),
            other => {
                if period_dir.replace(PathBuf::from(other)).is_some() {
                    bail!("只能指定一个期次目录\n{}", USAGE);
                }
            }
        }
    }

    Ok(Command::ApplyResults {
        period_dir: period_dir.context(USAGE)?,
        results_file,
    })
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut period_dir = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--max-events" => {
                let v = args.next().context("--max-events 缺少参数")?;
                cli.max_events = Some(v.parse().with_context(|| format!("--max-events 无效: {}", v))?);
            }
            "--choice" => {
                let v = args.next().context("--choice 缺少参数")?;
                cli.choice = Some(v.parse().with_context(|| format!("--choice 无效: {}", v))?);
            }
            "--config" => {
                cli.config = Some(PathBuf::from(args.next().context("--config 缺少参数")?));
            }
            "--report-only" => cli.report_only = true,
            "--load-from-csv" => cli.load_from_csv = true,
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("未知参数: {}\n{}", other, USAGE),
            other => {
                if period_dir.replace(PathBuf::from(other)).is_some() {
                    bail!("只能指定一个期次目录\n{}", USAGE);
                }
            }
        }
    }

    cli.period_dir = period_dir.context(USAGE)?;
    Ok(cli)
}

/// 配置来源: 默认值 < 配置文件 < 环境变量 < 命令行
fn build_config(cli: &CliArgs) -> Result<SchedulerConfig> {
    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?,
        None => SchedulerConfig::default(),
    }
    .with_env_overrides()
    .context("环境变量配置无效")?;

    if let Some(n) = cli.max_events {
        config.max_events = n;
    }
    if let Some(k) = cli.choice {
        config.sequence_choice = k;
    }
    config.validate().context("命令行参数无效")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = match parse_command(std::env::args().skip(1))? {
        Command::Run(cli) => cli,
        Command::ApplyResults { period_dir, results_file } => {
            let path = apply_results(&period_dir, &results_file)
                .with_context(|| format!("回写实际出勤失败: {}", period_dir.display()))?;
            println!("已写出 {}", path.display());
            return Ok(());
        }
    };
    let config = build_config(&cli)?;

    info!("==================================================");
    info!("{} v{}", peeps_scheduler::APP_NAME, peeps_scheduler::VERSION);
    info!("期次目录: {}", cli.period_dir.display());
    info!("==================================================");

    let loader = PeriodLoader::new(&cli.period_dir);
    if cli.load_from_csv {
        let path = loader
            .convert_csv(&config.class_config)
            .with_context(|| format!("由 CSV 生成期次数据失败: {}", cli.period_dir.display()))?;
        println!("已生成 {}", path.display());
    }
    let period = loader
        .load(&config.class_config)
        .with_context(|| format!("加载期次数据失败: {}", cli.period_dir.display()))?;

    let report = AvailabilityReport::build(&period.events, &period.peeps)
        .with_cancellations(period.cancellations.clone());
    println!("{}", report);
    if cli.report_only {
        return Ok(());
    }

    let scheduler = Scheduler::new(config.clone());
    let outcome = scheduler.schedule(period.events, period.peeps).await;
    if outcome.stats.timed_out {
        warn!(evaluated = outcome.stats.evaluated, "扫描超时，结果基于已完成的排列");
    }

    let chosen = match outcome.selection {
        Selection::Empty => {
            println!("没有可行的排课方案");
            return Ok(());
        }
        Selection::Selected(best) => *best,
        Selection::Tied(candidates) => {
            println!("存在 {} 个并列最优序列:", candidates.len());
            for (i, candidate) in candidates.iter().enumerate() {
                println!("  [{}] {}", i, candidate);
            }
            let index = config.sequence_choice;
            let total = candidates.len();
            Selection::Tied(candidates)
                .choose(index)
                .with_context(|| format!("--choice {} 超出范围 (共 {} 个候选)", index, total))?
        }
    };

    println!("\n选中序列: {}", chosen);
    for event in chosen.valid_events() {
        println!(
            "\n[{}] {} ({} 分钟, 每人 {})",
            event.id,
            event.date.format(peeps_scheduler::domain::DATE_FORMAT),
            event.duration_minutes(),
            event.price_per_person()
        );
        println!("    {}", chosen.roster_line(event, peeps_scheduler::Role::Leader));
        println!("    {}", chosen.roster_line(event, peeps_scheduler::Role::Follower));
    }

    let schedule_report = ScheduleReport::from_sequence(&outcome.run_id, &chosen);
    let writer = ResultWriter::new(&cli.period_dir);
    writer.write(&schedule_report).context("写出排课结果失败")?;
    println!(
        "\n已写出 {} 和 {}",
        writer.results_path().display(),
        writer.members_path().display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let cli = parse_args(args(&["data/2025-03", "--max-events", "5", "--choice", "2"])).unwrap();
        assert_eq!(cli.period_dir, PathBuf::from("data/2025-03"));
        assert_eq!(cli.max_events, Some(5));
        assert_eq!(cli.choice, Some(2));
        assert!(!cli.report_only);

        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["a", "b"])).is_err());
        assert!(parse_args(args(&["a", "--max-events"])).is_err());
        assert!(parse_args(args(&["a", "--bogus"])).is_err());
    }

    #[test]
    fn test_parse_command() {
        match parse_command(args(&["data/2025-03", "--load-from-csv"])).unwrap() {
            Command::Run(cli) => {
                assert!(cli.load_from_csv);
                assert_eq!(cli.period_dir, PathBuf::from("data/2025-03"));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        match parse_command(args(&["apply-results", "data/2025-03"])).unwrap() {
            Command::ApplyResults { period_dir, results_file } => {
                assert_eq!(period_dir, PathBuf::from("data/2025-03"));
                assert_eq!(results_file, "actual_attendance.json");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        match parse_command(args(&["apply-results", "d", "--results-file", "results.json"])).unwrap() {
            Command::ApplyResults { results_file, .. } => assert_eq!(results_file, "results.json"),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(parse_command(args(&["apply-results"])).is_err());
        assert!(parse_command(args(&["apply-results", "d", "--results-file"])).is_err());
    }
}
