//! 处理入口: 清理 → 选择会话 → 分析 → 发布到仪表盘数据目录

use std::path::PathBuf;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};

use super::analyzer::{SessionAnalyzer, SessionOutcome};
use super::cleanup::cleanup_old_sessions;
use super::departure::DEPARTURE_COLUMNS;
use super::frames::find_latest_session;
use crate::config::Args;
use crate::storage::{merge_into_master, write_rows, MergeOutcome, DEPARTURES_FILE, MEASUREMENTS_FILE};

/// 会话处理器
#[derive(Clone, Debug)]
pub struct Processor {
    pub images_dir: PathBuf,  // 会话根目录
    pub data_dir: PathBuf,    // 仪表盘数据目录
    pub retention_days: i64,  // 会话保留天数
    pub cleanup: bool,        // 是否先清理过期会话
}

impl Processor {
    pub fn new(images_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            data_dir: data_dir.into(),
            retention_days: crate::config::DEFAULT_RETENTION_DAYS,
            cleanup: true,
        }
    }

    pub fn from_args(args: &Args) -> Self {
        Self {
            images_dir: args.images_dir(),
            data_dir: args.data_dir(),
            retention_days: args.retention_days,
            cleanup: !args.no_cleanup,
        }
    }

    /// 处理一个会话; 未指定日期时取最新会话
    ///
    /// 会话完成且至少有一条测量记录时返回 true
    pub fn run(
        &self,
        analyzer: &SessionAnalyzer,
        date: Option<NaiveDate>,
        now: NaiveDateTime,
    ) -> Result<bool> {
        if self.cleanup {
            let removed = cleanup_old_sessions(&self.images_dir, now, self.retention_days)?;
            if !removed.is_empty() {
                info!("🧹 清理了 {} 个过期会话", removed.len());
            }
        }

        let date = match date {
            Some(date) => date,
            None => match find_latest_session(&self.images_dir)? {
                Some(date) => date,
                None => {
                    warn!("⚠️  {} 下没有会话目录", self.images_dir.display());
                    return Ok(false);
                }
            },
        };

        let report = match analyzer.run(&self.images_dir, date) {
            SessionOutcome::Completed(report) => report,
            SessionOutcome::Aborted { .. } => return Ok(false),
        };

        // 先合并主数据集: 主文件损坏时整次发布失败, 离开数据保持上一次的内容
        let has_measurements = !report.measurements.is_empty();
        if has_measurements {
            let master = self.data_dir.join(MEASUREMENTS_FILE);
            match merge_into_master(&master, &report.measurements)? {
                MergeOutcome::Created { rows } => info!("📤 新建主数据集, 写入 {} 行", rows),
                MergeOutcome::Appended { rows, total } => {
                    info!("📤 主数据集追加 {} 行, 共 {} 行", rows, total)
                }
                MergeOutcome::SkippedDuplicateDate { date } => {
                    info!("ℹ️  {} 已处理过, 主数据集未改动", date)
                }
                MergeOutcome::NothingToMerge => {}
            }
        } else {
            warn!("⚠️  会话 {} 没有三帧一致的标本", report.date);
        }

        // 离开数据覆盖写出
        let departures_path = self.data_dir.join(DEPARTURES_FILE);
        write_rows(&departures_path, &DEPARTURE_COLUMNS, &report.departures)?;
        info!("📤 离开数据已发布到 {}", departures_path.display());

        Ok(has_measurements)
    }
}
