//! CSV 持久化
//!
//! 列名与列顺序是仪表盘的外部契约; 表头显式写出, 空数据集也保留表头

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{de::DeserializeOwned, Serialize};

use crate::measurement::{MeasurementRecord, MEASUREMENT_COLUMNS};

/// 主数据集合并结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// 主文件不存在, 新建
    Created { rows: usize },
    /// 追加到已有主文件
    Appended { rows: usize, total: usize },
    /// 日期已存在, 未做任何修改
    SkippedDuplicateDate { date: String },
    /// 没有新记录
    NothingToMerge,
}

/// 写出 CSV (覆盖)
///
/// 先写同目录下的 `.tmp` 文件再重命名, 读取方不会看到半个文件
pub fn write_rows<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建目录 {}", parent.display()))?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let written = write_csv(&tmp, columns, rows)
        .and_then(|_| fs::rename(&tmp, path).with_context(|| format!("无法替换 {}", path.display())));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn write_csv<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("无法写入 {}", path.display()))?;
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// 读取 CSV
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("无法读取 {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.with_context(|| format!("{} 中存在无法解析的行", path.display()))?);
    }
    Ok(rows)
}

/// 合并新会话测量记录到主数据集
///
/// 任一新日期已在主文件中出现时不做修改 (可安全重复运行);
/// 否则拼接后按 (date, timestamp) 排序写回
pub fn merge_into_master(master: &Path, new_records: &[MeasurementRecord]) -> Result<MergeOutcome> {
    if new_records.is_empty() {
        return Ok(MergeOutcome::NothingToMerge);
    }

    let (mut records, existed) = if master.exists() {
        (read_rows::<MeasurementRecord>(master)?, true)
    } else {
        (Vec::new(), false)
    };

    let existing_dates: HashSet<&str> = records.iter().map(|r| r.date.as_str()).collect();
    if let Some(dup) = new_records
        .iter()
        .find(|r| existing_dates.contains(r.date.as_str()))
    {
        info!("ℹ️  日期 {} 已存在于主数据集, 跳过更新", dup.date);
        return Ok(MergeOutcome::SkippedDuplicateDate {
            date: dup.date.clone(),
        });
    }

    records.extend_from_slice(new_records);
    records.sort_by(|a, b| (&a.date, &a.timestamp).cmp(&(&b.date, &b.timestamp)));
    write_rows(master, &MEASUREMENT_COLUMNS, &records)?;
    info!("💾 主数据集已更新: {} ({} 行)", master.display(), records.len());

    Ok(if existed {
        MergeOutcome::Appended {
            rows: new_records.len(),
            total: records.len(),
        }
    } else {
        MergeOutcome::Created {
            rows: new_records.len(),
        }
    })
}
