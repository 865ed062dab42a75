//! 过期会话清理
//!
//! 日期命名的会话目录超过保留天数后整体删除; 非日期目录不处理,
//! 单个目录删除失败只记录告警

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{info, warn};

use super::frames::parse_session_date;

/// 删除超过保留天数的会话目录, 返回已删除的目录名
pub fn cleanup_old_sessions(
    images_dir: &Path,
    now: NaiveDateTime,
    retention_days: i64,
) -> Result<Vec<String>> {
    if !images_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    let entries = fs::read_dir(images_dir)
        .with_context(|| format!("无法读取目录 {}", images_dir.display()))?;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("⚠️  读取目录项失败: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(date) = parse_session_date(&name) else {
            continue;
        };

        // 按整天计算目录年龄
        let age_days = now.signed_duration_since(date.and_time(Default::default())).num_days();
        if age_days <= retention_days {
            continue;
        }

        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!("🗑️  已删除过期会话 {} ({} 天前)", name, age_days);
                removed.push(name);
            }
            Err(e) => warn!("⚠️  删除 {} 失败: {}", path.display(), e),
        }
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn temp_base() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mothtrap-cleanup-{}", rand::random::<u64>()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 20)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_removes_only_expired_date_dirs() {
        let base = temp_base();
        for name in ["2024-07-01", "2024-07-12", "2024-07-13", "2024-07-19", "keep_me"] {
            fs::create_dir_all(base.join(name).join("red_light")).unwrap();
        }
        fs::write(base.join("2024-07-02"), b"file, not a session").unwrap();

        let removed = cleanup_old_sessions(&base, now(), 7).unwrap();
        // 07-12 为 8 天前, 07-13 恰好 7 天保留
        assert_eq!(removed, ["2024-07-01", "2024-07-12"]);
        assert!(base.join("2024-07-13").exists());
        assert!(base.join("2024-07-19").exists());
        assert!(base.join("keep_me").exists());
        assert!(base.join("2024-07-02").exists());
        fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn test_missing_base_is_noop() {
        let base = std::env::temp_dir().join(format!("mothtrap-absent-{}", rand::random::<u64>()));
        assert!(cleanup_old_sessions(&base, now(), 7).unwrap().is_empty());
    }
}
