//! 会话目录与帧文件
//!
//! 目录结构: `<base>/<YYYY-MM-DD>/{attractive_light,red_light}/HH-MM-SS.jpg`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Timelike};
use image::DynamicImage;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::detection::Phase;

static FRAME_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})-(\d{2})-(\d{2})\.jpg$").expect("valid frame name pattern"));

static SESSION_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid session dir pattern"));

/// 分析结果子目录名
pub const ANALYSIS_DIR: &str = "analysis";

/// 从文件名解析拍摄时间 (`HH-MM-SS.jpg`)
pub fn parse_capture_time(name: &str) -> Option<NaiveTime> {
    let caps = FRAME_NAME.captures(name)?;
    let h = caps[1].parse().ok()?;
    let m = caps[2].parse().ok()?;
    let s = caps[3].parse().ok()?;
    NaiveTime::from_hms_opt(h, m, s)
}

/// 解析会话目录名 (`YYYY-MM-DD`)
pub fn parse_session_date(name: &str) -> Option<NaiveDate> {
    if !SESSION_DIR.is_match(name) {
        return None;
    }
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

/// 两个拍摄时间之间的分钟数, 跨午夜时按 24 小时回绕
pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> f64 {
    let mut seconds = end.signed_duration_since(start).num_seconds();
    if seconds < 0 {
        seconds += 24 * 60 * 60;
    }
    seconds as f64 / 60.0
}

/// 磁盘上的帧文件 (未解码)
#[derive(Clone, Debug, PartialEq)]
pub struct FrameFile {
    pub name: String,
    pub path: PathBuf,
    pub captured_at: NaiveTime,
    pub phase: Phase,
}

impl FrameFile {
    pub fn parse(path: &Path, phase: Phase) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let captured_at = parse_capture_time(&name)?;
        Some(Self {
            name,
            path: path.to_path_buf(),
            captured_at,
            phase,
        })
    }

    /// 去掉扩展名的文件名 (HH-MM-SS)
    pub fn stem(&self) -> &str {
        self.name.trim_end_matches(".jpg")
    }

    /// 解码为帧
    pub fn load(&self) -> Result<Frame> {
        let image = image::open(&self.path)
            .with_context(|| format!("无法读取图片 {}", self.path.display()))?;
        Ok(Frame {
            file: self.clone(),
            image,
        })
    }
}

/// 已解码帧: 图像 + 拍摄时间 + 阶段
#[derive(Clone, Debug)]
pub struct Frame {
    pub file: FrameFile,
    pub image: DynamicImage,
}

/// 列出阶段目录中的帧, 按文件名 (即拍摄时间) 排序
///
/// 只接受 `.jpg`; 文件名不符合 `HH-MM-SS` 的跳过并告警
pub fn list_frames(dir: &Path, phase: Phase) -> Result<Vec<FrameFile>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("无法读取目录 {}", dir.display()))? {
        let path = entry?.path();
        let is_jpg = path.extension().map(|e| e == "jpg").unwrap_or(false);
        if !is_jpg || !path.is_file() {
            continue;
        }
        match FrameFile::parse(&path, phase) {
            Some(frame) => frames.push(frame),
            None => warn!("⚠️  跳过无法解析时间的图片: {}", path.display()),
        }
    }
    frames.sort_by(|a, b| a.name.cmp(&b.name));
    order_across_midnight(&mut frames);
    Ok(frames)
}

/// 跨午夜的阶段按拍摄顺序重排
///
/// 输入已按 `HH-MM-SS` 排序. 阶段时长远小于 12 小时, 因此环形时间轴上
/// 最大的间隔就是阶段开始前的空档; 若它不是 "末帧 → 次日首帧" 这一段,
/// 说明序列跨过了午夜, 从最大间隔之后的那一帧开始轮转
pub fn order_across_midnight(frames: &mut [FrameFile]) {
    if frames.len() < 2 {
        return;
    }
    let seconds: Vec<i64> = frames
        .iter()
        .map(|f| f.captured_at.num_seconds_from_midnight() as i64)
        .collect();
    let last = seconds.len() - 1;

    let mut largest_gap = seconds[0] + 24 * 60 * 60 - seconds[last];
    let mut start = 0;
    for i in 1..seconds.len() {
        let gap = seconds[i] - seconds[i - 1];
        if gap > largest_gap {
            largest_gap = gap;
            start = i;
        }
    }
    frames.rotate_left(start);
}

/// 单个会话的目录集合
#[derive(Clone, Debug)]
pub struct SessionDirs {
    pub date: NaiveDate,
    pub root: PathBuf,
    pub attractive: PathBuf,
    pub deterrent: PathBuf,
    pub analysis: PathBuf,
}

impl SessionDirs {
    pub fn new(base: &Path, date: NaiveDate) -> Self {
        let root = base.join(date.format("%Y-%m-%d").to_string());
        Self {
            date,
            attractive: root.join(Phase::Attractive.dir_name()),
            deterrent: root.join(Phase::Deterrent.dir_name()),
            analysis: root.join(ANALYSIS_DIR),
            root,
        }
    }

    pub fn date_str(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn phase_dir(&self, phase: Phase) -> &Path {
        match phase {
            Phase::Attractive => &self.attractive,
            Phase::Deterrent => &self.deterrent,
        }
    }
}

/// 列出基础目录下所有日期命名的会话目录 (升序)
pub fn list_sessions(base: &Path) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    for entry in fs::read_dir(base).with_context(|| format!("无法读取目录 {}", base.display()))? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(date) = entry.file_name().to_str().and_then(parse_session_date) {
            dates.push(date);
        }
    }
    dates.sort();
    Ok(dates)
}

/// 最新的会话日期
pub fn find_latest_session(base: &Path) -> Result<Option<NaiveDate>> {
    Ok(list_sessions(base)?.pop())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mothtrap-{}-{}", tag, rand::random::<u64>()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_capture_time() {
        assert_eq!(
            parse_capture_time("21-05-09.jpg"),
            NaiveTime::from_hms_opt(21, 5, 9)
        );
        assert_eq!(parse_capture_time("25-00-00.jpg"), None);
        assert_eq!(parse_capture_time("21-05-09.png"), None);
        assert_eq!(parse_capture_time("snapshot.jpg"), None);
    }

    #[test]
    fn test_parse_session_date() {
        assert_eq!(
            parse_session_date("2024-07-01"),
            NaiveDate::from_ymd_opt(2024, 7, 1)
        );
        assert_eq!(parse_session_date("2024-13-01"), None);
        assert_eq!(parse_session_date("analysis"), None);
    }

    #[test]
    fn test_minutes_between_wraps_midnight() {
        let t = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();
        assert_eq!(minutes_between(t(22, 0, 0), t(22, 2, 30)), 2.5);
        assert_eq!(minutes_between(t(23, 59, 0), t(0, 1, 0)), 2.0);
    }

    #[test]
    fn test_list_frames_sorted_and_filtered() {
        let dir = temp_dir("frames");
        for name in ["22-10-00.jpg", "22-00-00.jpg", "22-05-00.jpg", "notes.txt", "bad.jpg"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let frames = list_frames(&dir, Phase::Deterrent).unwrap();
        let names: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["22-00-00.jpg", "22-05-00.jpg", "22-10-00.jpg"]);
        assert_eq!(frames[0].stem(), "22-00-00");
        assert!(frames.iter().all(|f| f.phase == Phase::Deterrent));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_frames_crossing_midnight_keep_capture_order() {
        let dir = temp_dir("midnight");
        for name in ["00-03-00.jpg", "23-55-00.jpg", "23-58-00.jpg", "00-00-30.jpg"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let frames = list_frames(&dir, Phase::Deterrent).unwrap();
        let names: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["23-55-00.jpg", "23-58-00.jpg", "00-00-30.jpg", "00-03-00.jpg"]);
        assert_eq!(minutes_between(frames[0].captured_at, frames[3].captured_at), 8.0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_same_day_order_unchanged() {
        let dir = temp_dir("sameday");
        // 间隔不均匀但不跨午夜
        for name in ["20-00-00.jpg", "20-05-00.jpg", "23-00-00.jpg"] {
            fs::write(dir.join(name), b"").unwrap();
        }
        let frames = list_frames(&dir, Phase::Attractive).unwrap();
        assert_eq!(frames[0].name, "20-00-00.jpg");
        assert_eq!(frames[2].name, "23-00-00.jpg");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_find_latest_session() {
        let base = temp_dir("sessions");
        for name in ["2024-06-30", "2024-07-02", "2024-07-01", "misc"] {
            fs::create_dir_all(base.join(name)).unwrap();
        }
        assert_eq!(
            find_latest_session(&base).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 2)
        );
        fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn test_session_dirs_layout() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let dirs = SessionDirs::new(Path::new("/data/images"), date);
        assert_eq!(dirs.attractive, Path::new("/data/images/2024-07-01/attractive_light"));
        assert_eq!(dirs.deterrent, Path::new("/data/images/2024-07-01/red_light"));
        assert_eq!(dirs.analysis, Path::new("/data/images/2024-07-01/analysis"));
    }
}
