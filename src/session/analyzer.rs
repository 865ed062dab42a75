//! 会话分析器 (Session Analyzer)
//!
//! 流程:
//! 1. 校验阶段目录与帧数 (诱集 ≥ 3, 驱离 ≥ 1)
//! 2. 诱集阶段最后三帧 → 区域检测 → 三帧一致性匹配 → 裁剪 → 卡尺测量
//! 3. 驱离阶段全部帧按时间顺序 → 区域检测 → 离开追踪
//! 4. 全部完成后才写出会话结果, 任一输入错误则整个会话中止

use std::fs;
use std::path::Path;

use ab_glyph::FontVec;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use image::{imageops, RgbImage};
use log::{error, info, warn};

use super::departure::{DepartureObservation, DepartureTracker, DEPARTURE_COLUMNS};
use super::frames::{list_frames, Frame, FrameFile, SessionDirs};
use crate::config::AnalyzerConfig;
use crate::detection::{ConsistencyMatcher, DetectedRegion, MatchOutcome, Phase, RegionDetector};
use crate::measurement::{
    LengthThresholdClassifier, MeasurementRecord, MorphometricMeasurer, SpecimenClassifier,
    SpecimenDimensions, MEASUREMENT_COLUMNS,
};
use crate::storage::{write_rows, DEPARTURES_FILE, MEASUREMENTS_FILE};
use crate::visualize;

/// 一致性匹配所用的诱集帧数
pub const CONSISTENCY_FRAMES: usize = 3;

/// 会话分析结果
pub enum SessionOutcome {
    Completed(SessionReport),
    Aborted { date: String, reason: String },
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&SessionReport> {
        match self {
            SessionOutcome::Completed(report) => Some(report),
            SessionOutcome::Aborted { .. } => None,
        }
    }
}

/// 会话报告 (内存中, 调用 persist 后落盘)
pub struct SessionReport {
    pub date: String,
    pub base_image: String,
    pub seen_in_one: usize,
    pub seen_in_two: usize,
    pub seen_in_three: usize,
    pub initial_deterrent_count: usize,
    pub measurements: Vec<MeasurementRecord>,
    pub departures: Vec<DepartureObservation>,
    pub images: Vec<(String, RgbImage)>, // 可视化与裁剪图片 (文件名, 图像)
}

impl SessionReport {
    /// 写出会话结果到 analysis 目录
    ///
    /// 先写入同级的 `analysis.partial`, 全部成功后整体替换 analysis 目录;
    /// 任何一步失败都不留下部分结果
    pub fn persist(&self, analysis_dir: &Path) -> Result<()> {
        let staging = analysis_dir.with_extension("partial");
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("无法清理 {}", staging.display()))?;
        }

        if let Err(e) = self.write_all(&staging) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!("⚠️  清理 {} 失败: {}", staging.display(), cleanup);
            }
            return Err(e);
        }

        if analysis_dir.exists() {
            fs::remove_dir_all(analysis_dir)
                .with_context(|| format!("无法替换 {}", analysis_dir.display()))?;
        }
        fs::rename(&staging, analysis_dir)
            .with_context(|| format!("无法重命名 {}", staging.display()))?;
        info!("💾 会话结果已保存到 {}", analysis_dir.display());
        Ok(())
    }

    fn write_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("无法创建目录 {}", dir.display()))?;
        write_rows(&dir.join(MEASUREMENTS_FILE), &MEASUREMENT_COLUMNS, &self.measurements)?;
        write_rows(&dir.join(DEPARTURES_FILE), &DEPARTURE_COLUMNS, &self.departures)?;
        for (name, image) in &self.images {
            let path = dir.join(name);
            image
                .save(&path)
                .with_context(|| format!("无法保存图片 {}", path.display()))?;
        }
        Ok(())
    }
}

/// 会话分析器
pub struct SessionAnalyzer {
    config: AnalyzerConfig,
    detector: RegionDetector,
    matcher: ConsistencyMatcher,
    measurer: MorphometricMeasurer,
    classifier: Box<dyn SpecimenClassifier>,
    font: Option<FontVec>, // 测量图标注字体
}

impl SessionAnalyzer {
    /// 创建分析器, 配置非法时在任何检测之前拒绝
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let detector = RegionDetector::new(config.detector.clone(), config.segmentation.clone())?;
        let matcher = ConsistencyMatcher::new(config.match_threshold_px);
        let measurer = MorphometricMeasurer::new(config.segmentation.clone());
        let classifier = Box::new(LengthThresholdClassifier::new(
            config.classification_threshold_mm,
        ));
        let font = if config.write_visuals {
            visualize::load_font(config.font_path.as_deref())
        } else {
            None
        };
        Ok(Self {
            config,
            detector,
            matcher,
            measurer,
            classifier,
            font,
        })
    }

    /// 替换分类规则
    pub fn with_classifier(mut self, classifier: impl SpecimenClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// 分析并保存一个会话; 输入错误时中止且不写任何文件
    pub fn run(&self, base: &Path, date: NaiveDate) -> SessionOutcome {
        let dirs = SessionDirs::new(base, date);
        info!("=== 开始分析会话 {} ===", dirs.date_str());

        let result = self
            .analyze(&dirs)
            .and_then(|report| report.persist(&dirs.analysis).map(|_| report));

        match result {
            Ok(report) => {
                info!(
                    "✅ 会话 {} 完成: {} 个标本, 驱离开始时 {} 只, {} 次离开事件",
                    report.date,
                    report.measurements.len(),
                    report.initial_deterrent_count,
                    report.departures.len()
                );
                SessionOutcome::Completed(report)
            }
            Err(e) => {
                error!("❌ 会话 {} 分析中止: {:#}", dirs.date_str(), e);
                SessionOutcome::Aborted {
                    date: dirs.date_str(),
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    /// 校验输入: 阶段目录存在且帧数足够
    pub fn validate_inputs(&self, dirs: &SessionDirs) -> Result<(Vec<FrameFile>, Vec<FrameFile>)> {
        for phase in [Phase::Attractive, Phase::Deterrent] {
            let dir = dirs.phase_dir(phase);
            if !dir.is_dir() {
                bail!("阶段目录不存在: {}", dir.display());
            }
        }

        let attractive = list_frames(&dirs.attractive, Phase::Attractive)?;
        if attractive.len() < CONSISTENCY_FRAMES {
            bail!(
                "诱集阶段至少需要 {} 张图片, 实际 {}",
                CONSISTENCY_FRAMES,
                attractive.len()
            );
        }
        let deterrent = list_frames(&dirs.deterrent, Phase::Deterrent)?;
        if deterrent.is_empty() {
            bail!("驱离阶段没有图片");
        }

        info!(
            "📂 诱集阶段 {} 张, 驱离阶段 {} 张",
            attractive.len(),
            deterrent.len()
        );
        Ok((attractive, deterrent))
    }

    /// 分析会话 (只读, 不写文件)
    pub fn analyze(&self, dirs: &SessionDirs) -> Result<SessionReport> {
        let (attractive, deterrent) = self.validate_inputs(dirs)?;

        // 诱集阶段: 只取最后三帧, 先全部解码再检测
        let last_three = &attractive[attractive.len() - CONSISTENCY_FRAMES..];
        let frames = last_three
            .iter()
            .map(FrameFile::load)
            .collect::<Result<Vec<Frame>>>()?;
        info!(
            "🔍 一致性分析帧: {}",
            frames.iter().map(|f| f.file.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        let detections: Vec<Vec<DetectedRegion>> = frames
            .iter()
            .map(|f| self.detector.detect(&f.image, &f.file.name))
            .collect();
        let outcome = self
            .matcher
            .classify(&detections[0], &detections[1], &detections[2]);
        let (one, two, three) = outcome.summary();
        info!("🦋 三帧一致 {} 个 (两帧 {}, 单帧 {})", three, two, one);

        let mut images = Vec::new();
        if self.config.write_visuals {
            images.push((
                "consistent_detections.jpg".to_string(),
                visualize::draw_consistency(&frames[0].image.to_rgb8(), &outcome),
            ));
        }

        let base = &frames[CONSISTENCY_FRAMES - 1];
        let measurements = self.measure_specimens(dirs.date, base, &outcome, &mut images);

        // 驱离阶段
        let (initial_count, departures) = self.track_departures(&dirs.date_str(), &deterrent)?;

        Ok(SessionReport {
            date: dirs.date_str(),
            base_image: base.file.name.clone(),
            seen_in_one: one,
            seen_in_two: two,
            seen_in_three: three,
            initial_deterrent_count: initial_count,
            measurements,
            departures,
            images,
        })
    }

    /// 对三帧一致的区域裁剪并测量, 编号从1开始
    fn measure_specimens(
        &self,
        date: NaiveDate,
        base: &Frame,
        outcome: &MatchOutcome,
        images: &mut Vec<(String, RgbImage)>,
    ) -> Vec<MeasurementRecord> {
        let gray = base.image.to_luma8();
        let rgb = self.config.write_visuals.then(|| base.image.to_rgb8());

        let mut records = Vec::new();
        for (i, region) in outcome.promoted().into_iter().enumerate() {
            let moth_id = i as u32 + 1;
            let roi = imageops::crop_imm(&gray, region.x, region.y, region.width, region.height)
                .to_image();
            let measurement = self.measurer.measure(&roi);
            let dims = SpecimenDimensions::from_pixels(
                measurement.length_px,
                measurement.width_px,
                self.config.measure_mm_per_pixel,
            );
            let species = self.classifier.classify(&dims);

            info!(
                "  标本 {}: 体长 {:.1} mm, 体宽 {:.1} mm, 角度 {:.1}°",
                moth_id, dims.length_mm, dims.width_mm, measurement.angle_deg
            );

            if let Some(rgb) = &rgb {
                let roi_rgb =
                    imageops::crop_imm(rgb, region.x, region.y, region.width, region.height)
                        .to_image();
                images.push((
                    format!("moth_{}_measurements.jpg", moth_id),
                    visualize::draw_measurement(&roi_rgb, &measurement, &dims, self.font.as_ref()),
                ));
                images.push((
                    format!("moth_{}_at_{}.jpg", moth_id, base.file.stem()),
                    roi_rgb,
                ));
            }

            records.push(MeasurementRecord::new(
                moth_id,
                date,
                base.file.captured_at,
                region,
                &dims,
                species,
            ));
        }
        records
    }

    /// 驱离阶段逐帧计数, 返回 (初始数量, 离开事件)
    fn track_departures(
        &self,
        date: &str,
        frames: &[FrameFile],
    ) -> Result<(usize, Vec<DepartureObservation>)> {
        let mut tracker = DepartureTracker::new(date);
        for file in frames {
            let frame = file.load()?;
            let count = self.detector.detect(&frame.image, &file.name).len();
            if let Some(obs) = tracker.observe(&file.name, file.captured_at, count) {
                info!(
                    "🚪 {:.1} 分钟: {} 只离开, 剩余 {}",
                    obs.time_since_red_minutes, obs.moths_departed, obs.moths_remaining
                );
            }
        }
        let initial = tracker.baseline().unwrap_or(0);
        Ok((initial, tracker.into_observations()))
    }
}
