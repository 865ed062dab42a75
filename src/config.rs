//! 分析配置 - 命令行参数 + JSON 配置文件

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::detection::types::DEFAULT_MATCH_THRESHOLD_PX;
use crate::detection::{DetectorConfig, SegmentationParams};

/// 默认测量标定系数 (毫米/像素)
pub const DEFAULT_MEASURE_MM_PER_PIXEL: f64 = 0.0703;

/// 默认会话保留天数
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "诱虫灯会话分析 - 标本测量与离开统计", long_about = None)]
pub struct Args {
    /// 图片根目录 (包含 YYYY-MM-DD 会话目录)
    #[arg(short, long)]
    pub base_dir: Option<PathBuf>,

    /// 数据输出目录 (仪表盘读取的 CSV)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// 指定分析日期 YYYY-MM-DD, 默认最新会话
    #[arg(short, long)]
    pub date: Option<String>,

    /// 测量标定系数 (毫米/像素)
    #[arg(short, long)]
    pub mm_per_pixel: Option<f64>,

    /// JSON 配置文件路径
    #[arg(short, long, default_value = "mothtrap.json")]
    pub config: PathBuf,

    /// 不清理过期会话目录
    #[arg(long, default_value_t = false)]
    pub no_cleanup: bool,

    /// 会话目录保留天数
    #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
    pub retention_days: i64,

    /// 不输出可视化图片
    #[arg(long, default_value_t = false)]
    pub no_visuals: bool,
}

impl Args {
    /// 图片根目录, 默认 ~/Documents/collecting_data/moths/images
    pub fn images_dir(&self) -> PathBuf {
        self.base_dir
            .clone()
            .unwrap_or_else(|| documents_dir().join("collecting_data/moths/images"))
    }

    /// 数据目录, 默认 ~/Documents/app/data
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| documents_dir().join("app/data"))
    }
}

fn documents_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Documents")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 分析参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    // === 检测参数 ===
    pub detector: DetectorConfig,         // 检测标定与过滤条件
    pub segmentation: SegmentationParams, // 分割流水线参数

    // === 匹配参数 ===
    pub match_threshold_px: f32, // 三帧中心距离阈值

    // === 测量参数 ===
    pub measure_mm_per_pixel: f64,        // 测量标定系数
    pub classification_threshold_mm: f64, // 体长超过该值标记 unknown

    // === 输出 ===
    pub write_visuals: bool,         // 输出可视化与裁剪图片
    pub font_path: Option<PathBuf>, // 标注字体, 为空时尝试系统字体
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            segmentation: SegmentationParams::default(),
            match_threshold_px: DEFAULT_MATCH_THRESHOLD_PX,
            measure_mm_per_pixel: DEFAULT_MEASURE_MM_PER_PIXEL,
            classification_threshold_mm: 35.0,
            write_visuals: true,
            font_path: None,
        }
    }
}

impl AnalyzerConfig {
    /// 读取 JSON 配置; 文件不存在时写出一份默认配置
    ///
    /// 文件存在但无法解析 (类型错误, 语法错误) 时返回错误, 不回退到默认值
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            match config.save(path) {
                Ok(()) => info!("📝 已生成默认配置 {}", path.display()),
                Err(e) => warn!("⚠️  默认配置未写出: {:#}", e),
            }
            return Ok(config);
        }

        let json = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置 {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("配置 {} 解析失败", path.display()))?;
        info!("✅ 配置已从 {} 加载", path.display());
        Ok(config)
    }

    /// 以缩进 JSON 写出配置
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("无法写入配置 {}", path.display()))
    }

    /// 命令行参数覆盖文件配置
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(mm_per_pixel) = args.mm_per_pixel {
            self.measure_mm_per_pixel = mm_per_pixel;
        }
        if args.no_visuals {
            self.write_visuals = false;
        }
    }

    /// 参数校验, 必须在任何检测之前执行
    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        self.segmentation.validate()?;
        ensure!(
            self.match_threshold_px > 0.0,
            "match_threshold_px must be positive, got {}",
            self.match_threshold_px
        );
        ensure!(
            self.measure_mm_per_pixel.is_finite() && self.measure_mm_per_pixel > 0.0,
            "measure_mm_per_pixel must be positive, got {}",
            self.measure_mm_per_pixel
        );
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前分析配置:");
        info!(
            "  检测标定: {:.4} mm/px, 尺寸 {}-{} mm",
            self.detector.mm_per_pixel, self.detector.min_size_mm, self.detector.max_size_mm
        );
        info!("  匹配距离阈值: {:.1} px", self.match_threshold_px);
        info!("  测量标定: {:.4} mm/px", self.measure_mm_per_pixel);
        info!("  分类阈值: {:.1} mm", self.classification_threshold_mm);
    }
}
