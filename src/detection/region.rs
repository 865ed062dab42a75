//! 区域检测器 (Region Detector)
//!
//! 单帧无监督分割, 按尺寸/宽高比/填充率过滤轮廓, 输出候选矩形

use std::path::Path;

use anyhow::{ensure, Result};
use image::{DynamicImage, GrayImage};
use imageproc::contours::Contour;
use imageproc::geometry::contour_area;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::segmentation::{bounding_rect, SegmentationParams};
use super::types::DetectedRegion;

/// 检测参数 (标定 + 过滤条件)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub mm_per_pixel: f64,     // 检测标定系数 (毫米/像素)
    pub min_size_mm: f64,      // 最小标本尺寸
    pub max_size_mm: f64,      // 最大标本尺寸
    pub min_aspect_ratio: f64, // 外接矩形宽高比下限 (不含)
    pub max_aspect_ratio: f64, // 外接矩形宽高比上限 (不含)
    pub min_fill_ratio: f64,   // 轮廓面积 / 外接矩形面积 下限 (不含)
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mm_per_pixel: 0.2033,
            min_size_mm: 10.0,
            max_size_mm: 70.0,
            min_aspect_ratio: 0.5,
            max_aspect_ratio: 2.0,
            min_fill_ratio: 0.3,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.mm_per_pixel.is_finite() && self.mm_per_pixel > 0.0,
            "mm_per_pixel must be positive, got {}",
            self.mm_per_pixel
        );
        ensure!(
            self.min_size_mm >= 0.0 && self.min_size_mm < self.max_size_mm,
            "specimen size bounds inverted: min {} mm, max {} mm",
            self.min_size_mm,
            self.max_size_mm
        );
        ensure!(
            self.min_aspect_ratio < self.max_aspect_ratio,
            "aspect ratio bounds inverted: {} .. {}",
            self.min_aspect_ratio,
            self.max_aspect_ratio
        );
        Ok(())
    }

    /// 轮廓面积下限 (像素²)
    pub fn min_area(&self) -> f64 {
        (self.min_size_mm / self.mm_per_pixel).powi(2)
    }

    /// 轮廓面积上限 (像素²)
    pub fn max_area(&self) -> f64 {
        (self.max_size_mm / self.mm_per_pixel).powi(2)
    }
}

/// 区域检测器
#[derive(Clone, Debug)]
pub struct RegionDetector {
    config: DetectorConfig,
    params: SegmentationParams,
}

impl RegionDetector {
    /// 创建检测器, 参数非法时立即拒绝
    pub fn new(config: DetectorConfig, params: SegmentationParams) -> Result<Self> {
        config.validate()?;
        params.validate()?;
        Ok(Self { config, params })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// 从文件检测; 图片无法读取时记录日志并返回空列表
    pub fn detect_path(&self, path: &Path) -> Vec<DetectedRegion> {
        match image::open(path) {
            Ok(img) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.detect(&img, &name)
            }
            Err(e) => {
                warn!("⚠️  无法读取图片 {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn detect(&self, image: &DynamicImage, source: &str) -> Vec<DetectedRegion> {
        self.detect_gray(&image.to_luma8(), source)
    }

    /// 在灰度图上检测候选区域, 顺序与轮廓扫描顺序一致
    pub fn detect_gray(&self, gray: &GrayImage, source: &str) -> Vec<DetectedRegion> {
        let contours = self.params.external_contours(gray);
        let source: std::sync::Arc<str> = source.into();

        let regions: Vec<DetectedRegion> = contours
            .iter()
            .filter_map(|c| self.accept(c))
            .map(|(x, y, w, h)| DetectedRegion::new(x, y, w, h, source.clone()))
            .collect();

        debug!(
            "{}: {} 个轮廓, {} 个候选区域",
            source,
            contours.len(),
            regions.len()
        );
        regions
    }

    /// 轮廓过滤: 面积 → 宽高比 → 填充率
    fn accept(&self, contour: &Contour<i32>) -> Option<(u32, u32, u32, u32)> {
        let area = contour_area(&contour.points);
        if !(self.config.min_area() < area && area < self.config.max_area()) {
            return None;
        }

        let (x, y, w, h) = bounding_rect(&contour.points)?;
        let aspect_ratio = w as f64 / h as f64;
        let fill_ratio = area / (w as f64 * h as f64);

        let aspect_ok =
            self.config.min_aspect_ratio < aspect_ratio && aspect_ratio < self.config.max_aspect_ratio;
        if aspect_ok && fill_ratio > self.config.min_fill_ratio {
            Some((x, y, w, h))
        } else {
            None
        }
    }
}
