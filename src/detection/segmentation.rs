//! 前景分割流水线 (检测与测量共用)
//!
//! 灰度 → CLAHE → 高斯平滑 → 自适应阈值(0.7) + Otsu 全局阈值(0.3) → 闭运算 → 外轮廓

use anyhow::{ensure, Result};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, separable_filter_equal};
use imageproc::morphology::close;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use super::clahe;

/// 分割参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    pub clahe_clip_limit: f32,   // CLAHE 裁剪阈值
    pub clahe_grid: u32,         // CLAHE 分块数 (每个方向)
    pub blur_kernel_size: u32,   // 高斯平滑核尺寸 (奇数)
    pub adaptive_block_size: u32, // 自适应阈值邻域尺寸 (奇数)
    pub adaptive_constant: f32,  // 自适应阈值常数 C
    pub adaptive_weight: f32,    // 自适应阈值混合权重
    pub global_weight: f32,      // Otsu 阈值混合权重
    pub close_iterations: u8,    // 3x3 闭运算迭代次数
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.5,
            clahe_grid: 8,
            blur_kernel_size: 5,
            adaptive_block_size: 11,
            adaptive_constant: 2.0,
            adaptive_weight: 0.7,
            global_weight: 0.3,
            close_iterations: 2,
        }
    }
}

impl SegmentationParams {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.clahe_clip_limit >= 0.0,
            "clahe_clip_limit must be non-negative, got {}",
            self.clahe_clip_limit
        );
        ensure!(self.clahe_grid > 0, "clahe_grid must be positive");
        ensure!(
            self.blur_kernel_size % 2 == 1 && self.blur_kernel_size >= 3,
            "blur_kernel_size must be odd and >= 3, got {}",
            self.blur_kernel_size
        );
        ensure!(
            self.adaptive_block_size % 2 == 1 && self.adaptive_block_size >= 3,
            "adaptive_block_size must be odd and >= 3, got {}",
            self.adaptive_block_size
        );
        ensure!(
            self.adaptive_weight >= 0.0 && self.global_weight >= 0.0,
            "threshold blend weights must be non-negative"
        );
        ensure!(
            self.adaptive_weight + self.global_weight > 0.0,
            "threshold blend weights must not both be zero"
        );
        Ok(())
    }

    /// 生成前景掩码 (非零像素为前景)
    pub fn foreground_mask(&self, gray: &GrayImage) -> GrayImage {
        let enhanced = clahe::equalize(gray, self.clahe_clip_limit, self.clahe_grid);
        let blurred = gaussian_blur_f32(&enhanced, gaussian_sigma(self.blur_kernel_size));

        // 自适应阈值捕获小/低对比度目标, Otsu 捕获大/高对比度目标
        let adaptive = adaptive_threshold_inv(&blurred, self.adaptive_block_size, self.adaptive_constant);
        let global = threshold(&blurred, otsu_level(&blurred), ThresholdType::BinaryInverted);
        let combined = blend(&adaptive, &global, self.adaptive_weight, self.global_weight);

        if self.close_iterations == 0 {
            combined
        } else {
            close(&combined, Norm::LInf, self.close_iterations)
        }
    }

    /// 分割并提取外轮廓
    pub fn external_contours(&self, gray: &GrayImage) -> Vec<Contour<i32>> {
        external_contours(&self.foreground_mask(gray))
    }
}

/// 由核尺寸推导高斯 sigma (与 OpenCV sigma=0 时的约定一致)
pub fn gaussian_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// 高斯加权自适应阈值 (反向)
///
/// 像素值 <= 邻域加权均值 - C 时为前景, 边界按复制处理
pub fn adaptive_threshold_inv(gray: &GrayImage, block_size: u32, constant: f32) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    let kernel = gaussian_kernel(block_size, gaussian_sigma(block_size));
    let local_mean = separable_filter_equal(gray, &kernel);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as f32;
        if value <= local_mean.get_pixel(x, y)[0] as f32 - constant {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// 归一化一维高斯核
fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let radius = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// 加权混合两张二值图 (饱和取整)
pub fn blend(a: &GrayImage, b: &GrayImage, weight_a: f32, weight_b: f32) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let value = a.get_pixel(x, y)[0] as f32 * weight_a + b.get_pixel(x, y)[0] as f32 * weight_b;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// 提取最外层轮廓, 顺序为起点的光栅扫描顺序 (自上而下, 自左而右)
pub fn external_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect()
}

/// 轮廓外接矩形 (x, y, w, h), 像素包含端点
pub fn bounding_rect(points: &[Point<i32>]) -> Option<(u32, u32, u32, u32)> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some((
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
