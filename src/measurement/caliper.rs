//! 形态测量 (Morphometric Measurer)
//!
//! 最大轮廓 → 凸包 → 穷举凸包顶点对求最大距离 (体长与朝向)
//! → 全部轮廓点在垂直方向上的最大投影 (体宽)

use image::{DynamicImage, GrayImage};
use imageproc::geometry::{contour_area, convex_hull};
use imageproc::point::Point;

use crate::detection::segmentation::SegmentationParams;

/// 卡尺测量结果 (像素 / 角度制)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CaliperMeasurement {
    pub length_px: f64,
    pub width_px: f64,
    pub angle_deg: f64, // 体长方向与水平线夹角
}

impl CaliperMeasurement {
    /// 是否为退化结果 (未找到轮廓)
    pub fn is_empty(&self) -> bool {
        self.length_px == 0.0 && self.width_px == 0.0
    }
}

/// 形态测量器
#[derive(Clone, Debug, Default)]
pub struct MorphometricMeasurer {
    params: SegmentationParams,
}

impl MorphometricMeasurer {
    pub fn new(params: SegmentationParams) -> Self {
        Self { params }
    }

    pub fn measure_image(&self, roi: &DynamicImage) -> CaliperMeasurement {
        self.measure(&roi.to_luma8())
    }

    /// 测量裁剪区域; 无轮廓时返回全零
    pub fn measure(&self, roi: &GrayImage) -> CaliperMeasurement {
        if roi.width() == 0 || roi.height() == 0 {
            return CaliperMeasurement::default();
        }

        let contours = self.params.external_contours(roi);
        // 面积相同时保留先出现的轮廓
        let largest = contours.iter().fold(None, |best: Option<(f64, &Vec<Point<i32>>)>, c| {
            let area = contour_area(&c.points);
            match best {
                Some((best_area, _)) if best_area >= area => best,
                _ => Some((area, &c.points)),
            }
        });

        match largest {
            Some((_, points)) => caliper(points),
            None => CaliperMeasurement::default(),
        }
    }
}

/// 对轮廓点做卡尺测量
///
/// 凸包顶点两两比较, 严格大于才更新, 因此并列时保留先找到的点对
pub fn caliper(points: &[Point<i32>]) -> CaliperMeasurement {
    if points.is_empty() {
        return CaliperMeasurement::default();
    }
    let hull = convex_hull(points);

    let mut result = CaliperMeasurement::default();
    for i in 0..hull.len() {
        for j in (i + 1)..hull.len() {
            let (p1, p2) = (hull[i], hull[j]);
            let dx = (p2.x - p1.x) as f64;
            let dy = (p2.y - p1.y) as f64;
            let length = (dx * dx + dy * dy).sqrt();

            if length > result.length_px {
                result.length_px = length;
                result.angle_deg = dy.atan2(dx).to_degrees();

                // 垂直于体长方向的单位向量
                let (px, py) = (-dy / length, dx / length);
                result.width_px = points
                    .iter()
                    .map(|p| (((p.x - p1.x) as f64) * px + ((p.y - p1.y) as f64) * py).abs())
                    .fold(0.0, f64::max);
            }
        }
    }
    result
}
