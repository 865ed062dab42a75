//! 结果可视化
//!
//! - 一致性检测图: 单帧红色, 两帧橙色, 三帧绿色
//! - 测量图: 以裁剪图中心绘制体长 × 体宽旋转框, 左下角标注毫米尺寸与角度

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::{info, warn};

use crate::detection::{DetectedRegion, MatchOutcome, Persistence};
use crate::measurement::{CaliperMeasurement, SpecimenDimensions};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// 未配置字体时依次尝试的系统字体
const FALLBACK_FONTS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const LABEL_SCALE: f32 = 14.0;
const LABEL_MARGIN: i32 = 10;
const LABEL_SPACING: i32 = 25;

/// 加载标注字体; 找不到可用字体时返回 None, 测量图只画框
pub fn load_font(configured: Option<&Path>) -> Option<FontVec> {
    let candidates: Vec<PathBuf> = match configured {
        Some(path) => vec![path.to_path_buf()],
        None => FALLBACK_FONTS.iter().map(PathBuf::from).collect(),
    };
    for path in &candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                info!("✅ 标注字体: {}", path.display());
                return Some(font);
            }
            Err(e) => warn!("⚠️  字体 {} 无法解析: {}", path.display(), e),
        }
    }
    warn!("⚠️  未找到标注字体, 测量图不含文字");
    None
}

fn persistence_color(persistence: Persistence) -> Rgb<u8> {
    match persistence {
        Persistence::SeenInOne => RED,
        Persistence::SeenInTwo => ORANGE,
        Persistence::SeenInThree => GREEN,
    }
}

/// 绘制 2 像素宽的矩形框
fn draw_region(canvas: &mut RgbImage, region: &DetectedRegion, color: Rgb<u8>) {
    if region.width == 0 || region.height == 0 {
        return;
    }
    let (x, y) = (region.x as i32, region.y as i32);
    draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(region.width, region.height), color);
    if region.width > 2 && region.height > 2 {
        let inner = Rect::at(x + 1, y + 1).of_size(region.width - 2, region.height - 2);
        draw_hollow_rect_mut(canvas, inner, color);
    }
}

/// 按持续性分类着色绘制所有检测区域, 三帧一致的最后绘制
pub fn draw_consistency(base: &RgbImage, outcome: &MatchOutcome) -> RgbImage {
    let mut canvas = base.clone();
    let groups = outcome
        .seen_in_one
        .iter()
        .chain(&outcome.seen_in_two)
        .chain(&outcome.seen_in_three);
    for group in groups {
        draw_region(&mut canvas, group.representative(), persistence_color(group.persistence));
    }
    canvas
}

/// 旋转框四个角点 (中心, 长, 宽, 角度制)
pub fn rotated_box(center: (f32, f32), length: f32, width: f32, angle_deg: f32) -> [(f32, f32); 4] {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let (hl, hw) = (length / 2.0, width / 2.0);
    let corner = |a: f32, b: f32| {
        (
            center.0 + a * hl * cos - b * hw * sin,
            center.1 + a * hl * sin + b * hw * cos,
        )
    };
    [corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0)]
}

/// 标注文字, 自下而上: 体长, 体宽, 角度
pub fn measurement_labels(measurement: &CaliperMeasurement, dims: &SpecimenDimensions) -> [String; 3] {
    [
        format!("Length: {:.1}mm", dims.length_mm),
        format!("Width: {:.1}mm", dims.width_mm),
        format!("Angle: {:.1}°", measurement.angle_deg),
    ]
}

/// 在裁剪图上绘制测量框和尺寸标注
pub fn draw_measurement(
    roi: &RgbImage,
    measurement: &CaliperMeasurement,
    dims: &SpecimenDimensions,
    font: Option<&FontVec>,
) -> RgbImage {
    let mut canvas = roi.clone();
    if measurement.is_empty() {
        return canvas;
    }
    let center = (roi.width() as f32 / 2.0, roi.height() as f32 / 2.0);
    let corners = rotated_box(
        center,
        measurement.length_px as f32,
        measurement.width_px as f32,
        measurement.angle_deg as f32,
    );
    for i in 0..4 {
        draw_line_segment_mut(&mut canvas, corners[i], corners[(i + 1) % 4], GREEN);
    }

    if let Some(font) = font {
        let scale = PxScale::from(LABEL_SCALE);
        let bottom = roi.height() as i32 - LABEL_MARGIN - LABEL_SCALE as i32;
        for (i, label) in measurement_labels(measurement, dims).iter().enumerate() {
            let y = bottom - i as i32 * LABEL_SPACING;
            draw_text_mut(&mut canvas, GREEN, LABEL_MARGIN, y, scale, font, label);
        }
    }
    canvas
}
