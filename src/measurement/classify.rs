//! 标本分类规则 (占位实现)
//!
//! 目前只有按体长阈值打 "unknown" 标签的简单规则, 以 trait 形式注入,
//! 将来的分类模型实现同一接口即可替换

/// 标本尺寸 (毫米)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpecimenDimensions {
    pub length_mm: f64,
    pub width_mm: f64,
    pub area_mm2: f64,
}

impl SpecimenDimensions {
    /// 由像素尺寸换算; 面积按矩形近似 (体长 × 体宽)
    pub fn from_pixels(length_px: f64, width_px: f64, mm_per_pixel: f64) -> Self {
        let length_mm = length_px * mm_per_pixel;
        let width_mm = width_px * mm_per_pixel;
        Self {
            length_mm,
            width_mm,
            area_mm2: length_mm * width_mm,
        }
    }
}

/// 分类接口: 标本 → 可选标签
pub trait SpecimenClassifier {
    fn classify(&self, dims: &SpecimenDimensions) -> Option<String>;
}

/// 任意闭包都可作为分类器
impl<F> SpecimenClassifier for F
where
    F: Fn(&SpecimenDimensions) -> Option<String>,
{
    fn classify(&self, dims: &SpecimenDimensions) -> Option<String> {
        self(dims)
    }
}

/// 体长阈值规则: 体长 > 阈值 时标记为 `label`
#[derive(Debug, Clone)]
pub struct LengthThresholdClassifier {
    pub threshold_mm: f64,
    pub label: String,
}

impl Default for LengthThresholdClassifier {
    fn default() -> Self {
        Self::new(35.0)
    }
}

impl LengthThresholdClassifier {
    pub fn new(threshold_mm: f64) -> Self {
        Self {
            threshold_mm,
            label: "unknown".to_string(),
        }
    }
}

impl SpecimenClassifier for LengthThresholdClassifier {
    fn classify(&self, dims: &SpecimenDimensions) -> Option<String> {
        (dims.length_mm > self.threshold_mm).then(|| self.label.clone())
    }
}
