/// 测量记录 (对应 moth_measurements.csv 的一行)
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::classify::SpecimenDimensions;
use crate::detection::DetectedRegion;
use crate::round_to;

/// CSV 列顺序 (仪表盘依赖, 不可更改)
pub const MEASUREMENT_COLUMNS: [&str; 10] = [
    "moth_id",
    "date",
    "timestamp",
    "position_x",
    "position_y",
    "length_mm",
    "width_mm",
    "area_mm2",
    "species",
    "source_image",
];

/// 时间戳格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub moth_id: u32,          // 会话内编号, 从1开始
    pub date: String,          // YYYY-MM-DD
    pub timestamp: String,     // YYYY-MM-DD HH:MM:SS
    pub position_x: u32,
    pub position_y: u32,
    pub length_mm: f64,
    pub width_mm: f64,
    pub area_mm2: f64,
    pub species: Option<String>, // 空值表示未分类
    pub source_image: String,
}

impl MeasurementRecord {
    /// 由晋升区域和测量结果构建记录, 数值保留两位小数
    pub fn new(
        moth_id: u32,
        date: NaiveDate,
        captured_at: NaiveTime,
        region: &DetectedRegion,
        dims: &SpecimenDimensions,
        species: Option<String>,
    ) -> Self {
        let timestamp = NaiveDateTime::new(date, captured_at);
        Self {
            moth_id,
            date: date.format("%Y-%m-%d").to_string(),
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            position_x: region.x,
            position_y: region.y,
            length_mm: round_to(dims.length_mm, 2),
            width_mm: round_to(dims.width_mm, 2),
            area_mm2: round_to(dims.area_mm2, 2),
            species,
            source_image: region.source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fields() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let time = NaiveTime::from_hms_opt(22, 15, 30).unwrap();
        let region = DetectedRegion::new(120, 80, 30, 40, "22-15-30.jpg");
        let dims = SpecimenDimensions::from_pixels(500.0, 123.0, 0.0703);

        let record = MeasurementRecord::new(1, date, time, &region, &dims, None);
        assert_eq!(record.date, "2024-07-01");
        assert_eq!(record.timestamp, "2024-07-01 22:15:30");
        assert_eq!((record.position_x, record.position_y), (120, 80));
        assert_eq!(record.length_mm, 35.15);
        assert_eq!(record.width_mm, 8.65);
        // 面积由未取整的尺寸计算后再取整
        assert_eq!(record.area_mm2, 303.94);
        assert_eq!(record.source_image, "22-15-30.jpg");
    }
}
