// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 分析配置参数
pub mod detection; // 区域检测与一致性匹配
pub mod measurement; // 形态测量
pub mod session; // 会话分析与处理
pub mod storage; // CSV 持久化
pub mod visualize; // 结果可视化

pub use crate::config::{AnalyzerConfig, Args};
pub use crate::detection::{ConsistencyMatcher, DetectedRegion, RegionDetector};
pub use crate::measurement::{MeasurementRecord, MorphometricMeasurer};
pub use crate::session::{Processor, SessionAnalyzer, SessionOutcome};

/// 四舍五入到指定小数位
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-0.125, 1), -0.1);
    }
}
