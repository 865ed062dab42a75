/// 测量系统 (Measurement System)
///
/// - Caliper:  凸包卡尺测量 (体长/体宽/朝向)
/// - Classify: 可替换的分类规则
/// - Record:   测量记录
pub mod caliper;
pub mod classify;
pub mod record;

pub use caliper::{CaliperMeasurement, MorphometricMeasurer};
pub use classify::{LengthThresholdClassifier, SpecimenClassifier, SpecimenDimensions};
pub use record::{MeasurementRecord, MEASUREMENT_COLUMNS};
