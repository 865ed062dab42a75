/// 检测系统 (Detection System)
///
/// 单帧分割与跨帧一致性分析
/// - Region:   单帧候选区域检测
/// - Matcher:  三帧一致性匹配
pub mod clahe;
pub mod matcher;
pub mod region;
pub mod segmentation;
pub mod types;

pub use matcher::{ConsistencyMatcher, MatchOutcome};
pub use region::{DetectorConfig, RegionDetector};
pub use segmentation::SegmentationParams;
pub use types::{DetectedRegion, Persistence, Phase, SpecimenGroup};
