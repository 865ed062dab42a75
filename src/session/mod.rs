/// 会话系统 (Session System)
///
/// 一个会话 = 某日期目录下的诱集阶段 + 驱离阶段帧序列
/// - Frames:    目录与帧文件解析
/// - Departure: 驱离阶段离开追踪
/// - Analyzer:  会话分析编排
/// - Cleanup:   过期会话清理
/// - Processor: 处理入口与数据发布
pub mod analyzer;
pub mod cleanup;
pub mod departure;
pub mod frames;
pub mod processor;

pub use analyzer::{SessionAnalyzer, SessionOutcome, SessionReport};
pub use cleanup::cleanup_old_sessions;
pub use departure::{DepartureObservation, DepartureTracker, DEPARTURE_COLUMNS};
pub use frames::{find_latest_session, list_frames, Frame, FrameFile, SessionDirs};
pub use processor::Processor;
