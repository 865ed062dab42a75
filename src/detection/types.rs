/// 诱捕检测数据结构定义
/// Data structures for trap detection
use std::sync::Arc;

// ========== 公共常量 ==========

/// 三帧一致性匹配的默认中心距离阈值 (像素)
pub const DEFAULT_MATCH_THRESHOLD_PX: f32 = 20.0;

// ========== 枚举类型 ==========

/// 拍摄阶段 (诱集光 / 驱离红光)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Attractive,
    Deterrent,
}

impl Phase {
    /// 会话目录下对应的子目录名
    pub fn dir_name(&self) -> &'static str {
        match self {
            Phase::Attractive => "attractive_light",
            Phase::Deterrent => "red_light",
        }
    }
}

/// 持续性分类: 区域在连续几帧中被匹配到
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persistence {
    SeenInOne,
    SeenInTwo,
    SeenInThree,
}

// ========== 数据结构 ==========

/// 检测区域 (Detected region)
///
/// 单帧内的轴对齐矩形, 附带来源帧名称
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub source: Arc<str>, // 来源图片名, 同一帧的区域共享
}

impl DetectedRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32, source: impl Into<Arc<str>>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            source: source.into(),
        }
    }

    /// 获取中心点
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// 两个区域中心点的欧氏距离
    pub fn center_distance(&self, other: &DetectedRegion) -> f32 {
        let (x1, y1) = self.center();
        let (x2, y2) = other.center();
        ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
    }

    /// 宽高比 (w / h)
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// 标本组 (Specimen group)
///
/// 跨帧匹配的结果, `members` 按时间顺序排列
#[derive(Clone, Debug, PartialEq)]
pub struct SpecimenGroup {
    pub persistence: Persistence,
    pub members: Vec<DetectedRegion>,
}

impl SpecimenGroup {
    pub fn single(region: DetectedRegion) -> Self {
        Self {
            persistence: Persistence::SeenInOne,
            members: vec![region],
        }
    }

    pub fn pair(first: DetectedRegion, second: DetectedRegion) -> Self {
        Self {
            persistence: Persistence::SeenInTwo,
            members: vec![first, second],
        }
    }

    pub fn triple(first: DetectedRegion, second: DetectedRegion, third: DetectedRegion) -> Self {
        Self {
            persistence: Persistence::SeenInThree,
            members: vec![first, second, third],
        }
    }

    /// 代表区域: 最后一次出现时的坐标
    pub fn representative(&self) -> &DetectedRegion {
        // 构造函数保证 members 非空
        &self.members[self.members.len() - 1]
    }
}
