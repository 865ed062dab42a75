//! 三帧一致性匹配 (Consistency Matcher)
//!
//! 核心思想:
//! 1. 按帧1区域顺序贪心扫描, 中心距离 < 阈值即视为候选
//! 2. 帧2候选依次尝试延伸到帧3, 第一个成功的候选胜出
//! 3. 结果与扫描顺序相关, 不做全局最优分配

use super::types::{DetectedRegion, SpecimenGroup, DEFAULT_MATCH_THRESHOLD_PX};

/// 匹配结果: 三个互不相交的持续性分类
#[derive(Clone, Debug, Default)]
pub struct MatchOutcome {
    pub seen_in_one: Vec<SpecimenGroup>,
    pub seen_in_two: Vec<SpecimenGroup>,
    pub seen_in_three: Vec<SpecimenGroup>,
}

impl MatchOutcome {
    /// 晋升到测量阶段的区域 (帧3坐标)
    pub fn promoted(&self) -> Vec<&DetectedRegion> {
        self.seen_in_three.iter().map(|g| g.representative()).collect()
    }

    pub fn summary(&self) -> (usize, usize, usize) {
        (self.seen_in_one.len(), self.seen_in_two.len(), self.seen_in_three.len())
    }
}

/// 一致性匹配器
#[derive(Clone, Debug)]
pub struct ConsistencyMatcher {
    threshold_px: f32,
}

impl Default for ConsistencyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD_PX)
    }
}

impl ConsistencyMatcher {
    pub fn new(threshold_px: f32) -> Self {
        Self { threshold_px }
    }

    pub fn threshold_px(&self) -> f32 {
        self.threshold_px
    }

    fn is_close(&self, a: &DetectedRegion, b: &DetectedRegion) -> bool {
        a.center_distance(b) < self.threshold_px
    }

    /// 对三帧检测结果分类
    pub fn classify(
        &self,
        frame1: &[DetectedRegion],
        frame2: &[DetectedRegion],
        frame3: &[DetectedRegion],
    ) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let mut used2 = vec![false; frame2.len()];
        let mut used3 = vec![false; frame3.len()];

        for r1 in frame1 {
            // 候选列表在尝试前一次性确定
            let candidates: Vec<usize> = frame2
                .iter()
                .enumerate()
                .filter(|(j, r2)| !used2[*j] && self.is_close(r1, r2))
                .map(|(j, _)| j)
                .collect();

            if candidates.is_empty() {
                outcome.seen_in_one.push(SpecimenGroup::single(r1.clone()));
                continue;
            }

            for j in candidates {
                let r2 = &frame2[j];
                let first3 = frame3
                    .iter()
                    .enumerate()
                    .find(|(k, r3)| !used3[*k] && self.is_close(r2, r3))
                    .map(|(k, _)| k);

                used2[j] = true;
                match first3 {
                    Some(k) => {
                        used3[k] = true;
                        outcome.seen_in_three.push(SpecimenGroup::triple(
                            r1.clone(),
                            r2.clone(),
                            frame3[k].clone(),
                        ));
                        break;
                    }
                    None => {
                        outcome
                            .seen_in_two
                            .push(SpecimenGroup::pair(r1.clone(), r2.clone()));
                    }
                }
            }
        }

        // 剩余未认领区域归入单帧
        for (j, r2) in frame2.iter().enumerate() {
            if !used2[j] {
                outcome.seen_in_one.push(SpecimenGroup::single(r2.clone()));
            }
        }
        for (k, r3) in frame3.iter().enumerate() {
            if !used3[k] {
                outcome.seen_in_one.push(SpecimenGroup::single(r3.clone()));
            }
        }

        outcome
    }
}
