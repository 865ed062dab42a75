//! 离开追踪 (Departure Tracker)
//!
//! 驱离阶段逐帧比较检测数量: 数量严格下降时记录一次离开事件,
//! 并把基线更新为新数量; 数量持平或上升不记录, 基线不变

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::frames::minutes_between;
use crate::round_to;

/// CSV 列顺序 (仪表盘依赖, 不可更改)
pub const DEPARTURE_COLUMNS: [&str; 5] = [
    "date",
    "time_since_red_minutes",
    "moths_departed",
    "moths_remaining",
    "image_name",
];

/// 离开观测 (对应 moth_departures.csv 的一行)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepartureObservation {
    pub date: String,
    pub time_since_red_minutes: f64,
    pub moths_departed: usize,
    pub moths_remaining: usize,
    pub image_name: String,
}

/// 离开追踪器
#[derive(Clone, Debug)]
pub struct DepartureTracker {
    date: String,
    started_at: Option<NaiveTime>, // 第一帧拍摄时间
    baseline: usize,               // 当前基线数量
    observations: Vec<DepartureObservation>,
}

impl DepartureTracker {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            started_at: None,
            baseline: 0,
            observations: Vec::new(),
        }
    }

    /// 当前基线 (未观测任何帧时为 None)
    pub fn baseline(&self) -> Option<usize> {
        self.started_at.map(|_| self.baseline)
    }

    /// 输入下一帧的检测数量, 帧必须按拍摄时间顺序输入
    pub fn observe(
        &mut self,
        image_name: &str,
        captured_at: NaiveTime,
        count: usize,
    ) -> Option<&DepartureObservation> {
        let Some(started_at) = self.started_at else {
            // 第一帧只建立基线
            self.started_at = Some(captured_at);
            self.baseline = count;
            return None;
        };

        if count >= self.baseline {
            return None;
        }

        let observation = DepartureObservation {
            date: self.date.clone(),
            time_since_red_minutes: round_to(minutes_between(started_at, captured_at), 2),
            moths_departed: self.baseline - count,
            moths_remaining: count,
            image_name: image_name.to_string(),
        };
        self.baseline = count;
        self.observations.push(observation);
        self.observations.last()
    }

    pub fn observations(&self) -> &[DepartureObservation] {
        &self.observations
    }

    pub fn into_observations(self) -> Vec<DepartureObservation> {
        self.observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(counts: &[usize]) -> Vec<DepartureObservation> {
        let mut tracker = DepartureTracker::new("2024-07-01");
        for (i, &count) in counts.iter().enumerate() {
            let time = NaiveTime::from_hms_opt(22, i as u32 * 5, 0).unwrap();
            let name = format!("{}.jpg", time.format("%H-%M-%S"));
            tracker.observe(&name, time, count);
        }
        tracker.into_observations()
    }

    #[test]
    fn test_only_strict_decreases_are_reported() {
        let observations = feed(&[10, 10, 7, 7, 9]);
        assert_eq!(observations.len(), 1);
        let obs = &observations[0];
        assert_eq!(obs.moths_departed, 3);
        assert_eq!(obs.moths_remaining, 7);
        assert_eq!(obs.image_name, "22-10-00.jpg");
        assert_eq!(obs.time_since_red_minutes, 10.0);
        assert_eq!(obs.date, "2024-07-01");
    }

    #[test]
    fn test_baseline_not_raised_by_increase() {
        // 9 > 7 不更新基线, 之后降到 8 仍高于基线 7, 不记录
        let observations = feed(&[7, 9, 8, 5]);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].moths_departed, 2);
        assert_eq!(observations[0].moths_remaining, 5);
    }

    #[test]
    fn test_first_frame_sets_baseline_only() {
        let mut tracker = DepartureTracker::new("2024-07-01");
        assert_eq!(tracker.baseline(), None);
        let t0 = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert!(tracker.observe("23-00-00.jpg", t0, 4).is_none());
        assert_eq!(tracker.baseline(), Some(4));
        assert!(tracker.observations().is_empty());
    }

    #[test]
    fn test_successive_decreases() {
        let observations = feed(&[5, 4, 2, 0]);
        let departed: Vec<usize> = observations.iter().map(|o| o.moths_departed).collect();
        assert_eq!(departed, [1, 2, 2]);
        assert_eq!(observations.last().unwrap().moths_remaining, 0);
    }

    #[test]
    fn test_elapsed_minutes_rounded() {
        let mut tracker = DepartureTracker::new("2024-07-01");
        let t0 = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
        let t1 = NaiveTime::from_hms_opt(22, 1, 20).unwrap();
        tracker.observe("22-00-00.jpg", t0, 2);
        let obs = tracker.observe("22-01-20.jpg", t1, 1).unwrap();
        assert_eq!(obs.time_since_red_minutes, 1.33);
    }
}
