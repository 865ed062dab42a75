/// 持久化 (Storage)
///
/// CSV 是仪表盘的只读数据源, 本模块是唯一写入方
pub mod csv_store;

pub use csv_store::{merge_into_master, read_rows, write_rows, MergeOutcome};

/// 主测量数据集文件名
pub const MEASUREMENTS_FILE: &str = "moth_measurements.csv";

/// 离开数据文件名
pub const DEPARTURES_FILE: &str = "moth_departures.csv";
