/// 诱虫灯会话分析 (Moth Trap Analyzer)
///
/// 每晚采集结束后运行一次:
/// 1. 清理过期会话目录
/// 2. 分析最新 (或指定日期) 会话
/// 3. 发布测量与离开数据到仪表盘数据目录
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::Parser;
use log::{error, info};
use mothtrap::{AnalyzerConfig, Args, Processor, SessionAnalyzer};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("🚀 诱虫灯会话分析启动");

    let mut config = match AnalyzerConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ 配置加载失败: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    config.apply_args(&args);
    if let Err(e) = config.validate() {
        error!("❌ 配置无效: {:#}", e);
        return ExitCode::FAILURE;
    }
    config.print_summary();

    let date = match args.date.as_deref() {
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(e) => {
                error!("❌ 日期格式错误 {}: {}", s, e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let analyzer = match SessionAnalyzer::new(config) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            error!("❌ 分析器初始化失败: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let processor = Processor::from_args(&args);
    info!("📂 图片目录: {}", processor.images_dir.display());
    info!("📂 数据目录: {}", processor.data_dir.display());

    match processor.run(&analyzer, date, Local::now().naive_local()) {
        Ok(true) => {
            info!("✅ 处理完成");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            error!("❌ 处理失败");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("❌ 处理出错: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
