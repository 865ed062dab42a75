//! 端到端: 合成会话目录 → 分析 → 发布 → 重复运行

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_ellipse_mut;

use mothtrap::detection::DetectorConfig;
use mothtrap::measurement::MeasurementRecord;
use mothtrap::session::{DepartureObservation, SessionDirs};
use mothtrap::storage::{read_rows, DEPARTURES_FILE, MEASUREMENTS_FILE};
use mothtrap::{AnalyzerConfig, Processor, SessionAnalyzer};

// 标本椭圆中心与半轴
const CENTER: (i32, i32) = (100, 90);
const RADII: (i32, i32) = (14, 20);

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mothtrap-e2e-{}-{}", tag, rand::random::<u64>()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn session_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 2)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap()
}

fn write_frame(path: &Path, with_specimen: bool) {
    let mut img = GrayImage::from_pixel(240, 200, Luma([225]));
    if with_specimen {
        draw_filled_ellipse_mut(&mut img, CENTER, RADII.0, RADII.1, Luma([30]));
    }
    let file = fs::File::create(path).unwrap();
    JpegEncoder::new_with_quality(BufWriter::new(file), 100)
        .encode_image(&img)
        .unwrap();
}

/// 诱集阶段 4 帧 (最早一帧为空), 驱离阶段 3 帧计数 [1, 1, 0]
fn build_session(base: &Path) -> SessionDirs {
    let dirs = SessionDirs::new(base, session_date());
    fs::create_dir_all(&dirs.attractive).unwrap();
    fs::create_dir_all(&dirs.deterrent).unwrap();

    write_frame(&dirs.attractive.join("20-55-00.jpg"), false);
    for name in ["21-00-00.jpg", "21-05-00.jpg", "21-10-00.jpg"] {
        write_frame(&dirs.attractive.join(name), true);
    }
    write_frame(&dirs.deterrent.join("21-15-00.jpg"), true);
    write_frame(&dirs.deterrent.join("21-20-00.jpg"), true);
    write_frame(&dirs.deterrent.join("21-25-30.jpg"), false);
    dirs
}

fn analyzer() -> SessionAnalyzer {
    let config = AnalyzerConfig {
        detector: DetectorConfig {
            mm_per_pixel: 1.0,
            min_size_mm: 10.0,
            max_size_mm: 100.0,
            ..Default::default()
        },
        ..Default::default()
    };
    SessionAnalyzer::new(config).unwrap()
}

#[test]
fn test_full_session_publishes_measurements_and_departures() {
    let images = temp_dir("images");
    let data = temp_dir("data");
    let dirs = build_session(&images);

    let processor = Processor::new(&images, &data);
    assert!(processor.run(&analyzer(), None, now()).unwrap());

    // 会话内结果
    let measurements: Vec<MeasurementRecord> =
        read_rows(&dirs.analysis.join(MEASUREMENTS_FILE)).unwrap();
    assert_eq!(measurements.len(), 1);
    let m = &measurements[0];
    assert_eq!(m.moth_id, 1);
    assert_eq!(m.date, "2024-07-01");
    assert_eq!(m.timestamp, "2024-07-01 21:10:00");
    assert_eq!(m.source_image, "21-10-00.jpg");
    assert!((m.position_x as i32 - (CENTER.0 - RADII.0)).abs() <= 2);
    assert!((m.position_y as i32 - (CENTER.1 - RADII.1)).abs() <= 2);
    assert!(m.length_mm > m.width_mm && m.width_mm > 0.0);
    assert_eq!(m.species, None);

    let departures: Vec<DepartureObservation> =
        read_rows(&dirs.analysis.join(DEPARTURES_FILE)).unwrap();
    assert_eq!(departures.len(), 1);
    assert_eq!(departures[0].moths_departed, 1);
    assert_eq!(departures[0].moths_remaining, 0);
    assert_eq!(departures[0].image_name, "21-25-30.jpg");
    assert_eq!(departures[0].time_since_red_minutes, 10.5);

    assert!(dirs.analysis.join("consistent_detections.jpg").exists());
    assert!(dirs.analysis.join("moth_1_at_21-10-00.jpg").exists());
    assert!(dirs.analysis.join("moth_1_measurements.jpg").exists());

    // 仪表盘数据
    let published: Vec<DepartureObservation> = read_rows(&data.join(DEPARTURES_FILE)).unwrap();
    assert_eq!(published, departures);
    let master: Vec<MeasurementRecord> = read_rows(&data.join(MEASUREMENTS_FILE)).unwrap();
    assert_eq!(master, measurements);

    fs::remove_dir_all(&images).unwrap();
    fs::remove_dir_all(&data).unwrap();
}

#[test]
fn test_rerun_leaves_master_unchanged() {
    let images = temp_dir("images");
    let data = temp_dir("data");
    build_session(&images);

    let processor = Processor::new(&images, &data);
    let analyzer = analyzer();
    assert!(processor.run(&analyzer, Some(session_date()), now()).unwrap());
    let before = fs::read(data.join(MEASUREMENTS_FILE)).unwrap();

    assert!(processor.run(&analyzer, Some(session_date()), now()).unwrap());
    assert_eq!(fs::read(data.join(MEASUREMENTS_FILE)).unwrap(), before);

    fs::remove_dir_all(&images).unwrap();
    fs::remove_dir_all(&data).unwrap();
}

#[test]
fn test_session_with_too_few_frames_writes_nothing() {
    let images = temp_dir("images");
    let data = temp_dir("data");
    let dirs = SessionDirs::new(&images, session_date());
    fs::create_dir_all(&dirs.attractive).unwrap();
    fs::create_dir_all(&dirs.deterrent).unwrap();
    write_frame(&dirs.attractive.join("21-00-00.jpg"), true);
    write_frame(&dirs.attractive.join("21-05-00.jpg"), true);
    write_frame(&dirs.deterrent.join("21-15-00.jpg"), true);

    let processor = Processor::new(&images, &data);
    assert!(!processor.run(&analyzer(), None, now()).unwrap());
    assert!(!dirs.analysis.exists());
    assert!(!data.join(MEASUREMENTS_FILE).exists());
    assert!(!data.join(DEPARTURES_FILE).exists());

    fs::remove_dir_all(&images).unwrap();
    fs::remove_dir_all(&data).unwrap();
}

#[test]
fn test_expired_sessions_are_cleaned_before_analysis() {
    let images = temp_dir("images");
    let data = temp_dir("data");
    build_session(&images);
    let stale = images.join("2024-06-01");
    fs::create_dir_all(stale.join("attractive_light")).unwrap();

    let processor = Processor::new(&images, &data);
    assert!(processor.run(&analyzer(), None, now()).unwrap());
    assert!(!stale.exists());

    fs::remove_dir_all(&images).unwrap();
    fs::remove_dir_all(&data).unwrap();
}

#[test]
fn test_corrupt_master_blocks_publishing() {
    let images = temp_dir("images");
    let data = temp_dir("data");
    build_session(&images);
    let corrupt = "moth_id,date\nnot,a,valid,row\n";
    fs::write(data.join(MEASUREMENTS_FILE), corrupt).unwrap();

    let processor = Processor::new(&images, &data);
    assert!(processor.run(&analyzer(), None, now()).is_err());
    assert!(!data.join(DEPARTURES_FILE).exists());
    assert_eq!(fs::read_to_string(data.join(MEASUREMENTS_FILE)).unwrap(), corrupt);

    fs::remove_dir_all(&images).unwrap();
    fs::remove_dir_all(&data).unwrap();
}

#[test]
fn test_deterrent_phase_across_midnight() {
    let images = temp_dir("images");
    let data = temp_dir("data");
    let dirs = SessionDirs::new(&images, session_date());
    fs::create_dir_all(&dirs.attractive).unwrap();
    fs::create_dir_all(&dirs.deterrent).unwrap();
    for name in ["23-40-00.jpg", "23-45-00.jpg", "23-50-00.jpg"] {
        write_frame(&dirs.attractive.join(name), true);
    }
    // 文件名排序时 00-03-00 在前, 按拍摄顺序应排在 23-58-00 之后
    write_frame(&dirs.deterrent.join("23-58-00.jpg"), true);
    write_frame(&dirs.deterrent.join("00-03-00.jpg"), false);

    let processor = Processor::new(&images, &data);
    assert!(processor.run(&analyzer(), None, now()).unwrap());

    let departures: Vec<DepartureObservation> = read_rows(&data.join(DEPARTURES_FILE)).unwrap();
    assert_eq!(departures.len(), 1);
    assert_eq!(departures[0].image_name, "00-03-00.jpg");
    assert_eq!(departures[0].moths_departed, 1);
    assert_eq!(departures[0].time_since_red_minutes, 5.0);

    fs::remove_dir_all(&images).unwrap();
    fs::remove_dir_all(&data).unwrap();
}
