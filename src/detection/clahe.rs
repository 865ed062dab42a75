//! 限制对比度自适应直方图均衡 (CLAHE)
//! Contrast Limited Adaptive Histogram Equalization
//!
//! 流程:
//! 1. 图像划分为 grid × grid 个分块
//! 2. 每个分块统计直方图并按 clip_limit 裁剪, 多余计数均匀回填
//! 3. 累积直方图生成分块查找表
//! 4. 像素值由相邻四个分块查找表双线性插值得到

use image::{GrayImage, Luma};

const BINS: usize = 256;

/// 对灰度图做 CLAHE 增强
///
/// # 参数
/// - `clip_limit`: 相对裁剪阈值 (常用 2.0-4.0)
/// - `grid`: 每个方向上的分块数
pub fn equalize(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let grid = grid.max(1);
    let tile_w = width.div_ceil(grid);
    let tile_h = height.div_ceil(grid);
    let tiles_x = width.div_ceil(tile_w) as usize;
    let tiles_y = height.div_ceil(tile_h) as usize;

    // 每个分块一张 LUT
    let mut luts = vec![[0u8; BINS]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx as u32 * tile_w;
            let y0 = ty as u32 * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts[ty * tiles_x + tx] = tile_lut(gray, x0, y0, x1, y1, clip_limit);
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let tyf = y as f32 / tile_h as f32 - 0.5;
        let ty1 = tyf.floor();
        let ya = tyf - ty1;
        let ty1 = (ty1 as i64).clamp(0, tiles_y as i64 - 1) as usize;
        let ty2 = ((tyf.floor() as i64) + 1).clamp(0, tiles_y as i64 - 1) as usize;

        for x in 0..width {
            let txf = x as f32 / tile_w as f32 - 0.5;
            let tx1 = txf.floor();
            let xa = txf - tx1;
            let tx1 = (tx1 as i64).clamp(0, tiles_x as i64 - 1) as usize;
            let tx2 = ((txf.floor() as i64) + 1).clamp(0, tiles_x as i64 - 1) as usize;

            let v = gray.get_pixel(x, y)[0] as usize;
            let lut = |tx: usize, ty: usize| luts[ty * tiles_x + tx][v] as f32;

            let top = lut(tx1, ty1) * (1.0 - xa) + lut(tx2, ty1) * xa;
            let bottom = lut(tx1, ty2) * (1.0 - xa) + lut(tx2, ty2) * xa;
            let value = top * (1.0 - ya) + bottom * ya;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// 计算单个分块的查找表
fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);
    let mut lut = [0u8; BINS];
    if area == 0 {
        // 空分块退化为恒等映射
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = i as u8;
        }
        return lut;
    }

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);
        let mut clipped = 0u32;
        for count in hist.iter_mut() {
            if *count > limit {
                clipped += *count - limit;
                *count = limit;
            }
        }

        // 多余计数均匀回填, 余数按步长分散
        let batch = clipped / BINS as u32;
        let residual = clipped as usize - batch as usize * BINS;
        for count in hist.iter_mut() {
            *count += batch;
        }
        if residual > 0 {
            let step = (BINS / residual).max(1);
            let mut remaining = residual;
            let mut i = 0;
            while i < BINS && remaining > 0 {
                hist[i] += 1;
                remaining -= 1;
                i += step;
            }
        }
    }

    let scale = (BINS - 1) as f32 / area as f32;
    let mut sum = 0u32;
    for (i, slot) in lut.iter_mut().enumerate() {
        sum += hist[i];
        *slot = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
