//! 画素差分による粗い動き検出
//!
//! 画面に変化があったフレームだけ姿勢推定に回す。
//! 前フレームと低解像度で比較する。

use anyhow::{bail, Result};
use tracing::debug;

pub const SAMPLE_WIDTH: usize = 64;
pub const SAMPLE_HEIGHT: usize = 36;
/// チャンネルあたりの画素差の閾値 (0〜255)
pub const DEFAULT_THRESHOLD: f32 = 30.0;
/// 変化したとみなす画素の割合
pub const DEFAULT_PERCENT_THRESHOLD: f64 = 0.02;

/// フレームごとに「大きな動きがあったか」を返す
pub trait MotionGate {
    fn check_motion(&mut self, frame: &RgbFrame) -> bool;

    /// `value` は 0〜100。高いほど敏感
    fn update_sensitivity(&mut self, value: u8);
}

/// 8bit RGB のフレーム
#[derive(Debug, Clone)]
pub struct RgbFrame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("Empty frame ({}x{})", width, height);
        }
        if data.len() != width * height * 3 {
            bail!(
                "Frame buffer has {} bytes, expected {} for {}x{} RGB",
                data.len(),
                width * height * 3,
                width,
                height
            );
        }
        Ok(Self { width, height, data })
    }

    /// 単色フレーム
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Result<Self> {
        let data = rgb.iter().copied().cycle().take(width * height * 3).collect();
        Self::new(width, height, data)
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// 最近傍で縮小
    fn downscale(&self, width: usize, height: usize) -> Vec<[u8; 3]> {
        let mut out = Vec::with_capacity(width * height);
        for y in 0..height {
            let sy = y * self.height / height;
            for x in 0..width {
                let sx = x * self.width / width;
                out.push(self.pixel(sx, sy));
            }
        }
        out
    }
}

/// フレーム差分による動き検出器
pub struct FrameDiffDetector {
    width: usize,
    height: usize,
    prev: Option<Vec<[u8; 3]>>,
    threshold: f32,
    percent_threshold: f64,
}

impl FrameDiffDetector {
    pub fn new() -> Self {
        Self::with_resolution(SAMPLE_WIDTH, SAMPLE_HEIGHT)
    }

    pub fn with_resolution(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            prev: None,
            threshold: DEFAULT_THRESHOLD,
            percent_threshold: DEFAULT_PERCENT_THRESHOLD,
        }
    }

    pub fn thresholds(&self) -> (f32, f64) {
        (self.threshold, self.percent_threshold)
    }

    /// 前フレームを捨てる。次の判定は「動きあり」になる
    pub fn reset(&mut self) {
        self.prev = None;
    }
}

impl Default for FrameDiffDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionGate for FrameDiffDetector {
    fn check_motion(&mut self, frame: &RgbFrame) -> bool {
        let pixels = frame.downscale(self.width, self.height);
        let prev = match self.prev.take() {
            Some(prev) => prev,
            None => {
                // 比較対象が無いうちは静止とは言えない
                self.prev = Some(pixels);
                return true;
            }
        };

        // 1画素おきに比較するので数を2倍する
        let limit = self.threshold * 3.0;
        let diff_count = pixels
            .iter()
            .zip(prev.iter())
            .step_by(2)
            .filter(|(a, b)| {
                let sum: u32 = a.iter().zip(b.iter()).map(|(&x, &y)| x.abs_diff(y) as u32).sum();
                sum as f32 > limit
            })
            .count();

        let total = pixels.len();
        self.prev = Some(pixels);
        (diff_count * 2) as f64 / total as f64 > self.percent_threshold
    }

    fn update_sensitivity(&mut self, value: u8) {
        let inverted = 101.0 - value.min(100) as f64;
        self.threshold = (10.0 + inverted / 100.0 * 50.0) as f32;
        self.percent_threshold = 0.005 + inverted / 100.0 * 0.05;
        debug!(
            value,
            threshold = self.threshold,
            percent = self.percent_threshold,
            "motion sensitivity updated"
        );
    }
}
