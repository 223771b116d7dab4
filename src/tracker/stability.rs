use std::collections::VecDeque;

/// 統計を返すのに必要な最小サンプル数
pub const MIN_SAMPLES: usize = 5;

/// 既定の窓サイズ（約1秒ぶんのフレーム）
pub const DEFAULT_CAPACITY: usize = 30;

/// 体幹中心の平均と広がり
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferStats {
    pub mean_x: f32,
    pub mean_y: f32,
    /// 平均からのユークリッド距離の母標準偏差
    pub std_dev: f32,
}

/// 体幹中心の直近サンプルを保持するリングバッファ
#[derive(Debug, Clone)]
pub struct StabilityBuffer {
    capacity: usize,
    samples: VecDeque<(f32, f32)>,
}

impl StabilityBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// None は無視する
    pub fn push(&mut self, sample: Option<(f32, f32)>) {
        let Some(sample) = sample else {
            return;
        };
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// サンプルが MIN_SAMPLES 未満なら None
    pub fn stats(&self) -> Option<BufferStats> {
        if self.samples.len() < MIN_SAMPLES {
            return None;
        }

        let n = self.samples.len() as f32;
        let (sum_x, sum_y) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
        let mean_x = sum_x / n;
        let mean_y = sum_y / n;

        let sum_sq: f32 = self
            .samples
            .iter()
            .map(|&(x, y)| (x - mean_x).powi(2) + (y - mean_y).powi(2))
            .sum();

        Some(BufferStats {
            mean_x,
            mean_y,
            std_dev: (sum_sq / n).sqrt(),
        })
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f32, f32)> {
        self.samples.iter()
    }
}

impl Default for StabilityBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_keeps_most_recent() {
        let mut buf = StabilityBuffer::new(30);
        for i in 0..50 {
            buf.push(Some((i as f32, 0.0)));
        }
        assert_eq!(buf.len(), 30);
        let xs: Vec<f32> = buf.iter().map(|&(x, _)| x).collect();
        assert_eq!(xs.first(), Some(&20.0));
        assert_eq!(xs.last(), Some(&49.0));
    }

    #[test]
    fn test_insufficient_samples() {
        let mut buf = StabilityBuffer::default();
        for _ in 0..4 {
            buf.push(Some((0.5, 0.5)));
        }
        assert!(buf.stats().is_none());
        buf.push(Some((0.5, 0.5)));
        assert!(buf.stats().is_some());
    }

    #[test]
    fn test_push_none_is_noop() {
        let mut buf = StabilityBuffer::default();
        buf.push(None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_stats_values() {
        let mut buf = StabilityBuffer::default();
        // 正方形の4隅 + 中心: 平均は中心
        for &p in &[(0.0, 0.0), (2.0, 0.0), (0.0, 2.0), (2.0, 2.0), (1.0, 1.0)] {
            buf.push(Some(p));
        }
        let stats = buf.stats().unwrap();
        assert!((stats.mean_x - 1.0).abs() < 1e-6);
        assert!((stats.mean_y - 1.0).abs() < 1e-6);
        // 二乗距離: 2,2,2,2,0 → 平均 1.6
        assert!((stats.std_dev - 1.6f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_constant_samples_zero_spread() {
        let mut buf = StabilityBuffer::default();
        for _ in 0..10 {
            buf.push(Some((0.3, 0.7)));
        }
        let stats = buf.stats().unwrap();
        assert!(stats.std_dev < 1e-6);
    }

    #[test]
    fn test_reset() {
        let mut buf = StabilityBuffer::default();
        for _ in 0..10 {
            buf.push(Some((0.1, 0.1)));
        }
        buf.reset();
        assert!(buf.is_empty());
        assert!(buf.stats().is_none());
    }
}
