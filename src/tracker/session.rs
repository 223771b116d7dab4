use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 連続モニタリングでこれだけ経ったら歩くよう促す
pub const DEFAULT_WALK_REMINDER_MS: u64 = 30 * 60 * 1000;

pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// 一定時間ごとに1回だけ発火する休憩リマインダー
#[derive(Debug, Clone)]
pub struct SessionTimer {
    reminder_ms: u64,
    window_start_ms: u64,
}

impl SessionTimer {
    pub fn new(reminder_ms: u64, now_ms: u64) -> Self {
        Self {
            reminder_ms,
            window_start_ms: now_ms,
        }
    }

    pub fn set_reminder_ms(&mut self, reminder_ms: u64) {
        self.reminder_ms = reminder_ms;
    }

    pub fn restart(&mut self, now_ms: u64) {
        self.window_start_ms = now_ms;
    }

    /// 時間を超えていれば true を返して次の窓を始める
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.window_start_ms) > self.reminder_ms {
            self.window_start_ms = now_ms;
            return true;
        }
        false
    }
}

/// 1日ぶんの利用統計。UTC の日付が変わると0に戻る
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    /// UNIX エポックからの日数
    pub day: u64,
    pub alerts: u32,
    pub monitoring_ms: u64,
    pub break_ms: u64,
    /// 最後に加算した時刻。停止中は停止時刻
    #[serde(default)]
    last_update_ms: Option<u64>,
}

impl DailyStats {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read stats file {}", path.display()))?;
        let stats = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse stats file {}", path.display()))?;
        Ok(stats)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!("{:#}; starting with empty stats", e);
            Self::default()
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write stats file {}", path.display()))?;
        Ok(())
    }

    fn roll_over(&mut self, now_ms: u64) {
        let day = now_ms / DAY_MS;
        if day != self.day {
            debug!(day, "new day, clearing stats");
            self.day = day;
            self.alerts = 0;
            self.monitoring_ms = 0;
            self.break_ms = 0;
        }
    }

    /// モニタリング開始。前回停止からの間隔を休憩時間に加える（24時間以上は無視）
    pub fn on_start(&mut self, now_ms: u64) {
        self.roll_over(now_ms);
        if let Some(stopped) = self.last_update_ms {
            let gap = now_ms.saturating_sub(stopped);
            if gap > 0 && gap < DAY_MS {
                self.break_ms += since_today(stopped, now_ms);
            }
        }
        self.last_update_ms = Some(now_ms);
    }

    /// モニタリング中に呼ぶ
    pub fn tick(&mut self, now_ms: u64) {
        self.roll_over(now_ms);
        if let Some(last) = self.last_update_ms {
            self.monitoring_ms += since_today(last, now_ms);
        }
        self.last_update_ms = Some(now_ms);
    }

    pub fn on_stop(&mut self, now_ms: u64) {
        self.tick(now_ms);
    }

    pub fn record_alert(&mut self, now_ms: u64) {
        self.roll_over(now_ms);
        self.alerts += 1;
    }
}

/// `from_ms` から `now_ms` までのうち、`now_ms` と同じ日に入る部分
fn since_today(from_ms: u64, now_ms: u64) -> u64 {
    let day_start = now_ms - now_ms % DAY_MS;
    now_ms.saturating_sub(from_ms.max(day_start))
}
