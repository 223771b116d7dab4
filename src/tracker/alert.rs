use tracing::debug;

use super::engine::Axis;

/// 基本の再通知間隔
pub const BASE_INTERVAL_MS: f64 = 60_000.0;
/// 再通知間隔の下限
pub const MIN_INTERVAL_MS: f64 = 10_000.0;
/// 超過時間がこれだけ増えるごとに通知頻度が倍になる
pub const ESCALATION_MS: f64 = 300_000.0;

/// 上限をどれだけ超えているかに応じた再通知間隔
///
/// 超過 0 で 60 秒、5 分超過で 30 秒、以降 10 秒まで縮む。
pub fn interval_ms(elapsed_ms: f64, limit_ms: f64) -> f64 {
    if elapsed_ms <= limit_ms {
        return BASE_INTERVAL_MS;
    }
    let overtime_ms = elapsed_ms - limit_ms;
    (BASE_INTERVAL_MS / (1.0 + overtime_ms / ESCALATION_MS)).max(MIN_INTERVAL_MS)
}

/// アラートを実際に通知するかどうかを決める
#[derive(Debug, Default, Clone)]
pub struct AlertScheduler {
    last_alert_ms: Option<u64>,
    last_sent: Option<Axis>,
}

impl AlertScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sent(&self) -> Option<Axis> {
        self.last_sent
    }

    /// `alert` が None の間は何も通知せず、次のアラートを新規扱いにする。
    /// 軸が変わった場合は間隔に関係なくすぐ通知する。
    pub fn decide(&mut self, alert: Option<Axis>, elapsed_ms: f64, limit_ms: f64, now_ms: u64) -> bool {
        let Some(axis) = alert else {
            self.last_sent = None;
            return false;
        };

        let interval = interval_ms(elapsed_ms, limit_ms);
        let due = match self.last_alert_ms {
            Some(last) => now_ms.saturating_sub(last) as f64 > interval,
            None => true,
        };

        if due || self.last_sent != Some(axis) {
            debug!(%axis, interval_ms = interval, "alert emitted");
            self.last_alert_ms = Some(now_ms);
            self.last_sent = Some(axis);
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.last_alert_ms = None;
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: f64 = 600_000.0;

    #[test]
    fn test_interval_at_limit() {
        assert_eq!(interval_ms(LIMIT, LIMIT), BASE_INTERVAL_MS);
        assert!((interval_ms(LIMIT + 1.0, LIMIT) - BASE_INTERVAL_MS).abs() < 1.0);
    }

    #[test]
    fn test_interval_halves_after_five_minutes() {
        assert!((interval_ms(LIMIT + 300_000.0, LIMIT) - 30_000.0).abs() < 1e-6);
        assert!((interval_ms(LIMIT + 600_000.0, LIMIT) - 20_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_interval_monotonic_and_floored() {
        let mut prev = f64::MAX;
        for step in 0..200 {
            let overtime = step as f64 * 30_000.0;
            let interval = interval_ms(LIMIT + overtime, LIMIT);
            assert!(interval <= prev);
            assert!(interval >= MIN_INTERVAL_MS);
            prev = interval;
        }
        assert_eq!(prev, MIN_INTERVAL_MS);
    }

    #[test]
    fn test_first_alert_emits() {
        let mut s = AlertScheduler::new();
        assert!(s.decide(Some(Axis::Gaze), LIMIT + 1.0, LIMIT, 0));
        assert_eq!(s.last_sent(), Some(Axis::Gaze));
    }

    #[test]
    fn test_same_axis_waits_for_interval() {
        let mut s = AlertScheduler::new();
        let mut now = 1_000_000;
        let elapsed = LIMIT + 1.0;
        assert!(s.decide(Some(Axis::Gaze), elapsed, LIMIT, now));

        // 60 秒経つまでは再通知しない
        for _ in 0..59 {
            now += 1_000;
            assert!(!s.decide(Some(Axis::Gaze), elapsed, LIMIT, now));
        }
        now += 2_000;
        assert!(s.decide(Some(Axis::Gaze), elapsed, LIMIT, now));
    }

    #[test]
    fn test_escalation_shortens_interval() {
        let mut s = AlertScheduler::new();
        // 10 分超過 → 間隔 20 秒
        let elapsed = LIMIT + 600_000.0;
        assert!(s.decide(Some(Axis::Body), elapsed, LIMIT, 0));
        assert!(!s.decide(Some(Axis::Body), elapsed + 15_000.0, LIMIT, 15_000));
        assert!(s.decide(Some(Axis::Body), elapsed + 21_000.0, LIMIT, 21_000));
    }

    #[test]
    fn test_axis_change_forces_alert() {
        let mut s = AlertScheduler::new();
        assert!(s.decide(Some(Axis::Gaze), LIMIT + 1.0, LIMIT, 0));
        assert!(s.decide(Some(Axis::Joints), LIMIT + 1.0, LIMIT, 1));
        assert!(s.decide(Some(Axis::Body), LIMIT + 1.0, LIMIT, 2));
    }

    #[test]
    fn test_clear_makes_next_alert_fresh() {
        let mut s = AlertScheduler::new();
        assert!(s.decide(Some(Axis::Gaze), LIMIT + 1.0, LIMIT, 0));
        assert!(!s.decide(None, 0.0, LIMIT, 1_000));
        assert_eq!(s.last_sent(), None);
        assert!(s.decide(Some(Axis::Gaze), LIMIT + 1.0, LIMIT, 2_000));
    }

    #[test]
    fn test_reset() {
        let mut s = AlertScheduler::new();
        s.decide(Some(Axis::Joints), LIMIT + 1.0, LIMIT, 0);
        s.reset();
        assert_eq!(s.last_sent(), None);
        assert!(s.decide(Some(Axis::Joints), LIMIT + 1.0, LIMIT, 1));
    }
}
