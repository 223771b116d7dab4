//! 姿勢モニタリングの司令塔
//!
//! カメラのフレームと姿勢推定の結果は別スレッドから届くことがある。
//! エンジンは基準姿勢とタイマーをその場で書き換えるので、
//! 呼び出しはすべて1つの `Monitor`（または `SharedMonitor`）を通す。

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::pose::PoseLandmarks;
use crate::tracker::{
    AlertScheduler, Axis, DailyStats, FrameAction, PoseVerdict, PostureEngine, PostureState,
    PresenceTracker, SessionTimer, TimerLevel,
};

/// 通知先に表示してもらうもの
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "axis")]
pub enum Notification {
    Posture(Axis),
    /// 連続利用による散歩のリマインダー
    Walk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerLevels {
    pub joints: TimerLevel,
    pub body: TimerLevel,
    pub gaze: TimerLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorUpdate {
    pub state: PostureState,
    pub levels: TimerLevels,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// このフレームで姿勢推定を行い、結果を `on_pose` に渡す
    DetectPose,
    /// 離席中。何もしない
    Paused,
    /// モニタリング停止中
    Idle,
    Evaluated(MonitorUpdate),
}

pub struct Monitor {
    engine: PostureEngine,
    scheduler: AlertScheduler,
    presence: PresenceTracker,
    session: SessionTimer,
    stats: DailyStats,
    walk_pending: bool,
    running: bool,
}

impl Monitor {
    pub fn new(config: &Config, now_ms: u64) -> Self {
        let config = config.sanitized();
        Self {
            engine: PostureEngine::new(config.engine_config(), now_ms),
            scheduler: AlertScheduler::new(),
            presence: PresenceTracker::new(config.away_timeout_ms(), now_ms),
            session: SessionTimer::new(config.walk_reminder_ms(), now_ms),
            stats: DailyStats::default(),
            walk_pending: false,
            running: false,
        }
    }

    /// 次のフレームから有効
    pub fn apply_config(&mut self, config: &Config) {
        let config = config.sanitized();
        self.engine.update_config(config.limits(), config.sensitivity());
        self.presence.set_away_timeout_ms(config.away_timeout_ms());
        self.session.set_reminder_ms(config.walk_reminder_ms());
    }

    pub fn start(&mut self, now_ms: u64) {
        self.engine.reset(now_ms);
        self.scheduler.reset();
        self.presence.reset(now_ms);
        self.session.restart(now_ms);
        self.stats.on_start(now_ms);
        self.walk_pending = false;
        self.running = true;
        info!("monitoring started");
    }

    pub fn stop(&mut self, now_ms: u64) {
        if !self.running {
            return;
        }
        self.running = false;
        self.scheduler.reset();
        self.stats.on_stop(now_ms);
        info!("monitoring stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_away(&self) -> bool {
        self.presence.is_away()
    }

    pub fn engine(&self) -> &PostureEngine {
        &self.engine
    }

    pub fn stats(&self) -> &DailyStats {
        &self.stats
    }

    /// カメラのフレームごとに、動き検出の結果を渡して呼ぶ
    ///
    /// 判定が行われないフレームで散歩リマインダーの時間が来た場合は、
    /// 次の `MonitorUpdate` で通知する。
    pub fn on_frame(&mut self, motion: bool, now_ms: u64) -> FrameOutcome {
        if !self.running {
            return FrameOutcome::Idle;
        }

        self.stats.tick(now_ms);
        if self.session.poll(now_ms) {
            self.walk_pending = true;
        }

        match self.presence.on_frame(motion, now_ms) {
            FrameAction::DetectPose { returned } => {
                if returned {
                    self.engine.reset(now_ms);
                    self.scheduler.reset();
                }
                FrameOutcome::DetectPose
            }
            FrameAction::AssumeStatic => FrameOutcome::Evaluated(self.evaluate(None, false, now_ms)),
            FrameAction::Paused => FrameOutcome::Paused,
        }
    }

    /// `DetectPose` を返したフレームの姿勢推定結果を渡す
    pub fn on_pose(&mut self, landmarks: Option<&PoseLandmarks>, now_ms: u64) -> Option<MonitorUpdate> {
        if !self.running {
            return None;
        }

        match self.presence.on_pose(landmarks.is_some(), now_ms) {
            PoseVerdict::Evaluate { motion } => Some(self.evaluate(landmarks, motion, now_ms)),
            PoseVerdict::WentAway => {
                self.engine.reset(now_ms);
                self.scheduler.reset();
                None
            }
        }
    }

    fn evaluate(&mut self, landmarks: Option<&PoseLandmarks>, motion: bool, now_ms: u64) -> MonitorUpdate {
        let state = self.engine.process(landmarks, motion, now_ms);
        let mut notifications = Vec::new();

        if std::mem::take(&mut self.walk_pending) {
            notifications.push(Notification::Walk);
        }

        let (elapsed_ms, limit_ms) = match state.alert {
            Some(axis) => (
                self.engine.elapsed_ms(axis, now_ms) as f64,
                self.engine.limit_ms(axis) as f64,
            ),
            None => (0.0, 0.0),
        };
        if self.scheduler.decide(state.alert, elapsed_ms, limit_ms, now_ms) {
            if let Some(axis) = state.alert {
                notifications.push(Notification::Posture(axis));
            }
        }

        for _ in &notifications {
            self.stats.record_alert(now_ms);
        }

        MonitorUpdate {
            state,
            levels: TimerLevels {
                joints: self.engine.timer_level(Axis::Joints, now_ms),
                body: self.engine.timer_level(Axis::Body, now_ms),
                gaze: self.engine.timer_level(Axis::Gaze, now_ms),
            },
            notifications,
        }
    }
}

/// 1つの `Monitor` への呼び出しを直列化するハンドル
#[derive(Clone)]
pub struct SharedMonitor {
    inner: Arc<Mutex<Monitor>>,
}

impl SharedMonitor {
    pub fn new(monitor: Monitor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(monitor)),
        }
    }

    /// 排他的に `f` を実行する。他スレッドが panic してもロックは使い続けられる
    pub fn with<R>(&self, f: impl FnOnce(&mut Monitor) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn on_frame(&self, motion: bool, now_ms: u64) -> FrameOutcome {
        self.with(|m| m.on_frame(motion, now_ms))
    }

    pub fn on_pose(&self, landmarks: Option<&PoseLandmarks>, now_ms: u64) -> Option<MonitorUpdate> {
        self.with(|m| m.on_pose(landmarks, now_ms))
    }
}
