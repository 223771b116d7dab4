use tracing::info;

/// 画面に動きが無いまま在席確認に入るまでの時間
pub const DEFAULT_AWAY_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// カメラフレームごとに呼び出し側が取るべき動作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// ポーズ推定を実行する。`returned` は離席から戻ったフレーム
    DetectPose { returned: bool },
    /// 画面が静止している。ランドマーク無しで静止として評価する
    AssumeStatic,
    /// 離席中。動きが出るまで何もしない
    Paused,
}

/// ポーズ推定結果の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseVerdict {
    /// エンジンで評価する
    Evaluate { motion: bool },
    /// 在席確認で人が見つからなかった
    WentAway,
}

/// 離席検出
///
/// 画素レベルの動きが `away_timeout_ms` 以上無いと、次のポーズ推定を在席確認として扱う。
/// 人が見つかれば静止中、見つからなければ離席とみなす。
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    away_timeout_ms: u64,
    last_motion_ms: u64,
    away: bool,
}

impl PresenceTracker {
    pub fn new(away_timeout_ms: u64, now_ms: u64) -> Self {
        Self {
            away_timeout_ms,
            last_motion_ms: now_ms,
            away: false,
        }
    }

    pub fn set_away_timeout_ms(&mut self, away_timeout_ms: u64) {
        self.away_timeout_ms = away_timeout_ms;
    }

    pub fn is_away(&self) -> bool {
        self.away
    }

    fn is_verifying(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_motion_ms) > self.away_timeout_ms
    }

    pub fn on_frame(&mut self, motion: bool, now_ms: u64) -> FrameAction {
        if motion {
            self.last_motion_ms = now_ms;
            let returned = self.away;
            if returned {
                info!("user returned (motion detected)");
                self.away = false;
            }
            return FrameAction::DetectPose { returned };
        }

        if self.away {
            FrameAction::Paused
        } else if self.is_verifying(now_ms) {
            FrameAction::DetectPose { returned: false }
        } else {
            FrameAction::AssumeStatic
        }
    }

    /// 人が見つからなくても在席確認中でなければ、ランドマーク無しの評価に回す
    /// （エンジン側で「変化なし」として扱われる）
    pub fn on_pose(&mut self, found: bool, now_ms: u64) -> PoseVerdict {
        let verifying = self.is_verifying(now_ms);
        if found {
            if verifying {
                info!("user verified present (static)");
                self.last_motion_ms = now_ms;
            }
            return PoseVerdict::Evaluate { motion: !verifying };
        }

        if verifying {
            info!("user not found, entering away mode");
            self.away = true;
            PoseVerdict::WentAway
        } else {
            PoseVerdict::Evaluate { motion: true }
        }
    }

    pub fn reset(&mut self, now_ms: u64) {
        self.last_motion_ms = now_ms;
        self.away = false;
    }
}
