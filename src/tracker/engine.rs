//! 姿勢ドリフト検出エンジン
//!
//! 毎フレームのランドマークから「最後に動いてからの経過時間」を関節・体幹・視線の
//! 3軸で追跡し、設定された上限を超えた軸をアラートとして返す。
//! 時刻は呼び出し側がミリ秒で渡す（内部で時計を読まない）。

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::smooth::PointSmoother;
use super::stability::{BufferStats, StabilityBuffer, DEFAULT_CAPACITY};
use crate::pose::{LandmarkIndex, Point, PoseLandmarks};

/// ランドマークごとのEMA係数
pub const LANDMARK_ALPHA: f32 = 0.2;
/// 体幹中心のEMA係数（ゆっくり追従させる）
pub const BODY_CENTER_ALPHA: f32 = 0.05;
/// 関節ドリフト閾値の下限
pub const MIN_JOINT_THRESHOLD: f32 = 0.015;
pub const YAW_THRESHOLD: f32 = 0.15;
/// 体幹ドリフトの基本閾値
pub const COARSE_THRESHOLD: f32 = 0.05;
/// ノイズによる閾値拡大の上限
pub const MAX_NOISE_FACTOR: f32 = 0.05;
/// 上限のこの割合を超えたら警告表示
pub const WARNING_RATIO: f64 = 0.8;

/// 静止を追跡する軸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Body,
    Joints,
    Gaze,
}

impl Axis {
    /// アラートの優先順位: 体幹 > 関節 > 視線
    pub const PRIORITY: [Axis; 3] = [Axis::Body, Axis::Joints, Axis::Gaze];

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::Body => "body",
            Axis::Joints => "joints",
            Axis::Gaze => "gaze",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 軸ごとの静止上限（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub joints_ms: u64,
    pub body_ms: u64,
    pub gaze_ms: u64,
}

impl Limits {
    pub fn get(&self, axis: Axis) -> u64 {
        match axis {
            Axis::Body => self.body_ms,
            Axis::Joints => self.joints_ms,
            Axis::Gaze => self.gaze_ms,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            joints_ms: 1_500_000,
            body_ms: 1_800_000,
            gaze_ms: 600_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub limits: Limits,
    /// 0〜100。高いほど小さな動きも検出する
    pub sensitivity: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            sensitivity: 50,
        }
    }
}

/// 感度 → 関節の移動閾値 (0.15〜0.01)
pub fn movement_threshold(sensitivity: u8) -> f32 {
    0.15 - (sensitivity as f32 / 100.0) * 0.14
}

/// 各軸の経過時間（秒）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Timers {
    pub joints: f32,
    pub body: f32,
    pub gaze: f32,
}

impl Timers {
    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Body => self.body,
            Axis::Joints => self.joints,
            Axis::Gaze => self.gaze,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PostureState {
    pub timers: Timers,
    pub alert: Option<Axis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerLevel {
    Normal,
    /// 上限の80%を超えた
    Warning,
}

/// 「静止している」とみなす基準姿勢
#[derive(Debug, Clone)]
struct Anchor {
    pose: PoseLandmarks,
    yaw: Option<f32>,
    body_center: Option<(f32, f32)>,
}

/// 軸ごとの最終移動時刻
#[derive(Debug, Clone, Copy)]
struct LastMove {
    body: u64,
    joints: u64,
    gaze: u64,
}

impl LastMove {
    fn at(now_ms: u64) -> Self {
        Self {
            body: now_ms,
            joints: now_ms,
            gaze: now_ms,
        }
    }

    fn get(&self, axis: Axis) -> u64 {
        match axis {
            Axis::Body => self.body,
            Axis::Joints => self.joints,
            Axis::Gaze => self.gaze,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Movement {
    joints: bool,
    gaze: bool,
    body: bool,
}

enum Drift {
    /// 基準姿勢を取り直した（このフレームは判定しない）
    Anchored,
    Checked(Movement),
}

pub struct PostureEngine {
    limits: Limits,
    movement_threshold: f32,
    smoothers: [Option<PointSmoother>; LandmarkIndex::COUNT],
    body_center_smoother: PointSmoother,
    stability: StabilityBuffer,
    anchor: Option<Anchor>,
    last_move: LastMove,
}

impl PostureEngine {
    pub fn new(config: EngineConfig, now_ms: u64) -> Self {
        Self {
            limits: config.limits,
            movement_threshold: movement_threshold(config.sensitivity),
            smoothers: std::array::from_fn(|_| None),
            body_center_smoother: PointSmoother::new(BODY_CENTER_ALPHA),
            stability: StabilityBuffer::new(DEFAULT_CAPACITY),
            anchor: None,
            last_move: LastMove::at(now_ms),
        }
    }

    /// 次のフレームから有効。経過時間はさかのぼって変えない
    pub fn update_config(&mut self, limits: Limits, sensitivity: u8) {
        self.limits = limits;
        self.movement_threshold = movement_threshold(sensitivity);
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn limit_ms(&self, axis: Axis) -> u64 {
        self.limits.get(axis)
    }

    pub fn movement_threshold(&self) -> f32 {
        self.movement_threshold
    }

    pub fn has_anchor(&self) -> bool {
        self.anchor.is_some()
    }

    /// 基準姿勢・平滑化・タイマーをすべて初期化する。何度呼んでもよい
    pub fn reset(&mut self, now_ms: u64) {
        self.anchor = None;
        self.last_move = LastMove::at(now_ms);
        for slot in &mut self.smoothers {
            *slot = None;
        }
        self.body_center_smoother.reset();
        self.stability.reset();
        info!("posture engine reset");
    }

    pub fn elapsed_ms(&self, axis: Axis, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_move.get(axis))
    }

    pub fn timer_level(&self, axis: Axis, now_ms: u64) -> TimerLevel {
        let elapsed = self.elapsed_ms(axis, now_ms) as f64;
        if elapsed > self.limits.get(axis) as f64 * WARNING_RATIO {
            TimerLevel::Warning
        } else {
            TimerLevel::Normal
        }
    }

    /// 1フレーム処理する
    ///
    /// `motion_detected` が false、またはランドマークが無いフレームは「何も動いていない」
    /// として扱い、ドリフト判定を飛ばして経過時間だけを評価する。
    pub fn process(
        &mut self,
        landmarks: Option<&PoseLandmarks>,
        motion_detected: bool,
        now_ms: u64,
    ) -> PostureState {
        let mut moved = Movement::default();

        if let (true, Some(raw)) = (motion_detected, landmarks) {
            match self.detect_drift(raw, now_ms) {
                Drift::Anchored => {
                    return PostureState {
                        timers: Timers::default(),
                        alert: None,
                    };
                }
                Drift::Checked(m) => moved = m,
            }
        }

        // 体幹が動いたら全軸リセット（歩いている間は関節も視線も静止していない）
        if moved.body {
            self.last_move = LastMove::at(now_ms);
        } else if moved.joints {
            self.last_move.joints = now_ms;
        }
        if moved.gaze {
            self.last_move.gaze = now_ms;
        }

        self.evaluate(now_ms)
    }

    fn detect_drift(&mut self, raw: &PoseLandmarks, now_ms: u64) -> Drift {
        let smoothed = self.smooth(raw);

        let body_stats = match body_center(&smoothed) {
            Some((x, y)) => {
                let center = self.body_center_smoother.apply(Point::new(x, y, 0.0, 1.0));
                self.stability.push(Some((center.x, center.y)));
                Some((center, self.stability.stats()))
            }
            None => None,
        };
        let current_yaw = yaw(&smoothed);

        let anchor = match self.anchor.as_mut() {
            Some(anchor) => anchor,
            None => {
                let body_center = body_stats.map(|(center, stats)| match stats {
                    Some(s) => (s.mean_x, s.mean_y),
                    None => (center.x, center.y),
                });
                self.anchor = Some(Anchor {
                    pose: smoothed,
                    yaw: current_yaw,
                    body_center,
                });
                self.last_move = LastMove::at(now_ms);
                debug!(?current_yaw, ?body_center, "anchor pose captured");
                return Drift::Anchored;
            }
        };

        let mut moved = Movement::default();

        // 関節: キーポイントの平均移動量
        let avg_delta = average_joint_delta(&anchor.pose, &smoothed);
        let joint_threshold = MIN_JOINT_THRESHOLD.max(self.movement_threshold);
        if avg_delta > joint_threshold {
            debug!(avg_delta, joint_threshold, "joints moved");
            moved.joints = true;
            anchor.pose = smoothed;
        }

        // 視線: yaw の変化
        // 基準取得時に顔が見えていなかった場合は reset まで判定しない
        if let (Some(current), Some(anchored)) = (current_yaw, anchor.yaw) {
            let yaw_delta = (current - anchored).abs();
            if yaw_delta > YAW_THRESHOLD {
                debug!(yaw_delta, "gaze moved");
                moved.gaze = true;
                anchor.yaw = Some(current);
            }
        }

        // 体幹: 窓平均の移動量。ノイズが大きいほど閾値を広げる
        if let (Some((_, Some(stats))), Some(anchored)) = (body_stats, anchor.body_center) {
            if body_drift(&stats, anchored) {
                debug!(mean_x = stats.mean_x, mean_y = stats.mean_y, "body moved");
                moved.body = true;
                anchor.body_center = Some((stats.mean_x, stats.mean_y));
            }
        }

        Drift::Checked(moved)
    }

    fn smooth(&mut self, raw: &PoseLandmarks) -> PoseLandmarks {
        let mut smoothed = PoseLandmarks::default();
        for (i, (slot, point)) in self.smoothers.iter_mut().zip(raw.points.iter()).enumerate() {
            let smoother = slot.get_or_insert_with(|| PointSmoother::new(LANDMARK_ALPHA));
            smoothed.points[i] = smoother.apply(*point);
        }
        smoothed
    }

    fn evaluate(&self, now_ms: u64) -> PostureState {
        let t_body = self.elapsed_ms(Axis::Body, now_ms);
        let t_joints = self.elapsed_ms(Axis::Joints, now_ms);
        let t_gaze = self.elapsed_ms(Axis::Gaze, now_ms);

        let alert = Axis::PRIORITY
            .into_iter()
            .find(|&axis| self.elapsed_ms(axis, now_ms) > self.limits.get(axis));

        PostureState {
            timers: Timers {
                joints: t_joints as f32 / 1000.0,
                body: t_body as f32 / 1000.0,
                gaze: t_gaze as f32 / 1000.0,
            },
            alert,
        }
    }
}

/// 両肩・両腰のうち見えている点の平均
pub fn body_center(pose: &PoseLandmarks) -> Option<(f32, f32)> {
    let (sum_x, sum_y, count) = LandmarkIndex::BODY_CENTER
        .iter()
        .map(|&idx| pose.get(idx))
        .filter(|p| p.is_visible())
        .fold((0.0, 0.0, 0usize), |(sx, sy, n), p| (sx + p.x, sy + p.y, n + 1));

    if count == 0 {
        return None;
    }
    Some((sum_x / count as f32, sum_y / count as f32))
}

/// 鼻と両耳の中点のずれを耳間距離で正規化したもの
///
/// 耳のX座標が一致する場合は 0 とする。
pub fn yaw(pose: &PoseLandmarks) -> Option<f32> {
    let [nose, left_ear, right_ear] = LandmarkIndex::GAZE.map(|idx| pose.get(idx));
    if !(nose.is_visible() && left_ear.is_visible() && right_ear.is_visible()) {
        return None;
    }

    let mid_ear_x = (left_ear.x + right_ear.x) / 2.0;
    let ear_dist = (left_ear.x - right_ear.x).abs();
    if ear_dist == 0.0 {
        return Some(0.0);
    }
    Some((nose.x - mid_ear_x) / ear_dist)
}

/// 両方で見えているキーポイントの平均移動量。有効な点が無ければ 0
fn average_joint_delta(anchor: &PoseLandmarks, current: &PoseLandmarks) -> f32 {
    let (total, valid) = LandmarkIndex::KEY_JOINTS
        .iter()
        .map(|&idx| (anchor.get(idx), current.get(idx)))
        .filter(|(a, c)| a.is_visible() && c.is_visible())
        .fold((0.0, 0usize), |(sum, n), (a, c)| (sum + a.distance_2d(c), n + 1));

    if valid == 0 {
        0.0
    } else {
        total / valid as f32
    }
}

fn body_drift(stats: &BufferStats, anchored: (f32, f32)) -> bool {
    let dist = ((stats.mean_x - anchored.0).powi(2) + (stats.mean_y - anchored.1).powi(2)).sqrt();
    let noise_factor = (stats.std_dev * 2.0).min(MAX_NOISE_FACTOR);
    dist > COARSE_THRESHOLD + noise_factor
}
