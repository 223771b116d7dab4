use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::motion::{FrameDiffDetector, MotionGate};
use crate::tracker::presence::DEFAULT_AWAY_TIMEOUT_MS;
use crate::tracker::session::DEFAULT_WALK_REMINDER_MS;
use crate::tracker::{EngineConfig, Limits};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// 各軸の静止上限（秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_joints_secs")]
    pub joints_secs: i64,
    #[serde(default = "default_body_secs")]
    pub body_secs: i64,
    #[serde(default = "default_gaze_secs")]
    pub gaze_secs: i64,
}

fn default_joints_secs() -> i64 { 1500 }
fn default_body_secs() -> i64 { 1800 }
fn default_gaze_secs() -> i64 { 600 }

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            joints_secs: default_joints_secs(),
            body_secs: default_body_secs(),
            gaze_secs: default_gaze_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// 姿勢ドリフトの感度 (0〜100)
    #[serde(default = "default_sensitivity")]
    pub sensitivity: i64,
    /// 画素差分の感度 (0〜100)
    #[serde(default = "default_motion_sensitivity")]
    pub motion_sensitivity: i64,
}

fn default_sensitivity() -> i64 { 50 }
fn default_motion_sensitivity() -> i64 { 60 }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            motion_sensitivity: default_motion_sensitivity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// 画面が静止してから在席確認するまでの秒数
    #[serde(default = "default_away_timeout_secs")]
    pub away_timeout_secs: i64,
}

fn default_away_timeout_secs() -> i64 { (DEFAULT_AWAY_TIMEOUT_MS / 1000) as i64 }

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            away_timeout_secs: default_away_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 休憩リマインダーの間隔（秒）
    #[serde(default = "default_walk_reminder_secs")]
    pub walk_reminder_secs: i64,
}

fn default_walk_reminder_secs() -> i64 { (DEFAULT_WALK_REMINDER_MS / 1000) as i64 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            walk_reminder_secs: default_walk_reminder_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            detection: DetectionConfig::default(),
            presence: PresenceConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// 時間設定の上限（7日）
pub const MAX_DURATION_SECS: i64 = 7 * 24 * 60 * 60;

fn clamp_secs(secs: i64) -> i64 {
    secs.clamp(1, MAX_DURATION_SECS)
}

fn secs_to_ms(secs: i64) -> u64 {
    clamp_secs(secs) as u64 * 1000
}

fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// ファイルが無い、または読めない場合は既定値
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!("{} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// 範囲外の値を丸める。感度は 0〜100、時間は1秒〜7日
    pub fn sanitized(&self) -> Self {
        Self {
            limits: LimitsConfig {
                joints_secs: clamp_secs(self.limits.joints_secs),
                body_secs: clamp_secs(self.limits.body_secs),
                gaze_secs: clamp_secs(self.limits.gaze_secs),
            },
            detection: DetectionConfig {
                sensitivity: self.detection.sensitivity.clamp(0, 100),
                motion_sensitivity: self.detection.motion_sensitivity.clamp(0, 100),
            },
            presence: PresenceConfig {
                away_timeout_secs: clamp_secs(self.presence.away_timeout_secs),
            },
            session: SessionConfig {
                walk_reminder_secs: clamp_secs(self.session.walk_reminder_secs),
            },
        }
    }

    pub fn limits(&self) -> Limits {
        Limits {
            joints_ms: secs_to_ms(self.limits.joints_secs),
            body_ms: secs_to_ms(self.limits.body_secs),
            gaze_ms: secs_to_ms(self.limits.gaze_secs),
        }
    }

    pub fn sensitivity(&self) -> u8 {
        clamp_percent(self.detection.sensitivity)
    }

    pub fn motion_sensitivity(&self) -> u8 {
        clamp_percent(self.detection.motion_sensitivity)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            limits: self.limits(),
            sensitivity: self.sensitivity(),
        }
    }

    /// `motion_sensitivity` を反映した差分検出器
    pub fn motion_detector(&self) -> FrameDiffDetector {
        let mut detector = FrameDiffDetector::new();
        detector.update_sensitivity(self.motion_sensitivity());
        detector
    }

    pub fn away_timeout_ms(&self) -> u64 {
        secs_to_ms(self.presence.away_timeout_secs)
    }

    pub fn walk_reminder_ms(&self) -> u64 {
        secs_to_ms(self.session.walk_reminder_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.limits(), Limits::default());
        assert_eq!(config.sensitivity(), 50);
        assert_eq!(config.motion_sensitivity(), 60);
        assert_eq!(config.away_timeout_ms(), 300_000);
        assert_eq!(config.walk_reminder_ms(), 1_800_000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [limits]
            gaze_secs = 20

            [detection]
            sensitivity = 80
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.gaze_secs, 20);
        assert_eq!(config.limits.joints_secs, 1500);
        assert_eq!(config.detection.sensitivity, 80);
        assert_eq!(config.detection.motion_sensitivity, 60);
        assert_eq!(config.presence, PresenceConfig::default());
    }

    #[test]
    fn test_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config: Config = toml::from_str(
            r#"
            [limits]
            joints_secs = -5
            body_secs = 0

            [detection]
            sensitivity = 250
            motion_sensitivity = -3
            "#,
        )
        .unwrap();
        assert_eq!(config.sensitivity(), 100);
        assert_eq!(config.motion_sensitivity(), 0);
        assert_eq!(config.limits().joints_ms, 1000);
        assert_eq!(config.limits().body_ms, 1000);

        let sanitized = config.sanitized();
        assert_eq!(sanitized.detection.sensitivity, 100);
        assert_eq!(sanitized.limits.joints_secs, 1);
    }

    #[test]
    fn test_huge_durations_are_capped() {
        let config: Config = toml::from_str(
            r#"
            [limits]
            body_secs = 9223372036854775807

            [presence]
            away_timeout_secs = 9223372036854775807
            "#,
        )
        .unwrap();
        let max_ms = MAX_DURATION_SECS as u64 * 1000;
        assert_eq!(config.limits().body_ms, max_ms);
        assert_eq!(config.away_timeout_ms(), max_ms);
        assert_eq!(config.sanitized().limits.body_secs, MAX_DURATION_SECS);

        let monitor = crate::monitor::Monitor::new(&config, 0);
        assert_eq!(monitor.engine().limit_ms(crate::tracker::Axis::Body), max_ms);
    }

    #[test]
    fn test_motion_detector_uses_motion_sensitivity() {
        let mut config = Config::default();
        config.detection.motion_sensitivity = 100;
        let (threshold, percent) = config.motion_detector().thresholds();
        assert!((threshold - 10.5).abs() < 1e-4);
        assert!((percent - 0.0055).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("posture_drift_config_{}.toml", std::process::id()));
        let mut config = Config::default();
        config.limits.body_secs = 900;
        config.detection.motion_sensitivity = 75;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_or_default_on_bad_file() {
        let path = std::env::temp_dir().join(format!("posture_drift_bad_{}.toml", std::process::id()));
        std::fs::write(&path, "limits = [").unwrap();
        assert_eq!(Config::load_or_default(&path), Config::default());
        std::fs::remove_file(&path).ok();
    }
}
