use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use posture_drift::config::Config;
use posture_drift::monitor::{FrameOutcome, Monitor, MonitorUpdate, Notification};
use posture_drift::recording::read_records;
use posture_drift::tracker::Axis;

const CONFIG_PATH: &str = "config.toml";
const VERSION: &str = env!("POSTURE_DRIFT_VERSION");

#[derive(Parser, Debug)]
#[command(
    name = "posture-drift",
    version = VERSION,
    about = "同じ姿勢が長く続いたことを検出する"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// ランドマーク記録 (JSON Lines) を再生して判定する
    Replay {
        recording: PathBuf,

        #[arg(short, long, default_value = CONFIG_PATH)]
        config: PathBuf,

        /// 判定した全フレームを JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// デフォルト設定を書き出す
    InitConfig {
        #[arg(default_value = CONFIG_PATH)]
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct JsonFrame<'a> {
    t_ms: u64,
    #[serde(flatten)]
    update: &'a MonitorUpdate,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Replay {
            recording,
            config,
            json,
        } => replay(&recording, &config, json),
        Command::InitConfig { path } => init_config(&path),
    }
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} は既に存在します", path.display());
    }
    Config::default().save(path)?;
    println!("デフォルト設定を書き出しました: {}", path.display());
    Ok(())
}

fn replay(recording: &Path, config_path: &Path, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path).sanitized();
    let file = File::open(recording)
        .with_context(|| format!("Failed to open recording {}", recording.display()))?;
    let records = read_records(BufReader::new(file))
        .with_context(|| format!("Failed to read recording {}", recording.display()))?;

    if !json {
        println!("=== Posture Drift {} ===", VERSION);
        println!("記録: {} ({} フレーム)", recording.display(), records.len());
        println!(
            "上限: 関節 {}秒, 体幹 {}秒, 視線 {}秒 / 感度 {}",
            config.limits.joints_secs,
            config.limits.body_secs,
            config.limits.gaze_secs,
            config.sensitivity()
        );
        let (threshold, percent) = config.motion_detector().thresholds();
        println!(
            "動き検出: 画素差 {:.1} / 変化率 {:.2}% (感度 {})",
            threshold,
            percent * 100.0,
            config.motion_sensitivity()
        );
        println!();
    }

    let Some(first) = records.first() else {
        println!("記録が空です");
        return Ok(());
    };

    let mut monitor = Monitor::new(&config, first.t_ms);
    monitor.start(first.t_ms);

    let mut last = None;
    for record in &records {
        let update = match monitor.on_frame(record.motion, record.t_ms) {
            FrameOutcome::DetectPose => monitor.on_pose(record.landmarks().as_ref(), record.t_ms),
            FrameOutcome::Evaluated(update) => Some(update),
            FrameOutcome::Paused | FrameOutcome::Idle => None,
        };
        let Some(update) = update else {
            continue;
        };

        if json {
            let frame = JsonFrame {
                t_ms: record.t_ms,
                update: &update,
            };
            println!("{}", serde_json::to_string(&frame)?);
        } else {
            for notification in &update.notifications {
                println!("[{:>8.1}s] {}", elapsed_secs(first.t_ms, record.t_ms), describe(notification));
            }
        }
        last = Some(update);
    }

    let end_ms = records.last().map_or(first.t_ms, |r| r.t_ms);
    monitor.stop(end_ms);

    if json {
        return Ok(());
    }

    println!();
    match last {
        Some(update) => {
            let timers = update.state.timers;
            println!(
                "最終タイマー: 関節 {:.1}秒, 体幹 {:.1}秒, 視線 {:.1}秒",
                timers.joints, timers.body, timers.gaze
            );
            match update.state.alert {
                Some(axis) => println!("アラート中: {}", axis),
                None => println!("アラート中: なし"),
            }
        }
        None => println!("判定したフレームがありません"),
    }
    let stats = monitor.stats();
    println!(
        "通知: {}回 / モニタリング {:.1}秒{}",
        stats.alerts,
        stats.monitoring_ms as f64 / 1000.0,
        if monitor.is_away() { "（終了時は離席中）" } else { "" }
    );
    Ok(())
}

fn elapsed_secs(start_ms: u64, now_ms: u64) -> f64 {
    now_ms.saturating_sub(start_ms) as f64 / 1000.0
}

fn describe(notification: &Notification) -> &'static str {
    match notification {
        Notification::Posture(Axis::Body) => "体幹が長時間静止しています。立ち上がって体を動かしましょう",
        Notification::Posture(Axis::Joints) => "関節が長時間静止しています。腕や肩をストレッチしましょう",
        Notification::Posture(Axis::Gaze) => "視線が長時間固定されています。画面から目を離しましょう",
        Notification::Walk => "長時間続けて作業しています。少し歩きましょう",
    }
}
