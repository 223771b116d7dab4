//! ランドマーク記録（JSON Lines）
//!
//! 1行1フレーム:
//! `{"t_ms": 1200, "motion": true, "landmarks": [[x, y, z, visibility], ...]}`
//! 人が検出されなかったフレームは `landmarks` が `null`。空行と `#` で始まる行は読み飛ばす。

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::pose::{LandmarkIndex, Point, PoseLandmarks};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub t_ms: u64,
    #[serde(default)]
    pub motion: bool,
    #[serde(default)]
    pub landmarks: Option<Vec<[f32; 4]>>,
}

impl FrameRecord {
    pub fn from_pose(t_ms: u64, motion: bool, pose: Option<&PoseLandmarks>) -> Self {
        let landmarks = pose.map(|pose| {
            pose.points
                .iter()
                .map(|p| [p.x, p.y, p.z, p.visibility])
                .collect()
        });
        Self {
            t_ms,
            motion,
            landmarks,
        }
    }

    pub fn landmarks(&self) -> Option<PoseLandmarks> {
        let raw = self.landmarks.as_ref()?;
        let points: Vec<Point> = raw
            .iter()
            .map(|&[x, y, z, visibility]| Point::new(x, y, z, visibility))
            .collect();
        PoseLandmarks::from_slice(&points)
    }
}

pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<FrameRecord>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record: FrameRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid record on line {}", line_no))?;
        if let Some(points) = &record.landmarks {
            if points.len() != LandmarkIndex::COUNT {
                bail!(
                    "Line {}: expected {} landmarks, got {}",
                    line_no,
                    LandmarkIndex::COUNT,
                    points.len()
                );
            }
        }
        records.push(record);
    }
    Ok(records)
}

pub fn write_records<W: Write>(mut writer: W, records: &[FrameRecord]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
