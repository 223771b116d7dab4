pub mod landmark;

pub use landmark::{LandmarkIndex, Point, PoseLandmarks, VISIBILITY_THRESHOLD};
