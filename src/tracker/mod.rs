pub mod alert;
pub mod engine;
pub mod presence;
pub mod session;
pub mod smooth;
pub mod stability;

pub use alert::AlertScheduler;
pub use engine::{Axis, EngineConfig, Limits, PostureEngine, PostureState, TimerLevel, Timers};
pub use presence::{FrameAction, PoseVerdict, PresenceTracker};
pub use session::{DailyStats, SessionTimer};
pub use smooth::PointSmoother;
pub use stability::{BufferStats, StabilityBuffer};
