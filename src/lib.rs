pub mod config;
pub mod monitor;
pub mod motion;
pub mod pose;
pub mod recording;
pub mod tracker;
