pub mod calibrate;
pub mod chart;
pub mod clear;
pub mod config;
pub mod db;
pub mod estimate;
pub mod model;
pub mod pipeline;
pub mod rank;
pub mod report;

/// Application name for XDG paths
pub const APP_NAME: &str = "lampfit";
