// src/core/mod.rs
pub mod dashboard;
pub mod engine;

pub use dashboard::Dashboard;
pub use engine::StreamStateEngine;
