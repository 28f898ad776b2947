// src/connectors/mod.rs
pub mod backoff;
pub mod gateway;
pub mod messages;
pub mod subscription;
pub mod traits;
