// src/lib.rs
//! Terminal dashboard for a market data gateway.
//!
//! Logs in over REST, pulls the symbol catalog, then follows the price
//! and alert topics over one websocket connection. A single engine task
//! owns the view-model and publishes snapshots for the TUI to draw.

pub mod config;
pub mod connectors;
pub mod core;
pub mod session;
pub mod tui;
pub mod types;
