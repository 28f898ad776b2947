// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Stock,
    Crypto,
    Forex,
    Other,
}

impl SymbolKind {
    /// Maps the catalog's wire string; anything unrecognized lands in Other.
    pub fn from_wire(kind: Option<&str>) -> Self {
        match kind {
            Some("STOCK") => SymbolKind::Stock,
            Some("CRYPTO") => SymbolKind::Crypto,
            Some("FOREX") => SymbolKind::Forex,
            _ => SymbolKind::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SymbolKind::Stock => "STOCK",
            SymbolKind::Crypto => "CRYPTO",
            SymbolKind::Forex => "FOREX",
            SymbolKind::Other => "OTHER",
        }
    }
}

/// Catalog entry. Loaded once per session, immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
    pub kind: SymbolKind,
}

/// One live price update from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub symbol_code: String,
    pub price: Decimal,
    pub volume: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

/// One alert from the stream. Only `acknowledged` ever changes after arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: Option<i64>,
    pub symbol_code: String,
    pub kind: String,
    pub threshold: Option<Decimal>,
    pub detail: String,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Direction of the last price move relative to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trend {
    Up,
    Down,
    #[default]
    Flat,
}

/// Per-symbol display state. `flash_until` is a deadline, not a timer:
/// the highlight is "active" while now is before it, and a newer tick
/// simply overwrites it, so highlights restart instead of stacking.
#[derive(Debug, Clone, Default)]
pub struct SymbolViewState {
    pub last_price: Option<Decimal>,
    pub trend: Trend,
    pub last_volume: Option<i64>,
    pub last_observed_at: Option<DateTime<Utc>>,
    pub(crate) flash_until: Option<Instant>,
}

impl SymbolViewState {
    pub fn flash_active(&self, now: Instant) -> bool {
        self.flash_until.map_or(false, |deadline| now < deadline)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: Decimal,
}

/// Bounded FIFO of chart points: push at the tail, evict at the head,
/// never reorder.
#[derive(Debug, Clone)]
pub struct ChartSeries {
    points: VecDeque<ChartPoint>,
    capacity: usize,
}

impl ChartSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: ChartPoint) {
        if self.capacity == 0 {
            return;
        }
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn points(&self) -> impl Iterator<Item = &ChartPoint> + '_ {
        self.points.iter()
    }

    pub fn first(&self) -> Option<&ChartPoint> {
        self.points.front()
    }

    pub fn last(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Connectivity as observed by the rest of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "offline",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "live",
        }
    }
}

/// Everything the stream can deliver, in one ordered channel.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Price(PriceTick),
    Alert(Alert),
}

/// Requests the renderer can make of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    AcknowledgeAlert(i64),
    ResetAlertCounter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn symbol_kind_maps_wire_strings() {
        assert_eq!(SymbolKind::from_wire(Some("STOCK")), SymbolKind::Stock);
        assert_eq!(SymbolKind::from_wire(Some("CRYPTO")), SymbolKind::Crypto);
        assert_eq!(SymbolKind::from_wire(Some("FOREX")), SymbolKind::Forex);
        assert_eq!(SymbolKind::from_wire(Some("BOND")), SymbolKind::Other);
        assert_eq!(SymbolKind::from_wire(None), SymbolKind::Other);
    }

    #[test]
    fn chart_series_evicts_oldest_first() {
        let mut series = ChartSeries::new(3);
        for i in 1..=5 {
            series.push(ChartPoint {
                label: format!("t{i}"),
                value: Decimal::from(i),
            });
        }
        assert_eq!(series.len(), 3);
        let labels: Vec<&str> = series.points().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["t3", "t4", "t5"]);
    }

    #[test]
    fn chart_series_zero_capacity_stays_empty() {
        let mut series = ChartSeries::new(0);
        series.push(ChartPoint {
            label: "t".to_string(),
            value: Decimal::ONE,
        });
        assert!(series.is_empty());
    }

    #[test]
    fn flash_is_active_until_deadline_only() {
        let now = Instant::now();
        let mut view = SymbolViewState::default();
        assert!(!view.flash_active(now));

        view.flash_until = Some(now + Duration::from_millis(1000));
        assert!(view.flash_active(now + Duration::from_millis(999)));
        assert!(!view.flash_active(now + Duration::from_millis(1000)));
        assert!(!view.flash_active(now + Duration::from_millis(1500)));
    }

    #[test]
    fn trend_defaults_to_flat() {
        assert_eq!(Trend::default(), Trend::Flat);
    }
}
