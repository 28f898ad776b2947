// src/core/dashboard.rs
use crate::types::{
    Alert, ChartPoint, ChartSeries, ConnectionState, PriceTick, Symbol, SymbolViewState, Trend,
};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::trace;

/// The whole view-model in one value.
///
/// Only the engine mutates it; everyone else reads cloned snapshots.
/// Connectivity is a field like any other, so connection churn never
/// touches prices, the chart or the alert feed.
#[derive(Debug, Clone)]
pub struct Dashboard {
    username: String,
    connection: ConnectionState,
    catalog: Vec<Symbol>,
    views: HashMap<String, SymbolViewState>,
    tracked_symbol: String,
    chart: ChartSeries,
    alerts: VecDeque<Alert>,
    alert_capacity: usize,
    alerts_seen: u64,
    flash_decay: Duration,
}

impl Dashboard {
    pub fn new(
        tracked_symbol: &str,
        chart_capacity: usize,
        alert_capacity: usize,
        flash_decay: Duration,
    ) -> Self {
        Self {
            username: String::new(),
            connection: ConnectionState::default(),
            catalog: Vec::new(),
            views: HashMap::new(),
            tracked_symbol: tracked_symbol.to_string(),
            chart: ChartSeries::new(chart_capacity),
            alerts: VecDeque::new(),
            alert_capacity,
            alerts_seen: 0,
            flash_decay,
        }
    }

    pub fn set_username(&mut self, username: &str) {
        self.username = username.to_string();
    }

    /// Installs the symbol catalog and seeds one empty view per symbol.
    /// Seeded views have no price yet and a flat trend.
    pub fn seed_catalog(&mut self, symbols: Vec<Symbol>) {
        self.views = symbols
            .iter()
            .map(|s| (s.code.clone(), SymbolViewState::default()))
            .collect();
        self.catalog = symbols;
    }

    /// Folds one price tick in. Ticks for symbols outside the catalog
    /// are dropped. Returns whether anything changed.
    pub fn apply_tick(&mut self, tick: &PriceTick, now: Instant) -> bool {
        let view = match self.views.get_mut(&tick.symbol_code) {
            Some(view) => view,
            None => {
                trace!("Ignoring tick for unknown symbol {}", tick.symbol_code);
                return false;
            }
        };

        view.trend = match view.last_price {
            Some(previous) if tick.price > previous => Trend::Up,
            Some(previous) if tick.price < previous => Trend::Down,
            _ => Trend::Flat,
        };
        view.last_price = Some(tick.price);
        view.last_volume = tick.volume;
        view.last_observed_at = Some(tick.observed_at);
        view.flash_until = Some(now + self.flash_decay);

        if tick.symbol_code == self.tracked_symbol {
            self.chart.push(ChartPoint {
                label: tick.observed_at.format("%H:%M:%S").to_string(),
                value: tick.price,
            });
        }
        true
    }

    /// Prepends one alert, newest first, trimming the tail past the cap.
    /// Alerts for unknown symbols are dropped. Returns whether anything
    /// changed.
    pub fn apply_alert(&mut self, alert: Alert) -> bool {
        if !self.views.contains_key(&alert.symbol_code) {
            trace!("Ignoring alert for unknown symbol {}", alert.symbol_code);
            return false;
        }

        self.alerts.push_front(alert);
        while self.alerts.len() > self.alert_capacity {
            self.alerts.pop_back();
        }
        self.alerts_seen += 1;
        true
    }

    /// Flips the acknowledged flag on the matching alert, if it is still
    /// in the feed.
    pub fn acknowledge(&mut self, alert_id: i64) -> bool {
        for alert in self.alerts.iter_mut() {
            if alert.id == Some(alert_id) {
                alert.acknowledged = true;
                return true;
            }
        }
        false
    }

    /// Resets the running alert counter. The feed itself stays.
    pub fn reset_alert_counter(&mut self) {
        self.alerts_seen = 0;
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    // --- Read side ---

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn catalog(&self) -> &[Symbol] {
        &self.catalog
    }

    pub fn view(&self, code: &str) -> Option<&SymbolViewState> {
        self.views.get(code)
    }

    pub fn tracked_symbol(&self) -> &str {
        &self.tracked_symbol
    }

    pub fn chart(&self) -> &ChartSeries {
        &self.chart
    }

    /// Alerts newest first.
    pub fn alerts(&self) -> impl Iterator<Item = &Alert> + '_ {
        self.alerts.iter()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn alerts_seen(&self) -> u64 {
        self.alerts_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn symbol(code: &str) -> Symbol {
        Symbol {
            id: None,
            code: code.to_string(),
            name: format!("{code} Inc."),
            kind: crate::types::SymbolKind::Stock,
        }
    }

    fn tick(code: &str, price: i64, second: u32) -> PriceTick {
        PriceTick {
            symbol_code: code.to_string(),
            price: Decimal::from(price),
            volume: Some(100),
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, second).unwrap(),
        }
    }

    fn alert(id: i64, code: &str) -> Alert {
        Alert {
            id: Some(id),
            symbol_code: code.to_string(),
            kind: "PRICE_ABOVE".to_string(),
            threshold: Some(Decimal::from(100)),
            detail: format!("alert {id}"),
            triggered_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap(),
            acknowledged: false,
        }
    }

    fn dashboard() -> Dashboard {
        let mut board = Dashboard::new("AAPL", 20, 10, Duration::from_millis(1000));
        board.seed_catalog(vec![symbol("AAPL"), symbol("BTC"), symbol("EURUSD")]);
        board
    }

    #[test]
    fn seeded_views_start_without_price_and_flat() {
        let board = dashboard();
        assert_eq!(board.catalog().len(), 3);
        let view = board.view("AAPL").unwrap();
        assert_eq!(view.last_price, None);
        assert_eq!(view.trend, Trend::Flat);
        assert!(board.chart().is_empty());
    }

    #[test]
    fn trend_follows_price_direction() {
        let mut board = dashboard();
        let now = Instant::now();
        let prices = [100, 105, 105, 95];
        let expected = [Trend::Flat, Trend::Up, Trend::Flat, Trend::Down];

        for (i, (price, want)) in prices.iter().zip(expected.iter()).enumerate() {
            board.apply_tick(&tick("AAPL", *price, i as u32), now);
            assert_eq!(board.view("AAPL").unwrap().trend, *want, "tick {i}");
        }
    }

    #[test]
    fn chart_keeps_last_twenty_points_in_arrival_order() {
        let mut board = dashboard();
        let now = Instant::now();
        for i in 1..=25 {
            board.apply_tick(&tick("AAPL", i, (i % 60) as u32), now);
        }

        assert_eq!(board.chart().len(), 20);
        let values: Vec<Decimal> = board.chart().points().map(|p| p.value).collect();
        let expected: Vec<Decimal> = (6..=25).map(Decimal::from).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn chart_only_tracks_configured_symbol() {
        let mut board = dashboard();
        let now = Instant::now();
        board.apply_tick(&tick("BTC", 65000, 0), now);
        board.apply_tick(&tick("AAPL", 150, 1), now);
        board.apply_tick(&tick("EURUSD", 1, 2), now);

        assert_eq!(board.chart().len(), 1);
        assert_eq!(
            board.chart().first().unwrap().value,
            Decimal::from(150)
        );
    }

    #[test]
    fn chart_labels_use_clock_time() {
        let mut board = dashboard();
        board.apply_tick(&tick("AAPL", 150, 42), Instant::now());
        assert_eq!(board.chart().first().unwrap().label, "10:00:42");
    }

    #[test]
    fn alert_feed_keeps_newest_n_in_prepend_order() {
        let mut board = dashboard();
        // Capacity is 10; insert 15.
        for id in 1..=15 {
            assert!(board.apply_alert(alert(id, "BTC")));
        }

        assert_eq!(board.alert_count(), 10);
        assert_eq!(board.alerts_seen(), 15);
        let ids: Vec<i64> = board.alerts().map(|a| a.id.unwrap()).collect();
        let expected: Vec<i64> = (6..=15).rev().collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn unknown_symbol_tick_is_a_no_op() {
        let mut board = dashboard();
        let now = Instant::now();
        board.apply_tick(&tick("AAPL", 150, 0), now);

        assert!(!board.apply_tick(&tick("TSLA", 200, 1), now));
        assert!(board.view("TSLA").is_none());
        assert_eq!(board.catalog().len(), 3);
        assert_eq!(board.chart().len(), 1);
        assert_eq!(
            board.view("AAPL").unwrap().last_price,
            Some(Decimal::from(150))
        );
    }

    #[test]
    fn unknown_symbol_alert_is_a_no_op() {
        let mut board = dashboard();
        assert!(!board.apply_alert(alert(1, "TSLA")));
        assert_eq!(board.alert_count(), 0);
        assert_eq!(board.alerts_seen(), 0);
    }

    #[test]
    fn connection_changes_leave_view_state_alone() {
        let mut board = dashboard();
        let now = Instant::now();
        board.apply_tick(&tick("AAPL", 150, 0), now);
        board.apply_alert(alert(1, "BTC"));

        board.set_connection(ConnectionState::Disconnected);
        board.set_connection(ConnectionState::Connecting);
        board.set_connection(ConnectionState::Connected);

        assert_eq!(board.connection(), ConnectionState::Connected);
        assert_eq!(
            board.view("AAPL").unwrap().last_price,
            Some(Decimal::from(150))
        );
        assert_eq!(board.chart().len(), 1);
        assert_eq!(board.alert_count(), 1);
        assert_eq!(board.alerts_seen(), 1);
    }

    #[test]
    fn flash_restarts_instead_of_stacking() {
        let mut board = dashboard();
        let t0 = Instant::now();

        board.apply_tick(&tick("AAPL", 150, 0), t0);
        let first_deadline = board.view("AAPL").unwrap().flash_until.unwrap();
        assert_eq!(first_deadline, t0 + Duration::from_millis(1000));

        // A second tick 600ms in moves the deadline, it does not add to it.
        let t1 = t0 + Duration::from_millis(600);
        board.apply_tick(&tick("AAPL", 151, 1), t1);
        let second_deadline = board.view("AAPL").unwrap().flash_until.unwrap();
        assert_eq!(second_deadline, t1 + Duration::from_millis(1000));

        let view = board.view("AAPL").unwrap();
        assert!(view.flash_active(t1 + Duration::from_millis(999)));
        assert!(!view.flash_active(t1 + Duration::from_millis(1000)));
    }

    #[test]
    fn acknowledge_flips_only_the_matching_alert() {
        let mut board = dashboard();
        board.apply_alert(alert(1, "BTC"));
        board.apply_alert(alert(2, "AAPL"));

        assert!(board.acknowledge(2));
        let by_id: Vec<(i64, bool)> = board
            .alerts()
            .map(|a| (a.id.unwrap(), a.acknowledged))
            .collect();
        assert_eq!(by_id, vec![(2, true), (1, false)]);

        assert!(!board.acknowledge(99));
    }

    #[test]
    fn counter_reset_keeps_the_feed() {
        let mut board = dashboard();
        board.apply_alert(alert(1, "BTC"));
        board.apply_alert(alert(2, "BTC"));

        board.reset_alert_counter();
        assert_eq!(board.alerts_seen(), 0);
        assert_eq!(board.alert_count(), 2);

        // Counting resumes from zero.
        board.apply_alert(alert(3, "BTC"));
        assert_eq!(board.alerts_seen(), 1);
    }

    #[test]
    fn reseeding_catalog_resets_views() {
        let mut board = dashboard();
        board.apply_tick(&tick("AAPL", 150, 0), Instant::now());

        board.seed_catalog(vec![symbol("AAPL"), symbol("MSFT")]);
        assert_eq!(board.view("AAPL").unwrap().last_price, None);
        assert!(board.view("BTC").is_none());
        assert!(board.view("MSFT").is_some());
    }
}
