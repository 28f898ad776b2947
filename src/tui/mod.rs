// src/tui/mod.rs
use crate::core::Dashboard;
use crate::types::{ConnectionState, EngineCommand, Trend};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, GraphType, List, ListItem, ListState,
        Paragraph, Row, Table,
    },
    Terminal,
};
use rust_decimal::prelude::ToPrimitive;
use std::{
    io,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// What the user asked for when the screen closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    Quit,
    Logout,
}

struct App {
    snapshot: Dashboard,
    alert_state: ListState,
}

impl App {
    fn new(snapshot: Dashboard) -> Self {
        Self {
            snapshot,
            alert_state: ListState::default(),
        }
    }

    fn selected_alert_id(&self) -> Option<i64> {
        let index = self.alert_state.selected()?;
        self.snapshot.alerts().nth(index).and_then(|a| a.id)
    }

    fn select_next(&mut self) {
        let count = self.snapshot.alert_count();
        if count == 0 {
            return;
        }
        let next = match self.alert_state.selected() {
            Some(i) if i + 1 < count => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.alert_state.select(Some(next));
    }

    fn select_prev(&mut self) {
        if self.snapshot.alert_count() == 0 {
            return;
        }
        let prev = match self.alert_state.selected() {
            Some(i) if i > 0 => i - 1,
            _ => 0,
        };
        self.alert_state.select(Some(prev));
    }

    /// Keeps the selection valid after the feed shifted under it.
    fn clamp_selection(&mut self) {
        let count = self.snapshot.alert_count();
        match self.alert_state.selected() {
            Some(_) if count == 0 => self.alert_state.select(None),
            Some(i) if i >= count => self.alert_state.select(Some(count - 1)),
            _ => {}
        }
    }
}

pub async fn run(
    mut snapshots: watch::Receiver<Dashboard>,
    commands: mpsc::Sender<EngineCommand>,
) -> anyhow::Result<ExitAction> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(snapshots.borrow_and_update().clone());

    let action = loop {
        terminal.draw(|f| ui(f, &mut app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') => break ExitAction::Quit,
                    KeyCode::Char('l') => break ExitAction::Logout,
                    KeyCode::Char('a') => {
                        if let Some(alert_id) = app.selected_alert_id() {
                            send_command(&commands, EngineCommand::AcknowledgeAlert(alert_id));
                        }
                    }
                    KeyCode::Char('r') => {
                        send_command(&commands, EngineCommand::ResetAlertCounter)
                    }
                    KeyCode::Up => app.select_prev(),
                    KeyCode::Down => app.select_next(),
                    _ => {}
                }
            }
        }

        match snapshots.has_changed() {
            Ok(true) => {
                app.snapshot = snapshots.borrow_and_update().clone();
                app.clamp_selection();
            }
            Ok(false) => {}
            Err(_) => break ExitAction::Quit,
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(action)
}

fn send_command(commands: &mpsc::Sender<EngineCommand>, command: EngineCommand) {
    match commands.try_send(command) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => warn!("Command channel full, dropping input"),
        Err(mpsc::error::TrySendError::Closed(_)) => warn!("Engine is gone, dropping input"),
    }
}

fn ui(f: &mut ratatui::Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(12),
                Constraint::Length(9),
            ]
            .as_ref(),
        )
        .split(f.size());

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(chunks[1]);

    render_header(f, app, chunks[0]);
    render_price_table(f, app, middle[0]);
    render_chart(f, app, middle[1]);
    render_alerts(f, app, chunks[2]);
}

fn render_header(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let (dot, color) = match app.snapshot.connection() {
        ConnectionState::Connected => ("●", Color::Green),
        ConnectionState::Connecting => ("◌", Color::Yellow),
        ConnectionState::Disconnected => ("○", Color::Red),
    };
    let username = if app.snapshot.username().is_empty() {
        "-"
    } else {
        app.snapshot.username()
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled("QuoteWatch", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" | 👤 {} | ", username)),
        Span::styled(
            format!("{} {}", dot, app.snapshot.connection().label()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " | alerts seen: {}",
            app.snapshot.alerts_seen()
        )),
        Span::raw(" | q quit  l logout  a ack  r reset  ↑/↓ select"),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(header, area);
}

fn render_price_table(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let now = Instant::now();
    let header = Row::new(vec!["Symbol", "Name", "Price", "Volume", "Trend", "Updated"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .snapshot
        .catalog()
        .iter()
        .map(|symbol| {
            let view = app.snapshot.view(&symbol.code);

            let price = view
                .and_then(|v| v.last_price)
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            let volume = view
                .and_then(|v| v.last_volume)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            let updated = view
                .and_then(|v| v.last_observed_at)
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());

            let trend = match view.map(|v| v.trend).unwrap_or_default() {
                Trend::Up => Span::styled("▲", Style::default().fg(Color::Green)),
                Trend::Down => Span::styled("▼", Style::default().fg(Color::Red)),
                Trend::Flat => Span::styled("·", Style::default().fg(Color::DarkGray)),
            };

            let price_style = if view.map(|v| v.flash_active(now)).unwrap_or(false) {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(symbol.code.clone()),
                Cell::from(symbol.name.clone()),
                Cell::from(Span::styled(price, price_style)),
                Cell::from(volume),
                Cell::from(trend),
                Cell::from(updated),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Min(14),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(5),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("Symbols"));
    f.render_widget(table, area);
}

fn render_chart(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{} price", app.snapshot.tracked_symbol()));

    let chart_data: Vec<(f64, f64)> = app
        .snapshot
        .chart()
        .points()
        .enumerate()
        .map(|(i, p)| (i as f64, p.value.to_f64().unwrap_or(0.0)))
        .collect();

    if chart_data.len() < 2 {
        let placeholder = Paragraph::new("Waiting for ticks...").block(block);
        f.render_widget(placeholder, area);
        return;
    }

    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for (_, value) in &chart_data {
        min = min.min(*value);
        max = max.max(*value);
    }
    let (lower, upper) = if (max - min).abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        let pad = (max - min) * 0.05;
        (min - pad, max + pad)
    };

    let x_labels = vec![
        Span::raw(
            app.snapshot
                .chart()
                .first()
                .map(|p| p.label.clone())
                .unwrap_or_default(),
        ),
        Span::raw(
            app.snapshot
                .chart()
                .last()
                .map(|p| p.label.clone())
                .unwrap_or_default(),
        ),
    ];

    let dataset = Dataset::default()
        .name(app.snapshot.tracked_symbol().to_string())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&chart_data);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, (chart_data.len() - 1) as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([lower, upper])
                .labels(vec![
                    Span::raw(format!("{lower:.2}")),
                    Span::raw(format!("{upper:.2}")),
                ]),
        );
    f.render_widget(chart, area);
}

fn render_alerts(f: &mut ratatui::Frame, app: &mut App, area: Rect) {
    let items: Vec<ListItem> = app
        .snapshot
        .alerts()
        .map(|alert| {
            let mark = if alert.acknowledged { "✔" } else { " " };
            let text = format!(
                "{} {} {:<6} {:<10} {}",
                mark,
                alert.triggered_at.format("%H:%M:%S"),
                alert.symbol_code,
                alert.kind,
                alert.detail
            );
            let style = if alert.acknowledged {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::Yellow)
            };
            ListItem::new(Line::from(Span::styled(text, style)))
        })
        .collect();

    let title = format!("Alerts ({} seen)", app.snapshot.alerts_seen());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, &mut app.alert_state);
}
