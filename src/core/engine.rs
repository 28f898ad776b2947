// src/core/engine.rs
use crate::connectors::traits::AlertAcker;
use crate::core::dashboard::Dashboard;
use crate::types::{ConnectionState, EngineCommand, StreamEvent};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

const ACKNOWLEDGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Single writer over the dashboard.
///
/// Folds stream events, renderer commands and connectivity changes into
/// the view-model, in the order they arrive, and publishes a snapshot
/// after every change. Stops when either input channel closes.
pub struct StreamStateEngine {
    dashboard: Dashboard,
    events: mpsc::Receiver<StreamEvent>,
    commands: mpsc::Receiver<EngineCommand>,
    connection: watch::Receiver<ConnectionState>,
    snapshot_tx: watch::Sender<Dashboard>,
    acker: Box<dyn AlertAcker>,
    hook_timeout: Duration,
}

impl StreamStateEngine {
    pub fn new(
        dashboard: Dashboard,
        events: mpsc::Receiver<StreamEvent>,
        commands: mpsc::Receiver<EngineCommand>,
        connection: watch::Receiver<ConnectionState>,
        acker: Box<dyn AlertAcker>,
    ) -> (Self, watch::Receiver<Dashboard>) {
        let (snapshot_tx, snapshots) = watch::channel(dashboard.clone());
        let engine = Self {
            dashboard,
            events,
            commands,
            connection,
            snapshot_tx,
            acker,
            hook_timeout: ACKNOWLEDGE_TIMEOUT,
        };
        (engine, snapshots)
    }

    /// Overrides the bound on a single acknowledge hook call.
    pub fn set_acknowledge_timeout(&mut self, limit: Duration) {
        self.hook_timeout = limit;
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let initial = *self.connection.borrow_and_update();
        self.dashboard.set_connection(initial);
        self.publish();

        let mut conn_alive = true;
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => break,
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                changed = self.connection.changed(), if conn_alive => match changed {
                    Ok(()) => {
                        let state = *self.connection.borrow();
                        self.dashboard.set_connection(state);
                        self.publish();
                    }
                    Err(_) => conn_alive = false,
                },
            }
        }

        info!("Engine stopped");
        Ok(())
    }

    fn on_event(&mut self, event: StreamEvent) {
        let applied = match event {
            StreamEvent::Price(tick) => self.dashboard.apply_tick(&tick, Instant::now()),
            StreamEvent::Alert(alert) => self.dashboard.apply_alert(alert),
        };
        if applied {
            self.publish();
        }
    }

    async fn on_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::AcknowledgeAlert(alert_id) => {
                if self.dashboard.acknowledge(alert_id) {
                    self.publish();
                    // The view is already updated; a failed or stalled hook
                    // only logs, bounded so it cannot hold up the fold loop.
                    let hook = self.acker.acknowledge(alert_id);
                    match tokio::time::timeout(self.hook_timeout, hook).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!("Acknowledge hook failed for alert {}: {}", alert_id, e);
                        }
                        Err(_) => {
                            warn!("Acknowledge hook timed out for alert {}", alert_id);
                        }
                    }
                }
            }
            EngineCommand::ResetAlertCounter => {
                self.dashboard.reset_alert_counter();
                self.publish();
            }
        }
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.dashboard.clone());
    }
}
