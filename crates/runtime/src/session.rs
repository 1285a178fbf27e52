use std::time::Duration;

use core_sim::{
    Action, ActionOutcome, EngineState, RenderSnapshot, SimError, SimulationController,
    StatusSnapshot, Trade,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::logging::{RunLogEvent, RunLogEventKind, RunLogWriter};

const COMMAND_QUEUE_DEPTH: usize = 64;
const EVENT_QUEUE_DEPTH: usize = 256;
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("simulation session has shut down")]
    Closed,
    #[error(transparent)]
    Rejected(#[from] SimError),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SessionEvent {
    Tick { snapshot: RenderSnapshot },
    Action { outcome: ActionOutcome },
    Stopped { status: StatusSnapshot },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub status: StatusSnapshot,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Number of trailing samples carried by each tick event; `None` sends
    /// the whole history.
    pub snapshot_window: Option<usize>,
}

enum Control {
    Pause,
    Resume,
    Restart,
}

enum Command {
    Act(Action, oneshot::Sender<Result<ActionOutcome, SimError>>),
    Control(Control, oneshot::Sender<Result<(), SimError>>),
    Status(oneshot::Sender<StatusSnapshot>),
    Snapshot(Option<usize>, oneshot::Sender<RenderSnapshot>),
    Trades(oneshot::Sender<Vec<Trade>>),
}

/// Cloneable front door to a running session. Every request is queued
/// onto the single task that owns the controller.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
    state: watch::Receiver<EngineState>,
}

impl SessionHandle {
    pub async fn act(&self, action: Action) -> Result<ActionOutcome, SessionError> {
        let outcome = self.request(|reply| Command::Act(action, reply)).await?;
        Ok(outcome?)
    }

    pub async fn status(&self) -> Result<StatusSnapshot, SessionError> {
        self.request(Command::Status).await
    }

    pub async fn snapshot(&self, window: Option<usize>) -> Result<RenderSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot(window, reply)).await
    }

    pub async fn trades(&self) -> Result<Vec<Trade>, SessionError> {
        self.request(Command::Trades).await
    }

    pub async fn stop(&self) -> Result<StatusSnapshot, SessionError> {
        match self.act(Action::Quit).await? {
            ActionOutcome::Stopped { status } => Ok(status),
            _ => self.status().await,
        }
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.control(Control::Pause).await
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.control(Control::Resume).await
    }

    pub async fn restart(&self) -> Result<(), SessionError> {
        self.control(Control::Restart).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Resolves once the engine reaches `Stopped` or the session task ends.
    pub async fn wait_stopped(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|state| *state == EngineState::Stopped).await;
    }

    async fn control(&self, control: Control) -> Result<(), SessionError> {
        let result = self
            .request(|reply| Command::Control(control, reply))
            .await?;
        Ok(result?)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

pub struct Session {
    handle: SessionHandle,
    task: JoinHandle<SessionSummary>,
}

impl Session {
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Drops this session's own handle and waits for the task to finish,
    /// which happens once every other handle is gone too.
    pub async fn join(self) -> Result<SessionSummary, SessionError> {
        drop(self.handle);
        self.task.await.map_err(|_| SessionError::Closed)
    }
}

pub fn spawn_session<L>(
    controller: SimulationController,
    log: L,
    options: SessionOptions,
) -> Session
where
    L: RunLogWriter + Send + 'static,
{
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (events_tx, _) = broadcast::channel(EVENT_QUEUE_DEPTH);
    let (state_tx, state_rx) = watch::channel(controller.state());

    let driver = SessionDriver {
        controller,
        log,
        options,
        events: events_tx.clone(),
        state: state_tx,
        announced_stop: false,
    };
    let task = tokio::spawn(driver.run(commands_rx));

    Session {
        handle: SessionHandle {
            commands: commands_tx,
            events: events_tx,
            state: state_rx,
        },
        task,
    }
}

struct SessionDriver<L> {
    controller: SimulationController,
    log: L,
    options: SessionOptions,
    events: broadcast::Sender<SessionEvent>,
    state: watch::Sender<EngineState>,
    announced_stop: bool,
}

impl<L: RunLogWriter> SessionDriver<L> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> SessionSummary {
        let config = *self.controller.config();
        self.log_event(
            RunLogEventKind::SessionStarted,
            format!(
                "n_ticks={} t_update={} generator={} expected_value={}",
                config.n_ticks,
                config.t_update,
                config.generator.as_str(),
                self.controller.expected_value()
            ),
        );

        let mut ticker = time::interval(config.tick_interval().max(MIN_TICK_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let running = self.controller.state() == EngineState::Running;
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = ticker.tick(), if running => self.advance(),
            }
            self.sync_state();
        }

        self.controller.stop();
        self.sync_state();

        SessionSummary {
            status: self.controller.status(),
            trades: self.controller.trades().copied().collect(),
        }
    }

    fn advance(&mut self) {
        match self.controller.tick() {
            Ok(sample) => {
                self.log_event(RunLogEventKind::TickAdvanced, format!("{:.4}", sample.value));
                let snapshot = self.controller.render_snapshot(self.options.snapshot_window);
                let _ = self.events.send(SessionEvent::Tick { snapshot });
            }
            Err(err) => self.log_event(RunLogEventKind::ActionRejected, err.to_string()),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Act(action, reply) => {
                let result = self.controller.handle_action(action);
                self.log_outcome(&result);
                if let Ok(outcome) = &result {
                    let _ = self.events.send(SessionEvent::Action {
                        outcome: outcome.clone(),
                    });
                }
                let _ = reply.send(result);
            }
            Command::Control(control, reply) => {
                let result = match control {
                    Control::Pause => self.controller.pause(),
                    Control::Resume => self.controller.resume(),
                    Control::Restart => self.controller.restart().map(|()| {
                        self.announced_stop = false;
                    }),
                };
                if let Err(err) = &result {
                    self.log_event(RunLogEventKind::ActionRejected, err.to_string());
                }
                let _ = reply.send(result);
            }
            Command::Status(reply) => {
                let _ = reply.send(self.controller.status());
            }
            Command::Snapshot(window, reply) => {
                let _ = reply.send(self.controller.render_snapshot(window));
            }
            Command::Trades(reply) => {
                let _ = reply.send(self.controller.trades().copied().collect());
            }
        }
    }

    fn log_outcome(&mut self, result: &Result<ActionOutcome, SimError>) {
        match result {
            Ok(ActionOutcome::Filled { execution, .. }) => {
                self.log_event(
                    RunLogEventKind::ActionApplied,
                    format!(
                        "{:?} {} @ {:.4}",
                        execution.side, execution.quantity, execution.price
                    ),
                );
                if let Some(trade) = execution.trade {
                    self.log_event(
                        RunLogEventKind::TradeClosed,
                        format!(
                            "{} {} entry={:.4} exit={:.4} pnl={:.4}",
                            trade.direction.as_str(),
                            trade.quantity_closed,
                            trade.entry_price,
                            trade.exit_price,
                            trade.pnl()
                        ),
                    );
                }
            }
            Ok(_) => {}
            Err(err) => self.log_event(RunLogEventKind::ActionRejected, err.to_string()),
        }
    }

    fn sync_state(&mut self) {
        let state = self.controller.state();
        self.state.send_replace(state);

        if state == EngineState::Stopped && !self.announced_stop {
            self.announced_stop = true;
            let status = self.controller.status();
            self.log_event(
                RunLogEventKind::SessionStopped,
                format!(
                    "trades={} realized_pnl={:.4}",
                    self.controller.trade_log().len(),
                    status.position.realized_pnl
                ),
            );
            let _ = self.events.send(SessionEvent::Stopped { status });
        }
    }

    fn log_event(&mut self, kind: RunLogEventKind, detail: String) {
        let tick = self.controller.status().tick;
        self.log.write(RunLogEvent::new(tick, kind, detail));
    }
}
