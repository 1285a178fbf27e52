use serde::{Deserialize, Serialize};

use crate::config::{ImageShape, SimConfig};
use crate::engine::{EngineState, PriceSample, TickEngine};
use crate::error::{Result, SimError};
use crate::generators::{
    generator_for, DigitSumMean, ExpectedValueModel, PriceBounds, PriceGenerator,
};
use crate::ledger::{Ledger, PositionStatus, Side, Trade};
use crate::trade_log::TradeLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hotkey {
    pub key: &'static str,
    pub action: &'static str,
}

pub const HOTKEYS: &[Hotkey] = &[
    Hotkey {
        key: "c",
        action: "Buy",
    },
    Hotkey {
        key: "v",
        action: "Sell",
    },
    Hotkey {
        key: "s",
        action: "Position status",
    },
    Hotkey {
        key: "q",
        action: "Options",
    },
    Hotkey {
        key: "Esc",
        action: "Quit simulator",
    },
];

/// A decoded operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Buy { quantity: i64 },
    Sell { quantity: i64 },
    Status,
    Options,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Execution {
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub tick: u64,
    pub trade: Option<Trade>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Filled {
        execution: Execution,
        status: StatusSnapshot,
    },
    Status {
        status: StatusSnapshot,
    },
    Options {
        hotkeys: &'static [Hotkey],
    },
    Stopped {
        status: StatusSnapshot,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Ticks generated so far.
    pub tick: u64,
    pub latest_price: Option<f64>,
    pub expected_value: f64,
    pub engine_state: EngineState,
    pub position: PositionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionMarker {
    pub tick: u64,
    pub side: Side,
    pub price: f64,
}

/// Everything a front-end needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub tick: u64,
    pub prices: Vec<PriceSample>,
    pub expected_value: f64,
    pub show_expected_value_line: bool,
    pub bounds: PriceBounds,
    pub image_shape: ImageShape,
    /// Pixel width of one tick column.
    pub bar_width: u32,
    pub markers: Vec<ActionMarker>,
    pub status: StatusSnapshot,
}

pub struct SimulationController {
    config: SimConfig,
    engine: TickEngine,
    ledger: Ledger,
    trade_log: TradeLog,
    markers: Vec<ActionMarker>,
    last_action_tick: Option<u64>,
}

impl SimulationController {
    /// Builds a running simulation with the configured generator and the
    /// digit-sum expected value.
    pub fn new(config: SimConfig) -> Result<Self> {
        let generator = generator_for(&config)?;
        Self::with_models(config, generator, &DigitSumMean)
    }

    pub fn with_models(
        config: SimConfig,
        generator: Box<dyn PriceGenerator>,
        expected_value_model: &dyn ExpectedValueModel,
    ) -> Result<Self> {
        config.validate()?;

        let expected_value =
            expected_value_model.compute(config.n_min, config.n_max, config.n_samples);
        let mut engine = TickEngine::new(generator, expected_value, config.n_ticks);
        engine.start()?;

        Ok(Self {
            config,
            engine,
            ledger: Ledger::new(),
            trade_log: TradeLog::new(),
            markers: Vec::new(),
            last_action_tick: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn expected_value(&self) -> f64 {
        self.engine.expected_value()
    }

    pub fn history(&self) -> &[PriceSample] {
        self.engine.history()
    }

    pub fn trades(&self) -> impl Iterator<Item = &Trade> + Clone + '_ {
        self.trade_log.all()
    }

    pub fn trade_log(&self) -> &TradeLog {
        &self.trade_log
    }

    pub fn tick(&mut self) -> Result<PriceSample> {
        self.engine.advance()
    }

    pub fn buy(&mut self, quantity: i64) -> Result<Execution> {
        self.execute(Side::Buy, quantity)
    }

    pub fn sell(&mut self, quantity: i64) -> Result<Execution> {
        self.execute(Side::Sell, quantity)
    }

    pub fn status(&self) -> StatusSnapshot {
        let latest_price = self.engine.latest().map(|sample| sample.value);
        let mark = latest_price.unwrap_or_else(|| self.expected_value());

        StatusSnapshot {
            tick: self.engine.tick_count(),
            latest_price,
            expected_value: self.expected_value(),
            engine_state: self.engine.state(),
            position: self.ledger.status(mark),
        }
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    pub fn pause(&mut self) -> Result<()> {
        self.engine.pause()
    }

    pub fn resume(&mut self) -> Result<()> {
        self.engine.resume()
    }

    /// Starts a fresh run: flat position, empty trade log and history.
    pub fn restart(&mut self) -> Result<()> {
        self.engine.reset();
        self.ledger = Ledger::new();
        self.trade_log.clear();
        self.markers.clear();
        self.last_action_tick = None;
        self.engine.start()
    }

    pub fn handle_action(&mut self, action: Action) -> Result<ActionOutcome> {
        match action {
            Action::Buy { quantity } => self.buy(quantity).map(|execution| self.filled(execution)),
            Action::Sell { quantity } => {
                self.sell(quantity).map(|execution| self.filled(execution))
            }
            Action::Status => Ok(ActionOutcome::Status {
                status: self.status(),
            }),
            Action::Options => Ok(ActionOutcome::Options { hotkeys: HOTKEYS }),
            Action::Quit => {
                self.stop();
                Ok(ActionOutcome::Stopped {
                    status: self.status(),
                })
            }
        }
    }

    /// Copies the last `window` samples (all of them when `None`) together
    /// with the markers that fall inside that window.
    pub fn render_snapshot(&self, window: Option<usize>) -> RenderSnapshot {
        let history = self.engine.history();
        let start = window.map_or(0, |window| history.len().saturating_sub(window));
        let prices = history[start..].to_vec();
        let first_tick = prices.first().map_or(0, |sample| sample.tick);
        let markers = self
            .markers
            .iter()
            .filter(|marker| marker.tick >= first_tick)
            .copied()
            .collect();

        RenderSnapshot {
            tick: self.engine.tick_count(),
            prices,
            expected_value: self.expected_value(),
            show_expected_value_line: self.config.show_expected_value_line,
            bounds: self.engine.generator().bounds(),
            image_shape: self.config.image_shape,
            bar_width: self.config.bar_width(),
            markers,
            status: self.status(),
        }
    }

    fn filled(&self, execution: Execution) -> ActionOutcome {
        ActionOutcome::Filled {
            execution,
            status: self.status(),
        }
    }

    fn execute(&mut self, side: Side, quantity: i64) -> Result<Execution> {
        if quantity <= 0 {
            return Err(SimError::InvalidActionQuantity(quantity));
        }
        if self.engine.state() == EngineState::Stopped {
            return Err(SimError::InvalidState {
                state: EngineState::Stopped,
                operation: match side {
                    Side::Buy => "buy",
                    Side::Sell => "sell",
                },
            });
        }
        let latest = self.engine.latest().ok_or(SimError::NoMarketPrice)?;
        if self.config.one_action_per_tick && self.last_action_tick == Some(latest.tick) {
            return Err(SimError::ActionLimitReached { tick: latest.tick });
        }

        let trade = self.ledger.apply(side, quantity, latest.value, latest.tick)?;
        if let Some(trade) = trade {
            self.trade_log.record(trade);
        }
        self.markers.push(ActionMarker {
            tick: latest.tick,
            side,
            price: latest.value,
        });
        self.last_action_tick = Some(latest.tick);

        Ok(Execution {
            side,
            quantity,
            price: latest.value,
            tick: latest.tick,
            trade,
        })
    }
}
