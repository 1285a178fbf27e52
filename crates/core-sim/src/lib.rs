mod config;
mod controller;
mod engine;
mod error;
mod generators;
mod ledger;
mod trade_log;

pub use config::{GeneratorKind, ImageShape, SimConfig};
pub use controller::{
    Action, ActionMarker, ActionOutcome, Execution, Hotkey, RenderSnapshot, SimulationController,
    StatusSnapshot, HOTKEYS,
};
pub use engine::{EngineState, PriceSample, TickEngine};
pub use error::{ConfigError, Result, SimError};
pub use generators::{
    generator_for, DigitSumGenerator, DigitSumMean, ExpectedValueModel, MultiplierGenerator,
    PriceBounds, PriceGenerator,
};
pub use ledger::{Direction, Ledger, Position, PositionStatus, Side, Trade};
pub use trade_log::TradeLog;
