use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::generators::PriceGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub tick: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl EngineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the price history and the tick state machine.
pub struct TickEngine {
    generator: Box<dyn PriceGenerator>,
    expected_value: f64,
    max_ticks: u64,
    state: EngineState,
    history: Vec<PriceSample>,
}

impl TickEngine {
    pub fn new(generator: Box<dyn PriceGenerator>, expected_value: f64, max_ticks: u64) -> Self {
        Self {
            generator,
            expected_value,
            max_ticks,
            state: EngineState::Idle,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.history.len() as u64
    }

    pub fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    pub fn generator(&self) -> &dyn PriceGenerator {
        self.generator.as_ref()
    }

    pub fn history(&self) -> &[PriceSample] {
        &self.history
    }

    pub fn latest(&self) -> Option<PriceSample> {
        self.history.last().copied()
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition("start", EngineState::Idle, EngineState::Running)
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transition("pause", EngineState::Running, EngineState::Paused)
    }

    pub fn resume(&mut self) -> Result<()> {
        self.transition("resume", EngineState::Paused, EngineState::Running)
    }

    pub fn stop(&mut self) {
        self.state = EngineState::Stopped;
    }

    /// Generates and records one price. Only valid while running; reaching
    /// the tick limit moves the engine to `Stopped`.
    pub fn advance(&mut self) -> Result<PriceSample> {
        if self.state != EngineState::Running {
            return Err(SimError::InvalidState {
                state: self.state,
                operation: "advance",
            });
        }

        let previous = self.history.last().map(|sample| sample.value);
        let sample = PriceSample {
            tick: self.tick_count(),
            value: self.generator.next(previous, self.expected_value),
        };
        self.history.push(sample);

        if self.tick_count() >= self.max_ticks {
            self.state = EngineState::Stopped;
        }

        Ok(sample)
    }

    /// Clears the history and returns to `Idle`. The generator keeps its
    /// random state, so a restarted run draws a fresh series.
    pub fn reset(&mut self) {
        self.history.clear();
        self.state = EngineState::Idle;
    }

    fn transition(
        &mut self,
        operation: &'static str,
        from: EngineState,
        to: EngineState,
    ) -> Result<()> {
        if self.state != from {
            return Err(SimError::InvalidState {
                state: self.state,
                operation,
            });
        }
        self.state = to;
        Ok(())
    }
}
