use thiserror::Error;

use crate::engine::EngineState;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("action quantity must be a positive integer, got {0}")]
    InvalidActionQuantity(i64),
    #[error("execution price must be finite, got {0}")]
    InvalidPrice(f64),
    #[error("cannot {operation} while the engine is {state}")]
    InvalidState {
        state: EngineState,
        operation: &'static str,
    },
    #[error("no market price has been generated yet")]
    NoMarketPrice,
    #[error("an action was already taken during tick {tick}")]
    ActionLimitReached { tick: u64 },
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("n_min ({n_min}) must not exceed n_max ({n_max})")]
    InvertedDigitRange { n_min: i64, n_max: i64 },
    #[error("n_samples must be positive")]
    NonPositiveSamples,
    #[error("n_ticks must be positive")]
    NonPositiveTicks,
    #[error("t_update must be a finite, non-negative number of seconds, got {0}")]
    InvalidTickInterval(f64),
    #[error("multiplier generator needs an expected value of at least 1 (n_min {n_min}, n_max {n_max}, n_samples {n_samples})")]
    NonPositiveAnchor {
        n_min: i64,
        n_max: i64,
        n_samples: u32,
    },
    #[error("image_shape must have a non-zero height and width")]
    EmptyCanvas,
    #[error("image width {width} must be divisible by n_ticks {n_ticks}")]
    CanvasNotDivisible { width: u32, n_ticks: u64 },
}
