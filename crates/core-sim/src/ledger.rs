use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    fn signed(self, quantity: i64) -> i64 {
        match self {
            Self::Buy => quantity,
            Self::Sell => -quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// A closed (or partially closed) position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity_closed: u64,
    pub tick_opened: u64,
    pub tick_closed: u64,
}

impl Trade {
    pub fn pnl(&self) -> f64 {
        let quantity = self.quantity_closed as f64;
        match self.direction {
            Direction::Long => quantity * (self.exit_price - self.entry_price),
            Direction::Short => quantity * (self.entry_price - self.exit_price),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Positive is long, negative is short.
    pub quantity: i64,
    /// Zero while flat.
    pub average_entry_price: f64,
    pub tick_opened: u64,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn direction(&self) -> Option<Direction> {
        match self.quantity.signum() {
            1 => Some(Direction::Long),
            -1 => Some(Direction::Short),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionStatus {
    pub quantity: i64,
    pub average_entry_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    position: Position,
    realized_pnl: f64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn buy(&mut self, quantity: i64, price: f64, tick: u64) -> Result<Option<Trade>> {
        self.apply(Side::Buy, quantity, price, tick)
    }

    pub fn sell(&mut self, quantity: i64, price: f64, tick: u64) -> Result<Option<Trade>> {
        self.apply(Side::Sell, quantity, price, tick)
    }

    /// Applies one fill. Adding to the position (or opening from flat)
    /// updates the size-weighted entry price. Trading against the position
    /// closes up to its size and emits a [`Trade`]; any excess opens the
    /// opposite side at `price`.
    pub fn apply(
        &mut self,
        side: Side,
        quantity: i64,
        price: f64,
        tick: u64,
    ) -> Result<Option<Trade>> {
        if quantity <= 0 {
            return Err(SimError::InvalidActionQuantity(quantity));
        }
        if !price.is_finite() {
            return Err(SimError::InvalidPrice(price));
        }

        let current = self.position.quantity;
        let delta = side.signed(quantity);
        let next = current
            .checked_add(delta)
            .ok_or(SimError::InvalidActionQuantity(quantity))?;

        if current == 0 || current.signum() == delta.signum() {
            let held = current.unsigned_abs() as f64;
            let added = quantity as f64;
            let average = (held * self.position.average_entry_price + added * price) / (held + added);
            let tick_opened = if current == 0 {
                tick
            } else {
                self.position.tick_opened
            };

            self.position = Position {
                quantity: next,
                average_entry_price: average,
                tick_opened,
            };
            return Ok(None);
        }

        let direction = if current > 0 {
            Direction::Long
        } else {
            Direction::Short
        };
        let quantity_closed = quantity.unsigned_abs().min(current.unsigned_abs());
        let trade = Trade {
            direction,
            entry_price: self.position.average_entry_price,
            exit_price: price,
            quantity_closed,
            tick_opened: self.position.tick_opened,
            tick_closed: tick,
        };
        self.realized_pnl += trade.pnl();

        self.position = match next.signum() {
            0 => Position::default(),
            sign if sign == current.signum() => Position {
                quantity: next,
                ..self.position
            },
            _ => Position {
                quantity: next,
                average_entry_price: price,
                tick_opened: tick,
            },
        };

        Ok(Some(trade))
    }

    /// Mark-to-market view at `current_price`. Unrealized P&L is positive
    /// whenever the open position is in profit, long or short.
    pub fn status(&self, current_price: f64) -> PositionStatus {
        let unrealized_pnl = if self.position.is_flat() {
            0.0
        } else {
            self.position.quantity as f64 * (current_price - self.position.average_entry_price)
        };

        PositionStatus {
            quantity: self.position.quantity,
            average_entry_price: self.position.average_entry_price,
            realized_pnl: self.realized_pnl,
            unrealized_pnl,
        }
    }
}
