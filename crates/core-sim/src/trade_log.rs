use crate::ledger::Trade;

/// Append-only record of closed trades, in the order they closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLog {
    trades: Vec<Trade>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn all(&self) -> impl Iterator<Item = &Trade> + Clone + '_ {
        self.trades.iter()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(Trade::pnl).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.trades.clear();
    }
}
